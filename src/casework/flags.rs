use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{Capability, FlagId, RuleId, Team};

/// Entity category a flag or flagging rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagLevel {
    Good,
    Destination,
    Case,
    Organisation,
}

impl FlagLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Destination => "destination",
            Self::Case => "case",
            Self::Organisation => "organisation",
        }
    }
}

impl fmt::Display for FlagLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Flags and rules are deactivated rather than deleted so historical
/// audit payloads keep resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    Active,
    Deactivated,
}

/// A named warning marker attachable to a case, good, destination, or
/// organisation. Identity and level are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub id: FlagId,
    pub name: String,
    pub level: FlagLevel,
    pub status: FlagStatus,
    /// Lower numbers sort first in the aggregated view.
    pub priority: u32,
    pub team: Team,
    pub label: Option<String>,
    pub colour: Option<String>,
    pub blocks_finalising: bool,
    /// When set, only holders of the capability may detach the flag.
    pub removable_by: Option<Capability>,
}

impl Flag {
    pub fn is_active(&self) -> bool {
        self.status == FlagStatus::Active
    }
}

/// Declarative predicate that attaches its flag to matching entities.
///
/// Matching values are interpreted according to level: case-type
/// reference codes at `Case` level, control-list ratings at `Good`
/// level, country codes at `Destination` level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggingRule {
    pub id: RuleId,
    pub team: Team,
    pub level: FlagLevel,
    pub flag: FlagId,
    pub status: FlagStatus,
    pub matching_values: BTreeSet<String>,
    /// Required for `Good` level rules, forbidden elsewhere: restricts
    /// matches to goods whose classification has been verified.
    pub verified_goods_only: Option<bool>,
}

impl FlaggingRule {
    pub fn is_active(&self) -> bool {
        self.status == FlagStatus::Active
    }

    pub fn matches_value(&self, value: &str) -> bool {
        self.matching_values.contains(value)
    }

    pub fn matches_any(&self, values: &BTreeSet<String>) -> bool {
        self.matching_values
            .iter()
            .any(|value| values.contains(value.as_str()))
    }

    pub fn requires_verified_good(&self) -> bool {
        self.verified_goods_only == Some(true)
    }

    /// The uniqueness tuple enforced at creation.
    fn signature(&self) -> (&Team, FlagLevel, &FlagId, &BTreeSet<String>, Option<bool>) {
        (
            &self.team,
            self.level,
            &self.flag,
            &self.matching_values,
            self.verified_goods_only,
        )
    }
}

/// Rejections raised when a flagging rule is created or edited. A rule
/// that passes validation never needs special handling in the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("an identical flagging rule already exists for this team")]
    Duplicate,
    #[error("good-level rules must state whether they apply to verified goods only")]
    MissingVerifiedGoodsQualifier,
    #[error("the verified-goods qualifier only applies to good-level rules")]
    UnexpectedVerifiedGoodsQualifier,
    #[error("organisation flags are assigned manually and cannot be rule-driven")]
    OrganisationLevelNotRuleDriven,
    #[error("rule level {rule} does not match flag level {flag}")]
    LevelMismatch { rule: FlagLevel, flag: FlagLevel },
    #[error("rule references an unknown flag")]
    UnknownFlag,
    #[error("rule must carry at least one matching value")]
    EmptyMatchingValues,
}

/// Validate a candidate rule against its flag and the rules already
/// registered for the same team.
pub fn validate_rule(
    rule: &FlaggingRule,
    flag: Option<&Flag>,
    existing: &[FlaggingRule],
) -> Result<(), RuleValidationError> {
    if rule.level == FlagLevel::Organisation {
        return Err(RuleValidationError::OrganisationLevelNotRuleDriven);
    }

    match (rule.level, rule.verified_goods_only) {
        (FlagLevel::Good, None) => return Err(RuleValidationError::MissingVerifiedGoodsQualifier),
        (FlagLevel::Good, Some(_)) => {}
        (_, Some(_)) => return Err(RuleValidationError::UnexpectedVerifiedGoodsQualifier),
        (_, None) => {}
    }

    if rule.matching_values.is_empty() {
        return Err(RuleValidationError::EmptyMatchingValues);
    }

    let flag = flag.ok_or(RuleValidationError::UnknownFlag)?;
    if flag.level != rule.level {
        return Err(RuleValidationError::LevelMismatch {
            rule: rule.level,
            flag: flag.level,
        });
    }

    if existing
        .iter()
        .any(|other| other.id != rule.id && other.signature() == rule.signature())
    {
        return Err(RuleValidationError::Duplicate);
    }

    Ok(())
}
