use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier wrapper for cases under review.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoodId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrganisationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlagId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

/// Caseworker team, also the owner of flags and flagging rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Team(pub String);

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capabilities granted to caseworkers through their role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageFinalAdvice,
    ReopenClosedCases,
    ManageFlaggingRules,
    ActivateFlags,
    RemoveProtectedFlags,
}

impl Capability {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ManageFinalAdvice => "manage_final_advice",
            Self::ReopenClosedCases => "reopen_closed_cases",
            Self::ManageFlaggingRules => "manage_flagging_rules",
            Self::ActivateFlags => "activate_flags",
            Self::RemoveProtectedFlags => "remove_protected_flags",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The acting caseworker, as asserted by the authenticating layer upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseworkActor {
    pub id: String,
    pub team: Team,
    pub capabilities: BTreeSet<Capability>,
}

impl CaseworkActor {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn belongs_to(&self, team: &Team) -> bool {
        &self.team == team
    }
}

/// Review status of a case. `Draft` is system-only; the rest are set by
/// caseworkers through the guarded transition or by internal workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Draft,
    Submitted,
    Resubmitted,
    ApplicantEditing,
    SupersededByExporterEdit,
    InitialChecks,
    UnderReview,
    OgdAdvice,
    UnderFinalReview,
    ReopenedForChanges,
    ReopenedDueToOrgChanges,
    Finalised,
    Withdrawn,
    Closed,
    Suspended,
    Surrendered,
    Revoked,
}

impl CaseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Resubmitted => "resubmitted",
            Self::ApplicantEditing => "applicant_editing",
            Self::SupersededByExporterEdit => "superseded_by_exporter_edit",
            Self::InitialChecks => "initial_checks",
            Self::UnderReview => "under_review",
            Self::OgdAdvice => "ogd_advice",
            Self::UnderFinalReview => "under_final_review",
            Self::ReopenedForChanges => "reopened_for_changes",
            Self::ReopenedDueToOrgChanges => "reopened_due_to_org_changes",
            Self::Finalised => "finalised",
            Self::Withdrawn => "withdrawn",
            Self::Closed => "closed",
            Self::Suspended => "suspended",
            Self::Surrendered => "surrendered",
            Self::Revoked => "revoked",
        }
    }

    /// Stable ordering used when listing cases by workflow stage.
    pub const fn priority(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Submitted => 1,
            Self::ApplicantEditing => 2,
            Self::SupersededByExporterEdit => 3,
            Self::Resubmitted => 4,
            Self::InitialChecks => 5,
            Self::UnderReview => 6,
            Self::OgdAdvice => 7,
            Self::UnderFinalReview => 8,
            Self::ReopenedForChanges => 9,
            Self::ReopenedDueToOrgChanges => 10,
            Self::Finalised => 11,
            Self::Withdrawn => 12,
            Self::Closed => 13,
            Self::Suspended => 14,
            Self::Surrendered => 15,
            Self::Revoked => 16,
        }
    }

    /// No further review action is expected absent explicit reopening.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finalised | Self::Withdrawn | Self::Closed | Self::Surrendered | Self::Revoked
        )
    }

    /// Record changes are locked while the case sits in one of these.
    pub const fn is_read_only(self) -> bool {
        self.is_terminal()
            || matches!(
                self,
                Self::UnderFinalReview | Self::ReopenedDueToOrgChanges | Self::Suspended
            )
    }

    pub const fn is_draft(self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Licence/query types an exporter can apply for. The reference code is
/// what CASE-level flagging rules match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseTypeReference {
    Siel,
    Oiel,
    Oicl,
    Ogel,
    Exhc,
    Gift,
    F680,
    Cre,
    Gqy,
    Eua,
}

impl CaseTypeReference {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Siel => "SIEL",
            Self::Oiel => "OIEL",
            Self::Oicl => "OICL",
            Self::Ogel => "OGEL",
            Self::Exhc => "EXHC",
            Self::Gift => "GIFT",
            Self::F680 => "F680",
            Self::Cre => "CRE",
            Self::Gqy => "GQY",
            Self::Eua => "EUA",
        }
    }
}

/// Sub-type of a case, which determines how its goods and destinations
/// are stored and therefore how rules and aggregation reach them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSubType {
    Standard,
    Open,
    Hmrc,
    Exhibition,
    Gifting,
    F680,
    GoodsQuery,
    EndUserAdvisory,
}

/// How goods are reached for a given sub-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoodsExposure {
    /// Assessed goods attached directly to the case.
    Direct,
    /// Looser goods-type records used by open-licence style cases.
    GoodsTypes,
    /// The single good a classification query is about.
    QueryGood,
    None,
}

/// How destinations are reached for a given sub-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationExposure {
    /// Parties on the case; destination flags attach to the party.
    Parties,
    /// Country records on the case; destination flags attach to the country.
    Countries,
    None,
}

impl CaseSubType {
    pub const fn goods_exposure(self) -> GoodsExposure {
        match self {
            Self::Standard | Self::Exhibition | Self::Gifting | Self::F680 => GoodsExposure::Direct,
            Self::Open | Self::Hmrc => GoodsExposure::GoodsTypes,
            Self::GoodsQuery => GoodsExposure::QueryGood,
            Self::EndUserAdvisory => GoodsExposure::None,
        }
    }

    pub const fn destination_exposure(self) -> DestinationExposure {
        match self {
            Self::Standard | Self::Exhibition | Self::Gifting | Self::F680
            | Self::EndUserAdvisory => DestinationExposure::Parties,
            Self::Open | Self::Hmrc => DestinationExposure::Countries,
            Self::GoodsQuery => DestinationExposure::None,
        }
    }
}

/// Reference code plus sub-type, stored on every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseType {
    pub reference: CaseTypeReference,
    pub sub_type: CaseSubType,
}

impl CaseType {
    pub const STANDARD: Self = Self {
        reference: CaseTypeReference::Siel,
        sub_type: CaseSubType::Standard,
    };
    pub const OPEN: Self = Self {
        reference: CaseTypeReference::Oiel,
        sub_type: CaseSubType::Open,
    };
    pub const HMRC: Self = Self {
        reference: CaseTypeReference::Cre,
        sub_type: CaseSubType::Hmrc,
    };
    pub const EXHIBITION: Self = Self {
        reference: CaseTypeReference::Exhc,
        sub_type: CaseSubType::Exhibition,
    };
    pub const GOODS_QUERY: Self = Self {
        reference: CaseTypeReference::Gqy,
        sub_type: CaseSubType::GoodsQuery,
    };
    pub const END_USER_ADVISORY: Self = Self {
        reference: CaseTypeReference::Eua,
        sub_type: CaseSubType::EndUserAdvisory,
    };
}
