//! Declarative flagging-rule evaluator.
//!
//! Matching is pure set membership: no scoring, no precedence between
//! rules. Attachment is set-union, so re-running any pass over an
//! unchanged case is a no-op. Active rules are re-queried from the
//! registry on every call.

use tracing::debug;

use super::case::Case;
use super::domain::DestinationExposure;
use super::flags::{FlagLevel, FlaggingRule};
use super::repository::{FlagRegistry, RegistryError};

/// Apply all active flagging rules to one case. Draft and terminal
/// cases are left untouched: rules are only meaningful while a case is
/// under active review. Returns whether any flag was newly attached.
pub fn apply_rules_to_case(
    case: &mut Case,
    registry: &dyn FlagRegistry,
) -> Result<bool, RegistryError> {
    if case.status.is_draft() || case.status.is_terminal() {
        return Ok(false);
    }

    let mut changed = apply_case_level_rules(case, registry)?;
    changed |= apply_destination_level_rules(case, registry)?;
    changed |= apply_good_level_rules(case, registry)?;

    if changed {
        debug!(case = %case.id.0, "flagging rules attached new flags");
    }

    Ok(changed)
}

/// Attach flags of CASE-level rules whose matching values contain the
/// case's type reference code.
pub fn apply_case_level_rules(
    case: &mut Case,
    registry: &dyn FlagRegistry,
) -> Result<bool, RegistryError> {
    let rules = registry.active_rules(FlagLevel::Case)?;
    let reference = case.case_type.reference.code();
    let mut changed = false;

    for rule in rules.iter().filter(|rule| rule.matches_value(reference)) {
        changed |= case.flags.insert(rule.flag.clone());
    }

    Ok(changed)
}

/// Attach flags of GOOD-level rules to every exposed good whose ratings
/// intersect the rule's matching values. Verified-only rules skip goods
/// whose classification is not verified; goods types carry no
/// verification phase and are never skipped.
pub fn apply_good_level_rules(
    case: &mut Case,
    registry: &dyn FlagRegistry,
) -> Result<bool, RegistryError> {
    let rules = registry.active_rules(FlagLevel::Good)?;
    let mut changed = false;

    for (ratings, verified, flags) in case.exposed_goods_mut() {
        for rule in &rules {
            if !rule.matches_any(ratings) {
                continue;
            }
            if rule.requires_verified_good() && !verified {
                continue;
            }
            changed |= flags.insert(rule.flag.clone());
        }
    }

    Ok(changed)
}

/// Attach flags of DESTINATION-level rules to every active destination
/// whose country code appears in the rule's matching values. The
/// attachment target follows the sub-type: parties for standard-style
/// cases, country records for open-licence style cases.
pub fn apply_destination_level_rules(
    case: &mut Case,
    registry: &dyn FlagRegistry,
) -> Result<bool, RegistryError> {
    let rules = registry.active_rules(FlagLevel::Destination)?;
    let mut changed = false;

    match case.case_type.sub_type.destination_exposure() {
        DestinationExposure::Parties => {
            for party in case.active_parties_mut() {
                for rule in &rules {
                    if rule.matches_value(&party.country) {
                        changed |= party.flags.insert(rule.flag.clone());
                    }
                }
            }
        }
        DestinationExposure::Countries => {
            for country in &mut case.countries {
                for rule in &rules {
                    if rule.matches_value(&country.country) {
                        changed |= country.flags.insert(rule.flag.clone());
                    }
                }
            }
        }
        DestinationExposure::None => {}
    }

    Ok(changed)
}

/// Apply a single rule to one case during a retroactive walk. The rule's
/// matching criteria filter the touched entities up front, so a
/// non-matching case is left entirely alone. Destination rules attach to
/// matching active parties and to matching country records wherever both
/// exist on the case.
pub fn apply_single_rule(case: &mut Case, rule: &FlaggingRule) -> bool {
    if case.status.is_draft() || case.status.is_terminal() {
        return false;
    }

    match rule.level {
        FlagLevel::Case => {
            if rule.matches_value(case.case_type.reference.code()) {
                case.flags.insert(rule.flag.clone())
            } else {
                false
            }
        }
        FlagLevel::Good => {
            let mut changed = false;
            for (ratings, verified, flags) in case.exposed_goods_mut() {
                if !rule.matches_any(ratings) {
                    continue;
                }
                if rule.requires_verified_good() && !verified {
                    continue;
                }
                changed |= flags.insert(rule.flag.clone());
            }
            changed
        }
        FlagLevel::Destination => {
            let mut changed = false;
            for party in case.active_parties_mut() {
                if rule.matches_value(&party.country) {
                    changed |= party.flags.insert(rule.flag.clone());
                }
            }
            for country in &mut case.countries {
                if rule.matches_value(&country.country) {
                    changed |= country.flags.insert(rule.flag.clone());
                }
            }
            changed
        }
        FlagLevel::Organisation => false,
    }
}
