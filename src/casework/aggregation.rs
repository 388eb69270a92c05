//! Merges the four flag sources of a case into one ordered view.

use std::collections::BTreeSet;

use serde::Serialize;

use super::case::Case;
use super::domain::{DestinationExposure, FlagId, Team};
use super::flags::{Flag, FlagLevel};
use super::repository::{FlagRegistry, RegistryError};

/// Where an aggregated flag was found. Rank drives the second ordering
/// key: goods warnings surface before destination, case, and
/// organisation ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSource {
    Goods,
    Destinations,
    Case,
    Organisation,
}

impl FlagSource {
    pub const fn rank(self) -> u8 {
        match self {
            Self::Goods => 0,
            Self::Destinations => 1,
            Self::Case => 2,
            Self::Organisation => 3,
        }
    }
}

/// Flag summary rendered on case lists and detail views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleFlag {
    pub id: FlagId,
    pub name: String,
    pub level: FlagLevel,
    pub priority: u32,
    pub team: Team,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    pub blocks_finalising: bool,
    pub my_team: bool,
    pub source: FlagSource,
}

impl VisibleFlag {
    fn from_flag(flag: Flag, source: FlagSource, team: &Team) -> Self {
        let my_team = &flag.team == team;
        Self {
            id: flag.id,
            name: flag.name,
            level: flag.level,
            priority: flag.priority,
            team: flag.team,
            label: flag.label,
            colour: flag.colour,
            blocks_finalising: flag.blocks_finalising,
            my_team,
            source,
        }
    }
}

/// The complete, ordered list of flags visible for a case.
///
/// Sources are goods, destinations, the case itself, and the owning
/// organisation. Ordering: the requesting team's flags first, then
/// source rank, then the flag's own priority ascending; remaining ties
/// keep collection order. `distinct` collapses a flag reachable through
/// several paths to its lowest-rank occurrence; `limit` truncates the
/// final ordered list. Deactivated flags and soft-deleted parties
/// contribute nothing. Never a business error: an empty list is a
/// normal result.
pub fn get_ordered_flags(
    case: &Case,
    registry: &dyn FlagRegistry,
    team: &Team,
    limit: Option<usize>,
    distinct: bool,
) -> Result<Vec<VisibleFlag>, RegistryError> {
    let mut collected: Vec<VisibleFlag> = Vec::new();
    let mut seen: BTreeSet<FlagId> = BTreeSet::new();

    for (ids, source) in sources(case) {
        for id in ids {
            if distinct && seen.contains(&id) {
                continue;
            }
            let Some(flag) = registry.flag(&id)? else {
                continue;
            };
            if !flag.is_active() {
                continue;
            }
            if distinct {
                seen.insert(id);
            }
            collected.push(VisibleFlag::from_flag(flag, source, team));
        }
    }

    collected.sort_by(|a, b| {
        b.my_team
            .cmp(&a.my_team)
            .then(a.source.rank().cmp(&b.source.rank()))
            .then(a.priority.cmp(&b.priority))
    });

    if let Some(limit) = limit {
        collected.truncate(limit);
    }

    Ok(collected)
}

/// Distinct visible flags that block finalisation, for callers that want
/// to warn before a finalise attempt.
pub fn finalisation_blockers(
    case: &Case,
    registry: &dyn FlagRegistry,
    team: &Team,
) -> Result<Vec<VisibleFlag>, RegistryError> {
    let mut blockers = get_ordered_flags(case, registry, team, None, true)?;
    blockers.retain(|flag| flag.blocks_finalising);
    Ok(blockers)
}

/// Flag ids per source, in rank order so the distinct collapse keeps the
/// lowest rank.
fn sources(case: &Case) -> Vec<(Vec<FlagId>, FlagSource)> {
    let goods: Vec<FlagId> = case
        .exposed_good_flags()
        .into_iter()
        .flat_map(|flags| flags.iter().cloned())
        .collect();

    let destinations: Vec<FlagId> = match case.case_type.sub_type.destination_exposure() {
        DestinationExposure::Parties => case
            .active_parties()
            .flat_map(|party| party.flags.iter().cloned())
            .collect(),
        DestinationExposure::Countries => case
            .countries
            .iter()
            .flat_map(|country| country.flags.iter().cloned())
            .collect(),
        DestinationExposure::None => Vec::new(),
    };

    vec![
        (goods, FlagSource::Goods),
        (destinations, FlagSource::Destinations),
        (case.flags.iter().cloned().collect(), FlagSource::Case),
        (
            case.organisation.flags.iter().cloned().collect(),
            FlagSource::Organisation,
        ),
    ]
}
