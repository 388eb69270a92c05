use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::casework::audit::{AuditEntry, AuditError, AuditSink};
use crate::casework::case::{
    Case, CountryOnCase, GoodOnCase, GoodStatus, GoodsTypeOnCase, OrganisationOnCase, PartyOnCase,
};
use crate::casework::domain::{
    Capability, CaseId, CaseStatus, CaseType, CaseworkActor, FlagId, GoodId, OrganisationId,
    PartyId, RuleId, Team,
};
use crate::casework::flags::{Flag, FlagLevel, FlagStatus, FlaggingRule};
use crate::casework::memory::{MemoryCaseRepository, MemoryFlagRegistry, RecordingAuditSink};
use crate::casework::service::CaseworkService;

pub(super) const FINALISING_TEAM: &str = "licensing-unit";

pub(super) fn team(name: &str) -> Team {
    Team(name.to_string())
}

pub(super) fn actor(id: &str, team_name: &str, capabilities: &[Capability]) -> CaseworkActor {
    CaseworkActor {
        id: id.to_string(),
        team: team(team_name),
        capabilities: capabilities.iter().copied().collect(),
    }
}

pub(super) fn caseworker() -> CaseworkActor {
    actor("caseworker-1", "enforcement", &[])
}

pub(super) fn rule_manager() -> CaseworkActor {
    actor(
        "rule-manager-1",
        "enforcement",
        &[Capability::ManageFlaggingRules, Capability::ActivateFlags],
    )
}

pub(super) fn finaliser() -> CaseworkActor {
    actor(
        "finaliser-1",
        FINALISING_TEAM,
        &[Capability::ManageFinalAdvice],
    )
}

pub(super) fn flag(id: &str, level: FlagLevel, team_name: &str, priority: u32) -> Flag {
    Flag {
        id: FlagId(id.to_string()),
        name: format!("{id} name"),
        level,
        status: FlagStatus::Active,
        priority,
        team: team(team_name),
        label: None,
        colour: None,
        blocks_finalising: false,
        removable_by: None,
    }
}

pub(super) fn rule(
    id: &str,
    level: FlagLevel,
    flag_id: &str,
    team_name: &str,
    values: &[&str],
    verified_goods_only: Option<bool>,
) -> FlaggingRule {
    FlaggingRule {
        id: RuleId(id.to_string()),
        team: team(team_name),
        level,
        flag: FlagId(flag_id.to_string()),
        status: FlagStatus::Active,
        matching_values: values.iter().map(|value| value.to_string()).collect(),
        verified_goods_only,
    }
}

pub(super) fn organisation() -> OrganisationOnCase {
    OrganisationOnCase {
        id: OrganisationId("org-1".to_string()),
        name: "Example Exports Ltd".to_string(),
        flags: BTreeSet::new(),
    }
}

pub(super) fn good(id: &str, ratings: &[&str], status: GoodStatus) -> GoodOnCase {
    GoodOnCase {
        id: GoodId(id.to_string()),
        ratings: ratings.iter().map(|rating| rating.to_string()).collect(),
        status,
        flags: BTreeSet::new(),
    }
}

pub(super) fn goods_type(id: &str, ratings: &[&str]) -> GoodsTypeOnCase {
    GoodsTypeOnCase {
        id: GoodId(id.to_string()),
        ratings: ratings.iter().map(|rating| rating.to_string()).collect(),
        flags: BTreeSet::new(),
    }
}

pub(super) fn party(id: &str, country: &str) -> PartyOnCase {
    PartyOnCase {
        id: PartyId(id.to_string()),
        country: country.to_string(),
        flags: BTreeSet::new(),
        deleted_at: None,
    }
}

pub(super) fn deleted_party(id: &str, country: &str) -> PartyOnCase {
    PartyOnCase {
        deleted_at: Some(Utc::now()),
        ..party(id, country)
    }
}

pub(super) fn country(code: &str) -> CountryOnCase {
    CountryOnCase {
        country: code.to_string(),
        flags: BTreeSet::new(),
    }
}

/// A standard (SIEL) case already under review, with one verified good
/// and one active party.
pub(super) fn standard_case(id: &str) -> Case {
    let mut case = Case::new(
        CaseId(id.to_string()),
        format!("GBSIEL/2026/{id}"),
        CaseType::STANDARD,
        organisation(),
    );
    case.status = CaseStatus::Submitted;
    case.goods.push(good("good-1", &["ML1a"], GoodStatus::Verified));
    case.parties.push(party("party-1", "FR"));
    case
}

/// An open (OIEL) case with goods types and destination countries.
pub(super) fn open_case(id: &str) -> Case {
    let mut case = Case::new(
        CaseId(id.to_string()),
        format!("GBOIEL/2026/{id}"),
        CaseType::OPEN,
        organisation(),
    );
    case.status = CaseStatus::Submitted;
    case.goods_types.push(goods_type("goods-type-1", &["ML4b"]));
    case.countries.push(country("DE"));
    case
}

pub(super) fn goods_query_case(id: &str) -> Case {
    let mut case = Case::new(
        CaseId(id.to_string()),
        format!("GBGQY/2026/{id}"),
        CaseType::GOODS_QUERY,
        organisation(),
    );
    case.status = CaseStatus::Submitted;
    case.goods.push(good("query-good", &["ML10a"], GoodStatus::Draft));
    case
}

pub(super) type MemoryService =
    CaseworkService<MemoryCaseRepository, MemoryFlagRegistry, RecordingAuditSink>;

pub(super) fn build_service() -> (
    MemoryService,
    Arc<MemoryCaseRepository>,
    Arc<MemoryFlagRegistry>,
    Arc<RecordingAuditSink>,
) {
    let cases = Arc::new(MemoryCaseRepository::default());
    let registry = Arc::new(MemoryFlagRegistry::default());
    let audit = Arc::new(RecordingAuditSink::default());
    let service = CaseworkService::new(
        cases.clone(),
        registry.clone(),
        audit.clone(),
        team(FINALISING_TEAM),
    );
    (service, cases, registry, audit)
}

/// Sink that always fails, for asserting the best-effort audit contract.
pub(super) struct FailingAuditSink;

impl AuditSink for FailingAuditSink {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Transport("audit store offline".to_string()))
    }
}
