//! Integration scenarios for the casework engine, driven through the
//! public service facade and HTTP router: submission, rule evaluation,
//! the finalisation gate, and the aggregated flag view.

mod common {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use export_casework::casework::case::{
        Case, GoodOnCase, GoodStatus, OrganisationOnCase, PartyOnCase,
    };
    use export_casework::casework::domain::{
        Capability, CaseId, CaseType, CaseworkActor, FlagId, GoodId, OrganisationId, PartyId,
        RuleId, Team,
    };
    use export_casework::casework::flags::{Flag, FlagLevel, FlagStatus, FlaggingRule};
    use export_casework::casework::memory::{
        MemoryCaseRepository, MemoryFlagRegistry, RecordingAuditSink,
    };
    use export_casework::casework::service::CaseworkService;

    pub(super) const FINALISING_TEAM: &str = "licensing-unit";

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
            Team(FINALISING_TEAM.to_string()),
        );
        (service, cases, registry, audit)
    }

    pub(super) fn actor(id: &str, team: &str, capabilities: &[Capability]) -> CaseworkActor {
        CaseworkActor {
            id: id.to_string(),
            team: Team(team.to_string()),
            capabilities: capabilities.iter().copied().collect(),
        }
    }

    pub(super) fn rule_manager() -> CaseworkActor {
        actor("rule-manager", "enforcement", &[Capability::ManageFlaggingRules])
    }

    pub(super) fn flag(id: &str, name: &str, level: FlagLevel, priority: u32) -> Flag {
        Flag {
            id: FlagId(id.to_string()),
            name: name.to_string(),
            level,
            status: FlagStatus::Active,
            priority,
            team: Team("enforcement".to_string()),
            label: None,
            colour: None,
            blocks_finalising: false,
            removable_by: None,
        }
    }

    pub(super) fn rule(
        id: &str,
        level: FlagLevel,
        flag: &str,
        values: &[&str],
        verified_goods_only: Option<bool>,
    ) -> FlaggingRule {
        FlaggingRule {
            id: RuleId(id.to_string()),
            team: Team("enforcement".to_string()),
            level,
            flag: FlagId(flag.to_string()),
            status: FlagStatus::Active,
            matching_values: values.iter().map(|value| value.to_string()).collect(),
            verified_goods_only,
        }
    }

    pub(super) fn draft_standard_case(id: &str, good_status: GoodStatus) -> Case {
        let mut case = Case::new(
            CaseId(id.to_string()),
            format!("GBSIEL/2026/{id}"),
            CaseType::STANDARD,
            OrganisationOnCase {
                id: OrganisationId("org-1".to_string()),
                name: "Example Exports Ltd".to_string(),
                flags: BTreeSet::new(),
            },
        );
        case.goods.push(GoodOnCase {
            id: GoodId("good-1".to_string()),
            ratings: BTreeSet::from(["ML1a".to_string()]),
            status: good_status,
            flags: BTreeSet::new(),
        });
        case.parties.push(PartyOnCase {
            id: PartyId("party-1".to_string()),
            country: "FR".to_string(),
            flags: BTreeSet::new(),
            deleted_at: None,
        });
        case
    }
}

use std::sync::Arc;

use axum::http::StatusCode;
use export_casework::casework::case::GoodStatus;
use export_casework::casework::domain::{Capability, CaseId, CaseStatus, FlagId, Team};
use export_casework::casework::flags::FlagLevel;
use export_casework::casework::repository::{CaseRepository, FlagRegistry};
use export_casework::casework::router::casework_router;
use serde_json::json;
use tower::ServiceExt;

use common::*;

#[test]
fn submission_attaches_flags_from_all_matching_rules() {
    let (service, cases, registry, _audit) = build_service();

    registry
        .insert_flag(flag("flag-siel", "Standard licence", FlagLevel::Case, 2))
        .expect("flag inserts");
    registry
        .insert_flag(flag("flag-ml1a", "Small arms", FlagLevel::Good, 1))
        .expect("flag inserts");
    registry
        .insert_flag(flag("flag-fr", "France watch", FlagLevel::Destination, 3))
        .expect("flag inserts");
    registry
        .insert_rule(rule("rule-siel", FlagLevel::Case, "flag-siel", &["SIEL"], None))
        .expect("rule inserts");
    registry
        .insert_rule(rule("rule-ml1a", FlagLevel::Good, "flag-ml1a", &["ML1a"], Some(false)))
        .expect("rule inserts");
    registry
        .insert_rule(rule("rule-fr", FlagLevel::Destination, "flag-fr", &["FR"], None))
        .expect("rule inserts");

    cases
        .insert(draft_standard_case("case-1", GoodStatus::Draft))
        .expect("case inserts");

    let submitted = service
        .submit_case(&CaseId("case-1".to_string()), &actor("worker", "enforcement", &[]))
        .expect("draft submits");

    assert_eq!(submitted.status, CaseStatus::Submitted);
    assert!(submitted.flags.contains(&FlagId("flag-siel".to_string())));
    // verified_goods_only=false fires even on a draft classification
    assert!(submitted.goods[0].flags.contains(&FlagId("flag-ml1a".to_string())));
    assert!(submitted.parties[0].flags.contains(&FlagId("flag-fr".to_string())));

    let view = service
        .ordered_flags(&CaseId("case-1".to_string()), &Team("enforcement".to_string()), None, true)
        .expect("aggregation runs");
    assert_eq!(view.len(), 3);
    // goods before destinations before case flags
    assert_eq!(view[0].id, FlagId("flag-ml1a".to_string()));
    assert_eq!(view[1].id, FlagId("flag-fr".to_string()));
    assert_eq!(view[2].id, FlagId("flag-siel".to_string()));
}

#[test]
fn verified_only_rule_fires_after_verification_and_reevaluation() {
    let (service, cases, registry, _audit) = build_service();

    registry
        .insert_flag(flag("flag-ml1a", "Small arms", FlagLevel::Good, 1))
        .expect("flag inserts");
    registry
        .insert_rule(rule("rule-ml1a", FlagLevel::Good, "flag-ml1a", &["ML1a"], Some(true)))
        .expect("rule inserts");

    cases
        .insert(draft_standard_case("case-1", GoodStatus::Draft))
        .expect("case inserts");

    let submitted = service
        .submit_case(&CaseId("case-1".to_string()), &actor("worker", "enforcement", &[]))
        .expect("draft submits");
    assert!(submitted.goods[0].flags.is_empty(), "draft classification is skipped");

    let mut verified = submitted;
    verified.goods[0].status = GoodStatus::Verified;
    cases.update(verified).expect("verification persists");

    service
        .apply_rules_to_case(&CaseId("case-1".to_string()))
        .expect("re-evaluation runs");

    let stored = cases
        .fetch(&CaseId("case-1".to_string()))
        .expect("fetch works")
        .expect("case exists");
    assert!(stored.goods[0].flags.contains(&FlagId("flag-ml1a".to_string())));
}

#[test]
fn finalisation_gate_holds_until_the_right_actor_asks() {
    let (service, cases, _registry, audit) = build_service();
    let mut case = draft_standard_case("case-1", GoodStatus::Verified);
    case.status = CaseStatus::UnderFinalReview;
    cases.insert(case).expect("case inserts");

    let id = CaseId("case-1".to_string());

    service
        .change_status(&id, &actor("worker", "enforcement", &[]), CaseStatus::Finalised, None)
        .expect_err("caseworker without the capability is rejected");

    service
        .change_status(
            &id,
            &actor("almost", FINALISING_TEAM, &[]),
            CaseStatus::Finalised,
            None,
        )
        .expect_err("team membership without the capability is rejected");

    let finaliser = actor("finaliser", FINALISING_TEAM, &[Capability::ManageFinalAdvice]);
    let finalised = service
        .change_status(&id, &finaliser, CaseStatus::Finalised, Some("advice issued".to_string()))
        .expect("finalising team member with the capability proceeds");

    assert_eq!(finalised.status, CaseStatus::Finalised);
    let entries = audit.entries();
    assert_eq!(entries.len(), 1, "only the successful transition is audited");
    assert_eq!(entries[0].payload["status"]["new"], json!("finalised"));

    service
        .change_status(&id, &actor("worker", "enforcement", &[]), CaseStatus::UnderReview, None)
        .expect_err("terminal case is locked without the reopen capability");

    let reopener = actor("reopener", "enforcement", &[Capability::ReopenClosedCases]);
    let reopened = service
        .change_status(&id, &reopener, CaseStatus::ReopenedForChanges, None)
        .expect("reopen capability unlocks the terminal case");
    assert_eq!(reopened.status, CaseStatus::ReopenedForChanges);
}

#[test]
fn retroactive_rule_application_reaches_open_cases_only() {
    let (service, cases, registry, _audit) = build_service();
    registry
        .insert_flag(flag("flag-fr", "France watch", FlagLevel::Destination, 1))
        .expect("flag inserts");

    let mut open = draft_standard_case("case-open", GoodStatus::Verified);
    open.status = CaseStatus::UnderReview;
    cases.insert(open).expect("open case inserts");

    let mut draft = draft_standard_case("case-draft", GoodStatus::Verified);
    draft.status = CaseStatus::Draft;
    cases.insert(draft).expect("draft inserts");

    let mut closed = draft_standard_case("case-closed", GoodStatus::Verified);
    closed.status = CaseStatus::Withdrawn;
    cases.insert(closed).expect("closed case inserts");

    service
        .create_rule(
            &rule_manager(),
            rule("rule-fr", FlagLevel::Destination, "flag-fr", &["FR"], None),
        )
        .expect("rule creation applies retroactively");

    let flagged = cases
        .fetch(&CaseId("case-open".to_string()))
        .expect("fetch works")
        .expect("case exists");
    assert!(flagged.parties[0].flags.contains(&FlagId("flag-fr".to_string())));

    for untouched in ["case-draft", "case-closed"] {
        let case = cases
            .fetch(&CaseId(untouched.to_string()))
            .expect("fetch works")
            .expect("case exists");
        assert!(case.parties[0].flags.is_empty(), "{untouched} must stay unflagged");
    }
}

#[tokio::test]
async fn flag_view_is_served_over_http() {
    let (service, cases, registry, _audit) = build_service();
    registry
        .insert_flag(flag("flag-ml1a", "Small arms", FlagLevel::Good, 1))
        .expect("flag inserts");
    registry
        .insert_rule(rule("rule-ml1a", FlagLevel::Good, "flag-ml1a", &["ML1a"], Some(false)))
        .expect("rule inserts");
    cases
        .insert(draft_standard_case("case-1", GoodStatus::Draft))
        .expect("case inserts");

    let router = casework_router(Arc::new(service));

    let submit = axum::http::Request::post("/api/v1/cases/case-1/submit")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(&json!({ "actor": actor("worker", "enforcement", &[]) })).unwrap(),
        ))
        .unwrap();
    let response = router.clone().oneshot(submit).await.expect("submit executes");
    assert_eq!(response.status(), StatusCode::OK);

    let view = axum::http::Request::get("/api/v1/cases/case-1/flags?team=enforcement&distinct=true")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(view).await.expect("view executes");
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let payload: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
    let flags = payload["flags"].as_array().expect("flag list");
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0]["id"], json!("flag-ml1a"));
    assert_eq!(flags[0]["source"], json!("goods"));
}
