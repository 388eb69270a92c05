use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::aggregation::{self, VisibleFlag};
use super::audit::{AuditEntry, AuditSink, AuditVerb};
use super::case::Case;
use super::domain::{Capability, CaseId, CaseStatus, CaseworkActor, FlagId, RuleId, Team};
use super::engine;
use super::flags::{self, Flag, FlagStatus, FlaggingRule, RuleValidationError};
use super::repository::{CaseRepository, FlagRegistry, RegistryError, RepositoryError};
use super::status::{TransitionDenied, TransitionGuard};

/// Service composing the case store, flag registry, audit sink, and
/// transition guard. All engine entry points callers should use live
/// here; the evaluator and aggregator modules stay pure.
pub struct CaseworkService<R, F, A> {
    cases: Arc<R>,
    registry: Arc<F>,
    audit: Arc<A>,
    guard: TransitionGuard,
}

impl<R, F, A> CaseworkService<R, F, A>
where
    R: CaseRepository + 'static,
    F: FlagRegistry + 'static,
    A: AuditSink + 'static,
{
    pub fn new(cases: Arc<R>, registry: Arc<F>, audit: Arc<A>, finalising_team: Team) -> Self {
        Self {
            cases,
            registry,
            audit,
            guard: TransitionGuard::new(finalising_team),
        }
    }

    pub fn registry(&self) -> &F {
        &self.registry
    }

    /// Register a newly drafted case.
    pub fn register_case(&self, case: Case) -> Result<Case, CaseworkServiceError> {
        let stored = self.cases.insert(case)?;
        Ok(stored)
    }

    pub fn case(&self, id: &CaseId) -> Result<Case, CaseworkServiceError> {
        let case = self.cases.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        Ok(case)
    }

    /// Move a draft to `Submitted`, audit the submission, and run the
    /// flagging rules for the first time.
    pub fn submit_case(
        &self,
        id: &CaseId,
        actor: &CaseworkActor,
    ) -> Result<Case, CaseworkServiceError> {
        let mut case = self.cases.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        if !case.status.is_draft() {
            return Err(CaseworkServiceError::NotDraft(case.status));
        }

        case.status = CaseStatus::Submitted;
        self.cases.update(case.clone())?;

        self.record(
            AuditEntry::new(&actor.id, AuditVerb::SubmittedCase, Some(case.id.clone()))
                .with_payload(json!({ "reference": case.reference })),
        );

        if engine::apply_rules_to_case(&mut case, self.registry.as_ref())? {
            self.cases.update(case.clone())?;
        }

        Ok(case)
    }

    /// Guarded status change. On success the audit record is written
    /// before the rule evaluator runs; a rejection mutates nothing and
    /// writes no audit record.
    pub fn change_status(
        &self,
        id: &CaseId,
        actor: &CaseworkActor,
        new_status: CaseStatus,
        note: Option<String>,
    ) -> Result<Case, CaseworkServiceError> {
        let mut case = self.cases.fetch(id)?.ok_or(RepositoryError::NotFound)?;

        self.guard.authorize(actor, case.status, new_status)?;

        let old_status = case.status;
        case.status = new_status;
        self.cases.update(case.clone())?;

        self.record(
            AuditEntry::new(&actor.id, AuditVerb::UpdatedStatus, Some(case.id.clone()))
                .with_payload(json!({
                    "status": { "new": new_status.label(), "old": old_status.label() },
                    "additional_text": note,
                })),
        );

        if engine::apply_rules_to_case(&mut case, self.registry.as_ref())? {
            self.cases.update(case.clone())?;
        }

        Ok(case)
    }

    /// Re-run the full active rule set over one case. Safe to call any
    /// number of times.
    pub fn apply_rules_to_case(&self, id: &CaseId) -> Result<(), CaseworkServiceError> {
        let mut case = self.cases.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        if engine::apply_rules_to_case(&mut case, self.registry.as_ref())? {
            self.cases.update(case)?;
        }
        Ok(())
    }

    /// Walk all open cases and apply just this rule to each, skipping
    /// cases its criteria cannot match. Inactive rules (or rules whose
    /// flag is inactive) never attach.
    pub fn apply_rule_retroactively(&self, rule_id: &RuleId) -> Result<(), CaseworkServiceError> {
        let rule = self
            .registry
            .rule(rule_id)?
            .ok_or(RegistryError::NotFound)?;

        if !rule.is_active() {
            return Ok(());
        }
        let flag_active = self
            .registry
            .flag(&rule.flag)?
            .map(|flag| flag.is_active())
            .unwrap_or(false);
        if !flag_active {
            return Ok(());
        }

        let mut touched = 0usize;
        for mut case in self.cases.open_cases()? {
            if engine::apply_single_rule(&mut case, &rule) {
                self.cases.update(case)?;
                touched += 1;
            }
        }
        debug!(rule = %rule.id.0, touched, "retroactive rule application finished");
        Ok(())
    }

    pub fn create_flag(
        &self,
        actor: &CaseworkActor,
        flag: Flag,
    ) -> Result<(), CaseworkServiceError> {
        self.registry.insert_flag(flag.clone())?;
        self.record(
            AuditEntry::new(&actor.id, AuditVerb::CreatedFlag, None)
                .with_payload(json!({ "flag": flag.name, "level": flag.level.label() })),
        );
        Ok(())
    }

    /// Activate or deactivate a flag. Deactivation leaves prior
    /// attachments in place; the flag just stops matching and showing.
    pub fn set_flag_status(
        &self,
        actor: &CaseworkActor,
        flag_id: &FlagId,
        status: FlagStatus,
    ) -> Result<(), CaseworkServiceError> {
        if !actor.has_capability(Capability::ActivateFlags) {
            return Err(CaseworkServiceError::FlagActivationDenied);
        }

        let mut flag = self
            .registry
            .flag(flag_id)?
            .ok_or(RegistryError::NotFound)?;
        flag.status = status;
        self.registry.update_flag(flag.clone())?;

        self.record(
            AuditEntry::new(&actor.id, AuditVerb::UpdatedFlag, None)
                .with_payload(json!({ "flag": flag.name, "status": status })),
        );

        // A reactivated flag's rules become eligible again.
        if status == FlagStatus::Active {
            for rule in self.registry.rules_for_flag(flag_id)? {
                self.apply_rule_retroactively(&rule.id)?;
            }
        }
        Ok(())
    }

    /// Validate and register a rule, then apply it across open cases.
    pub fn create_rule(
        &self,
        actor: &CaseworkActor,
        rule: FlaggingRule,
    ) -> Result<(), CaseworkServiceError> {
        if !actor.has_capability(Capability::ManageFlaggingRules) {
            return Err(CaseworkServiceError::RuleManagementDenied);
        }

        let flag = self.registry.flag(&rule.flag)?;
        let existing = self.registry.rules()?;
        flags::validate_rule(&rule, flag.as_ref(), &existing)?;

        self.registry.insert_rule(rule.clone())?;
        self.record(
            AuditEntry::new(&actor.id, AuditVerb::CreatedFlaggingRule, None).with_payload(json!({
                "level": rule.level.label(),
                "matching_values": rule.matching_values,
            })),
        );

        self.apply_rule_retroactively(&rule.id)?;
        Ok(())
    }

    /// Deactivate or reactivate a rule. Reactivation re-applies it
    /// retroactively; deactivation never detaches previously attached
    /// flags.
    pub fn set_rule_status(
        &self,
        actor: &CaseworkActor,
        rule_id: &RuleId,
        status: FlagStatus,
    ) -> Result<(), CaseworkServiceError> {
        if !actor.has_capability(Capability::ManageFlaggingRules) {
            return Err(CaseworkServiceError::RuleManagementDenied);
        }

        let mut rule = self
            .registry
            .rule(rule_id)?
            .ok_or(RegistryError::NotFound)?;
        rule.status = status;
        self.registry.update_rule(rule.clone())?;

        self.record(
            AuditEntry::new(&actor.id, AuditVerb::UpdatedFlaggingRule, None)
                .with_payload(json!({ "rule": rule.id, "status": status })),
        );

        if status == FlagStatus::Active {
            self.apply_rule_retroactively(rule_id)?;
        }
        Ok(())
    }

    /// Detach a flag from a case's direct flag set, honouring the flag's
    /// removable-by capability tag.
    pub fn detach_flag(
        &self,
        id: &CaseId,
        actor: &CaseworkActor,
        flag_id: &FlagId,
        note: Option<String>,
    ) -> Result<(), CaseworkServiceError> {
        let flag = self
            .registry
            .flag(flag_id)?
            .ok_or(RegistryError::NotFound)?;

        if let Some(required) = flag.removable_by {
            if !actor.has_capability(required) {
                return Err(CaseworkServiceError::FlagRemovalDenied {
                    flag: flag.name,
                    capability: required,
                });
            }
        }

        let mut case = self.cases.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        if case.flags.remove(flag_id) {
            self.cases.update(case.clone())?;
            self.record(
                AuditEntry::new(&actor.id, AuditVerb::RemovedFlags, Some(case.id))
                    .with_payload(json!({
                        "removed_flags": [flag.name],
                        "additional_text": note,
                    })),
            );
        }
        Ok(())
    }

    /// Ordered flag view for display (§ aggregation).
    pub fn ordered_flags(
        &self,
        id: &CaseId,
        team: &Team,
        limit: Option<usize>,
        distinct: bool,
    ) -> Result<Vec<VisibleFlag>, CaseworkServiceError> {
        let case = self.cases.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        let flags =
            aggregation::get_ordered_flags(&case, self.registry.as_ref(), team, limit, distinct)?;
        Ok(flags)
    }

    pub fn finalisation_blockers(
        &self,
        id: &CaseId,
        team: &Team,
    ) -> Result<Vec<VisibleFlag>, CaseworkServiceError> {
        let case = self.cases.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        let blockers = aggregation::finalisation_blockers(&case, self.registry.as_ref(), team)?;
        Ok(blockers)
    }

    /// Audit writes are best-effort: a failing sink is logged and never
    /// rolls back the mutation it describes.
    fn record(&self, entry: AuditEntry) {
        if let Err(error) = self.audit.record(entry) {
            warn!(%error, "audit record dropped");
        }
    }
}

/// Error raised by the casework service.
#[derive(Debug, thiserror::Error)]
pub enum CaseworkServiceError {
    #[error(transparent)]
    Transition(#[from] TransitionDenied),
    #[error(transparent)]
    RuleValidation(#[from] RuleValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("only draft cases can be submitted (status is {0})")]
    NotDraft(CaseStatus),
    #[error("flagging rules require the manage_flagging_rules capability")]
    RuleManagementDenied,
    #[error("flag activation requires the activate_flags capability")]
    FlagActivationDenied,
    #[error("flag {flag} may only be removed by holders of {capability}")]
    FlagRemovalDenied { flag: String, capability: Capability },
}
