use super::domain::{Capability, CaseStatus, CaseworkActor, Team};

/// A status transition rejected before any mutation. Each variant names
/// the rule that failed so callers can render an actionable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionDenied {
    #[error(
        "finalising a case requires the manage_final_advice capability and membership of the {team} team"
    )]
    FinalisePermission { team: Team },
    #[error("status {0} is set by internal workflows and cannot be requested directly")]
    SystemManagedStatus(CaseStatus),
    #[error("case is in terminal status {0}; changing it requires the reopen_closed_cases capability")]
    TerminalReopenPermission(CaseStatus),
}

/// Permission- and team-sensitive gate evaluated before every requested
/// status change.
#[derive(Debug, Clone)]
pub struct TransitionGuard {
    finalising_team: Team,
}

impl TransitionGuard {
    pub fn new(finalising_team: Team) -> Self {
        Self { finalising_team }
    }

    pub fn finalising_team(&self) -> &Team {
        &self.finalising_team
    }

    /// Decide whether `actor` may move a case from `current` to
    /// `requested`. Finalisation is decided entirely by rule one, so a
    /// finaliser can re-finalise without the reopen capability.
    pub fn authorize(
        &self,
        actor: &CaseworkActor,
        current: CaseStatus,
        requested: CaseStatus,
    ) -> Result<(), TransitionDenied> {
        if requested == CaseStatus::Finalised {
            return if actor.has_capability(Capability::ManageFinalAdvice)
                && actor.belongs_to(&self.finalising_team)
            {
                Ok(())
            } else {
                Err(TransitionDenied::FinalisePermission {
                    team: self.finalising_team.clone(),
                })
            };
        }

        if matches!(
            requested,
            CaseStatus::ApplicantEditing | CaseStatus::SupersededByExporterEdit
        ) {
            return Err(TransitionDenied::SystemManagedStatus(requested));
        }

        if current.is_terminal() && !actor.has_capability(Capability::ReopenClosedCases) {
            return Err(TransitionDenied::TerminalReopenPermission(current));
        }

        Ok(())
    }
}
