use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::CaseId;

/// Verbs recorded against the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditVerb {
    UpdatedStatus,
    SubmittedCase,
    AddedFlags,
    RemovedFlags,
    CreatedFlag,
    UpdatedFlag,
    CreatedFlaggingRule,
    UpdatedFlaggingRule,
}

/// One append-only audit record. Payload shape is verb-specific JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub actor: String,
    pub verb: AuditVerb,
    pub case: Option<CaseId>,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(actor: impl Into<String>, verb: AuditVerb, case: Option<CaseId>) -> Self {
        Self {
            actor: actor.into(),
            verb,
            case,
            payload: serde_json::Value::Null,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Outbound audit hook. Recording is best-effort from the engine's side:
/// the service logs failures and never rolls back the mutation that
/// preceded them.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}
