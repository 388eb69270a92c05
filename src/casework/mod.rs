//! Rule-based flagging engine and case-status state machine for
//! export-licence casework.

pub mod aggregation;
pub mod audit;
pub mod case;
pub mod domain;
pub mod engine;
pub mod flags;
pub mod memory;
pub mod refdata;
pub mod repository;
pub mod router;
pub mod service;
pub mod status;

#[cfg(test)]
mod tests;

pub use aggregation::{FlagSource, VisibleFlag};
pub use audit::{AuditEntry, AuditError, AuditSink, AuditVerb};
pub use case::{
    Case, CountryOnCase, GoodOnCase, GoodStatus, GoodsTypeOnCase, OrganisationOnCase, PartyOnCase,
};
pub use domain::{
    Capability, CaseId, CaseStatus, CaseSubType, CaseType, CaseTypeReference, CaseworkActor,
    FlagId, GoodId, OrganisationId, PartyId, RuleId, Team,
};
pub use flags::{Flag, FlagLevel, FlagStatus, FlaggingRule, RuleValidationError};
pub use repository::{CaseRepository, FlagRegistry, RegistryError, RepositoryError};
pub use router::casework_router;
pub use service::{CaseworkService, CaseworkServiceError};
pub use status::{TransitionDenied, TransitionGuard};
