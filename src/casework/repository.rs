use super::case::Case;
use super::domain::{CaseId, FlagId, RuleId};
use super::flags::{Flag, FlagLevel, FlaggingRule};

/// Storage abstraction for cases so the engine and service can be
/// exercised against in-memory fakes or a real store.
pub trait CaseRepository: Send + Sync {
    fn insert(&self, case: Case) -> Result<Case, RepositoryError>;
    fn update(&self, case: Case) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &CaseId) -> Result<Option<Case>, RepositoryError>;
    /// Cases in a non-draft, non-terminal status — the population
    /// retroactive rule application walks.
    fn open_cases(&self) -> Result<Vec<Case>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("case already exists")]
    Conflict,
    #[error("case not found")]
    NotFound,
    #[error("case store unavailable: {0}")]
    Unavailable(String),
}

/// Flags and flagging rules, queried live at every evaluation so
/// administrative edits take effect without cache invalidation.
pub trait FlagRegistry: Send + Sync {
    fn flag(&self, id: &FlagId) -> Result<Option<Flag>, RegistryError>;
    fn insert_flag(&self, flag: Flag) -> Result<(), RegistryError>;
    fn update_flag(&self, flag: Flag) -> Result<(), RegistryError>;

    fn rule(&self, id: &RuleId) -> Result<Option<FlaggingRule>, RegistryError>;
    fn rules(&self) -> Result<Vec<FlaggingRule>, RegistryError>;
    /// Rules at `level` whose own status and referenced flag are both
    /// active. This is the only view the evaluator ever sees.
    fn active_rules(&self, level: FlagLevel) -> Result<Vec<FlaggingRule>, RegistryError>;
    fn rules_for_flag(&self, flag: &FlagId) -> Result<Vec<FlaggingRule>, RegistryError>;
    fn insert_rule(&self, rule: FlaggingRule) -> Result<(), RegistryError>;
    fn update_rule(&self, rule: FlaggingRule) -> Result<(), RegistryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("flag or rule already exists")]
    Conflict,
    #[error("flag or rule not found")]
    NotFound,
    #[error("flag registry unavailable: {0}")]
    Unavailable(String),
}
