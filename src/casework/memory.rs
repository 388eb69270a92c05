//! In-memory adapters for the storage and audit seams. The demo command
//! and the test suites run the full engine against these; a deployment
//! swaps in database-backed implementations of the same traits.

use std::collections::HashMap;
use std::sync::Mutex;

use super::audit::{AuditEntry, AuditError, AuditSink};
use super::case::Case;
use super::domain::{CaseId, FlagId, RuleId};
use super::flags::{Flag, FlagLevel, FlaggingRule};
use super::repository::{CaseRepository, FlagRegistry, RegistryError, RepositoryError};

#[derive(Default)]
pub struct MemoryCaseRepository {
    cases: Mutex<HashMap<CaseId, Case>>,
}

impl CaseRepository for MemoryCaseRepository {
    fn insert(&self, case: Case) -> Result<Case, RepositoryError> {
        let mut guard = self.cases.lock().expect("case store mutex poisoned");
        if guard.contains_key(&case.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(case.id.clone(), case.clone());
        Ok(case)
    }

    fn update(&self, case: Case) -> Result<(), RepositoryError> {
        let mut guard = self.cases.lock().expect("case store mutex poisoned");
        if !guard.contains_key(&case.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(case.id.clone(), case);
        Ok(())
    }

    fn fetch(&self, id: &CaseId) -> Result<Option<Case>, RepositoryError> {
        let guard = self.cases.lock().expect("case store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn open_cases(&self) -> Result<Vec<Case>, RepositoryError> {
        let guard = self.cases.lock().expect("case store mutex poisoned");
        let mut open: Vec<Case> = guard
            .values()
            .filter(|case| !case.status.is_draft() && !case.status.is_terminal())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(open)
    }
}

#[derive(Default)]
pub struct MemoryFlagRegistry {
    flags: Mutex<HashMap<FlagId, Flag>>,
    rules: Mutex<HashMap<RuleId, FlaggingRule>>,
}

impl MemoryFlagRegistry {
    fn sorted_rules<F>(&self, keep: F) -> Vec<FlaggingRule>
    where
        F: Fn(&FlaggingRule) -> bool,
    {
        let guard = self.rules.lock().expect("rule store mutex poisoned");
        let mut rules: Vec<FlaggingRule> = guard.values().filter(|rule| keep(rule)).cloned().collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules
    }
}

impl FlagRegistry for MemoryFlagRegistry {
    fn flag(&self, id: &FlagId) -> Result<Option<Flag>, RegistryError> {
        let guard = self.flags.lock().expect("flag store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert_flag(&self, flag: Flag) -> Result<(), RegistryError> {
        let mut guard = self.flags.lock().expect("flag store mutex poisoned");
        if guard.contains_key(&flag.id) || guard.values().any(|other| other.name == flag.name) {
            return Err(RegistryError::Conflict);
        }
        guard.insert(flag.id.clone(), flag);
        Ok(())
    }

    fn update_flag(&self, flag: Flag) -> Result<(), RegistryError> {
        let mut guard = self.flags.lock().expect("flag store mutex poisoned");
        if !guard.contains_key(&flag.id) {
            return Err(RegistryError::NotFound);
        }
        guard.insert(flag.id.clone(), flag);
        Ok(())
    }

    fn rule(&self, id: &RuleId) -> Result<Option<FlaggingRule>, RegistryError> {
        let guard = self.rules.lock().expect("rule store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn rules(&self) -> Result<Vec<FlaggingRule>, RegistryError> {
        Ok(self.sorted_rules(|_| true))
    }

    fn active_rules(&self, level: FlagLevel) -> Result<Vec<FlaggingRule>, RegistryError> {
        let flags = self.flags.lock().expect("flag store mutex poisoned");
        let guard = self.rules.lock().expect("rule store mutex poisoned");
        let mut rules: Vec<FlaggingRule> = guard
            .values()
            .filter(|rule| {
                rule.level == level
                    && rule.is_active()
                    && flags
                        .get(&rule.flag)
                        .map(Flag::is_active)
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }

    fn rules_for_flag(&self, flag: &FlagId) -> Result<Vec<FlaggingRule>, RegistryError> {
        Ok(self.sorted_rules(|rule| &rule.flag == flag))
    }

    fn insert_rule(&self, rule: FlaggingRule) -> Result<(), RegistryError> {
        let mut guard = self.rules.lock().expect("rule store mutex poisoned");
        if guard.contains_key(&rule.id) {
            return Err(RegistryError::Conflict);
        }
        guard.insert(rule.id.clone(), rule);
        Ok(())
    }

    fn update_rule(&self, rule: FlaggingRule) -> Result<(), RegistryError> {
        let mut guard = self.rules.lock().expect("rule store mutex poisoned");
        if !guard.contains_key(&rule.id) {
            return Err(RegistryError::NotFound);
        }
        guard.insert(rule.id.clone(), rule);
        Ok(())
    }
}

/// Collects audit entries so tests and the demo can assert on ordering.
#[derive(Default)]
pub struct RecordingAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().expect("audit mutex poisoned").push(entry);
        Ok(())
    }
}
