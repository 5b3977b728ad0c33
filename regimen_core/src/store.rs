//! Read-only repository interfaces for rules and intake logs.
//!
//! Evaluators never touch persistence directly: they see these narrow
//! traits, so unit tests inject in-memory fixtures and the CLI plugs in
//! the JSONL journal. The backing schema is an external collaborator.

use crate::{Catalog, Error, InteractionRule, LogEntry, RatioRule, Result, TimingRule};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read access to the rule catalog, per rule type.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Interaction rules where either endpoint is in `supplement_ids`
    async fn interaction_rules(&self, supplement_ids: &[String]) -> Result<Vec<InteractionRule>>;

    /// Ratio rules where either endpoint is in `supplement_ids`
    async fn ratio_rules(&self, supplement_ids: &[String]) -> Result<Vec<RatioRule>>;

    /// Timing rules referencing `supplement_id` as source or target
    async fn timing_rules(&self, supplement_id: &str) -> Result<Vec<TimingRule>>;
}

/// Read access to a user's intake history.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Log entries for a user inside `[start, end]`, optionally narrowed to
    /// a supplement set. Returned newest first.
    async fn logs_in_range(
        &self,
        user_id: &str,
        supplement_ids: Option<&[String]>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>>;
}

fn touches(ids: &[String], source: &str, target: &str) -> bool {
    ids.iter().any(|id| id == source || id == target)
}

// ============================================================================
// Catalog-backed rule store
// ============================================================================

/// RuleStore over the static built-in catalog.
pub struct CatalogRules {
    catalog: &'static Catalog,
}

impl CatalogRules {
    pub fn new(catalog: &'static Catalog) -> Self {
        Self { catalog }
    }
}

impl Default for CatalogRules {
    fn default() -> Self {
        Self::new(crate::catalog::get_default_catalog())
    }
}

#[async_trait]
impl RuleStore for CatalogRules {
    async fn interaction_rules(&self, supplement_ids: &[String]) -> Result<Vec<InteractionRule>> {
        Ok(self
            .catalog
            .interaction_rules
            .iter()
            .filter(|r| touches(supplement_ids, &r.source_supplement_id, &r.target_supplement_id))
            .cloned()
            .collect())
    }

    async fn ratio_rules(&self, supplement_ids: &[String]) -> Result<Vec<RatioRule>> {
        Ok(self
            .catalog
            .ratio_rules
            .iter()
            .filter(|r| touches(supplement_ids, &r.source_supplement_id, &r.target_supplement_id))
            .cloned()
            .collect())
    }

    async fn timing_rules(&self, supplement_id: &str) -> Result<Vec<TimingRule>> {
        Ok(self
            .catalog
            .timing_rules
            .iter()
            .filter(|r| {
                r.source_supplement_id == supplement_id || r.target_supplement_id == supplement_id
            })
            .cloned()
            .collect())
    }
}

// ============================================================================
// In-memory fixtures
// ============================================================================

/// In-memory RuleStore for unit tests and custom rule sets.
#[derive(Default)]
pub struct MemoryRules {
    pub interaction: Vec<InteractionRule>,
    pub ratio: Vec<RatioRule>,
    pub timing: Vec<TimingRule>,
}

#[async_trait]
impl RuleStore for MemoryRules {
    async fn interaction_rules(&self, supplement_ids: &[String]) -> Result<Vec<InteractionRule>> {
        Ok(self
            .interaction
            .iter()
            .filter(|r| touches(supplement_ids, &r.source_supplement_id, &r.target_supplement_id))
            .cloned()
            .collect())
    }

    async fn ratio_rules(&self, supplement_ids: &[String]) -> Result<Vec<RatioRule>> {
        Ok(self
            .ratio
            .iter()
            .filter(|r| touches(supplement_ids, &r.source_supplement_id, &r.target_supplement_id))
            .cloned()
            .collect())
    }

    async fn timing_rules(&self, supplement_id: &str) -> Result<Vec<TimingRule>> {
        Ok(self
            .timing
            .iter()
            .filter(|r| {
                r.source_supplement_id == supplement_id || r.target_supplement_id == supplement_id
            })
            .cloned()
            .collect())
    }
}

/// In-memory LogStore for unit tests.
#[derive(Default)]
pub struct MemoryLogs {
    pub entries: Vec<LogEntry>,
}

impl MemoryLogs {
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl LogStore for MemoryLogs {
    async fn logs_in_range(
        &self,
        user_id: &str,
        supplement_ids: Option<&[String]>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>> {
        let mut matched: Vec<LogEntry> = self
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| e.logged_at >= start && e.logged_at <= end)
            .filter(|e| match supplement_ids {
                Some(ids) => ids.iter().any(|id| *id == e.supplement_id),
                None => true,
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
        Ok(matched)
    }
}

/// A LogStore that always fails; used to exercise the fatal local-path
/// error contract in tests.
pub struct UnavailableLogs;

#[async_trait]
impl LogStore for UnavailableLogs {
    async fn logs_in_range(
        &self,
        _user_id: &str,
        _supplement_ids: Option<&[String]>,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>> {
        Err(Error::Store("log storage unavailable".into()))
    }
}
