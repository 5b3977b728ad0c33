#![forbid(unsafe_code)]

//! Core domain model and evaluation logic for the Regimen supplement
//! tracking system.
//!
//! This crate provides:
//! - Domain types (supplements, intake logs, rules, warnings)
//! - The built-in supplement/rule catalog with PK parameters
//! - Interaction, ratio and timing evaluators
//! - Pharmacokinetic simulation (active compounds, exclusion zones,
//!   optimization opportunities)
//! - The remote engine client and its local fallback
//! - Intake journal persistence (JSONL)

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod store;
pub mod journal;
pub mod ratio;
pub mod interaction;
pub mod timing;
pub mod pharma;
pub mod remote;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::Config;
pub use store::{CatalogRules, LogStore, MemoryLogs, MemoryRules, RuleStore};
pub use journal::{IntakeSink, JournalLogStore, JsonlJournal};
pub use remote::EngineClient;
pub use engine::{
    dashboard_snapshot, evaluate_log_event, AnalysisBackend, FallbackBackend, LocalBackend,
    LogEventRequest,
};
