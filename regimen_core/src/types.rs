//! Core domain types for the Regimen interaction engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Supplements, dose units and intake log entries
//! - Interaction, ratio and timing rules
//! - Derived pharmacokinetic entities (active compounds, exclusion zones,
//!   optimization opportunities)
//! - Evaluation requests, outcomes and provenance tags

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Supplement Types
// ============================================================================

/// Physical form a supplement is taken in
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SupplementForm {
    Capsule,
    Tablet,
    Powder,
    Liquid,
    Gummy,
}

/// Broad supplement category
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SupplementCategory {
    Mineral,
    Vitamin,
    AminoAcid,
    Stimulant,
    FattyAcid,
    Herb,
    Other,
}

/// A supplement definition (e.g., "Zinc Picolinate")
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Supplement {
    pub id: String,
    pub name: String,
    pub form: SupplementForm,
    pub category: SupplementCategory,
}

/// Dose unit as logged by the user.
///
/// Units are carried verbatim and never converted to a common basis;
/// ratio evaluation compares raw magnitudes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseUnit {
    Mg,
    Mcg,
    G,
    Iu,
    Ml,
}

impl DoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseUnit::Mg => "mg",
            DoseUnit::Mcg => "mcg",
            DoseUnit::G => "g",
            DoseUnit::Iu => "IU",
            DoseUnit::Ml => "ml",
        }
    }

    /// Parse a unit string as logged by the CLI or the remote engine
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mg" => Some(DoseUnit::Mg),
            "mcg" | "ug" => Some(DoseUnit::Mcg),
            "g" => Some(DoseUnit::G),
            "iu" => Some(DoseUnit::Iu),
            "ml" => Some(DoseUnit::Ml),
            _ => None,
        }
    }
}

// ============================================================================
// Intake Log Types
// ============================================================================

/// A recorded supplement intake.
///
/// Entries are immutable once created; corrections remove and re-log rather
/// than mutating dosage or time in place, so derived warnings stay honest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub supplement_id: String,
    pub dosage: f64,
    pub unit: DoseUnit,
    pub logged_at: DateTime<Utc>,
}

/// One entry of a stack under evaluation.
///
/// Dosage is optional: entries without a known dosage still participate in
/// interaction matching but are skipped by the ratio evaluator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StackEntry {
    pub supplement_id: String,
    pub dosage: Option<f64>,
    pub unit: Option<DoseUnit>,
}

impl StackEntry {
    pub fn dosed(supplement_id: impl Into<String>, dosage: f64, unit: DoseUnit) -> Self {
        Self {
            supplement_id: supplement_id.into(),
            dosage: Some(dosage),
            unit: Some(unit),
        }
    }

    pub fn bare(supplement_id: impl Into<String>) -> Self {
        Self {
            supplement_id: supplement_id.into(),
            dosage: None,
            unit: None,
        }
    }
}

// ============================================================================
// Rule Types
// ============================================================================

/// Kind of pairwise chemical relationship
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Inhibition,
    Synergy,
    Competition,
}

/// Warning severity
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    Critical,
}

/// A directionless pairwise relationship between two supplements.
///
/// Evaluators must match the rule regardless of which side of it appears
/// first in the caller's set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InteractionRule {
    pub id: String,
    pub source_supplement_id: String,
    pub target_supplement_id: String,
    pub kind: InteractionKind,
    pub severity: Severity,
    pub mechanism: String,
    pub research_url: Option<String>,
    pub suggestion: Option<String>,
}

/// An acceptable dosage-ratio band between two supplements.
///
/// The ratio is `source dosage / target dosage` in the rule's declared
/// units; no unit normalization is performed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RatioRule {
    pub id: String,
    pub source_supplement_id: String,
    pub target_supplement_id: String,
    pub min_ratio: Option<f64>,
    pub max_ratio: Option<f64>,
    pub optimal_ratio: Option<f64>,
    pub severity: Severity,
    pub warning_message: String,
    pub research_url: Option<String>,
}

/// A minimum required separation, in hours, between intake of two
/// supplements. Symmetric: either supplement may be the newly logged one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimingRule {
    pub id: String,
    pub source_supplement_id: String,
    pub target_supplement_id: String,
    pub min_hours_apart: f64,
    pub severity: Severity,
    pub reason: String,
}

impl TimingRule {
    /// The other endpoint of the rule relative to `supplement_id`, if the
    /// rule references it at all.
    pub fn counterpart(&self, supplement_id: &str) -> Option<&str> {
        if self.source_supplement_id == supplement_id {
            Some(&self.target_supplement_id)
        } else if self.target_supplement_id == supplement_id {
            Some(&self.source_supplement_id)
        } else {
            None
        }
    }
}

// ============================================================================
// Pharmacokinetic Types
// ============================================================================

/// Static absorption/elimination parameters for one supplement.
///
/// Lookup data keyed by supplement id in the catalog, not behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PkParams {
    /// Minutes from intake to peak plasma concentration
    pub peak_minutes: f64,
    /// Elimination half-life in minutes
    pub half_life_minutes: f64,
    /// Fraction of the dose reaching circulation, as a percentage
    pub bioavailability_percent: f64,
}

/// Phase of a simulated compound relative to its concentration curve
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompoundPhase {
    Absorbing,
    Peak,
    Eliminating,
    Cleared,
}

/// A supplement with simulated concentration above the detection floor.
///
/// Recomputed on every request from log entries and static PK parameters;
/// never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveCompound {
    pub log_id: Uuid,
    pub supplement_id: String,
    pub dosage: f64,
    pub unit: DoseUnit,
    pub logged_at: DateTime<Utc>,
    pub peak_minutes: f64,
    pub half_life_minutes: f64,
    pub bioavailability_percent: f64,
    pub phase: CompoundPhase,
    pub concentration_percent: f64,
}

/// A computed window during which a supplement should not be taken.
///
/// Zones with `ends_at` in the past are expired and treated as cleared.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExclusionZone {
    pub rule_id: String,
    pub source_supplement_id: String,
    pub target_supplement_id: String,
    pub target_supplement_name: String,
    pub ends_at: DateTime<Utc>,
    pub minutes_remaining: i64,
    pub reason: String,
    pub severity: Severity,
}

/// Kind of optimization opportunity
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationKind {
    Timing,
    Synergy,
    Balance,
}

/// A suggestion derived from the current stack state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizationOpportunity {
    pub kind: OptimizationKind,
    pub category: String,
    pub supplement_ids: Vec<String>,
    pub title: String,
    pub description: String,
    pub priority: u8,
    pub suggestion_key: String,
    pub safety_warning: Option<String>,
    pub suggested_supplement: Option<String>,
}

// ============================================================================
// Evaluator Output Types
// ============================================================================

/// A matched interaction rule, with the full rule payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InteractionWarning {
    pub rule_id: String,
    pub source_supplement_id: String,
    pub target_supplement_id: String,
    pub kind: InteractionKind,
    pub severity: Severity,
    pub mechanism: String,
    pub research_url: Option<String>,
    pub suggestion: Option<String>,
}

impl From<&InteractionRule> for InteractionWarning {
    fn from(rule: &InteractionRule) -> Self {
        Self {
            rule_id: rule.id.clone(),
            source_supplement_id: rule.source_supplement_id.clone(),
            target_supplement_id: rule.target_supplement_id.clone(),
            kind: rule.kind.clone(),
            severity: rule.severity.clone(),
            mechanism: rule.mechanism.clone(),
            research_url: rule.research_url.clone(),
            suggestion: rule.suggestion.clone(),
        }
    }
}

/// An out-of-band dosage ratio
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RatioWarning {
    pub rule_id: String,
    pub source_supplement_id: String,
    pub target_supplement_id: String,
    /// Raw ratio, rounded to one decimal
    pub actual_ratio: f64,
    pub optimal_ratio: Option<f64>,
    pub severity: Severity,
    pub message: String,
}

/// A ratio rule that could not be evaluated because one endpoint was never
/// logged (e.g. zinc without copper)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RatioGap {
    pub rule_id: String,
    pub present_supplement_id: String,
    pub missing_supplement_id: String,
    pub severity: Severity,
    pub message: String,
}

/// Two intakes closer together than a timing rule allows.
///
/// `conflicting_log_id`/`conflicting_logged_at` are optional because the
/// remote engine response may omit the original log's identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimingWarning {
    pub rule_id: String,
    pub source_supplement_id: String,
    pub target_supplement_id: String,
    pub conflicting_log_id: Option<Uuid>,
    pub conflicting_logged_at: Option<DateTime<Utc>>,
    /// Observed separation in hours, rounded to two decimals
    pub actual_hours_apart: f64,
    pub min_hours_apart: f64,
    pub severity: Severity,
    pub reason: String,
}

// ============================================================================
// Evaluation Request / Outcome Types
// ============================================================================

/// Authenticated caller identity, passed explicitly into evaluation entry
/// points. Its absence is an expected fallback trigger, not an error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: String,
    pub session_token: Option<String>,
}

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_token: None,
        }
    }
}

/// Why a request was served by the local path instead of the remote engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NotConfigured,
    NoSession,
    Timeout,
    HttpStatus,
    NetworkError,
    InvalidResponse,
    Unknown,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NotConfigured => "not_configured",
            FallbackReason::NoSession => "no_session",
            FallbackReason::Timeout => "timeout",
            FallbackReason::HttpStatus => "http_status",
            FallbackReason::NetworkError => "network_error",
            FallbackReason::InvalidResponse => "invalid_response",
            FallbackReason::Unknown => "unknown",
        }
    }
}

/// Which path served an evaluation. Internal telemetry only: outcomes are
/// otherwise indistinguishable between paths.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSource {
    Remote,
    Fallback(FallbackReason),
    Local,
}

/// A stack analysis request (interactions + ratios)
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub identity: Option<CallerIdentity>,
    pub stack: Vec<StackEntry>,
}

/// A timing-conflict check for a newly logged intake
#[derive(Clone, Debug)]
pub struct TimingRequest {
    pub identity: Option<CallerIdentity>,
    pub user_id: String,
    pub supplement_id: String,
    pub logged_at: DateTime<Utc>,
}

/// Result of a stack analysis
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub interactions: Vec<InteractionWarning>,
    pub synergies: Vec<InteractionWarning>,
    pub ratio_warnings: Vec<RatioWarning>,
    pub ratio_gaps: Vec<RatioGap>,
    pub served_by: EvaluationSource,
}

impl AnalysisOutcome {
    pub fn empty(served_by: EvaluationSource) -> Self {
        Self {
            interactions: Vec::new(),
            synergies: Vec::new(),
            ratio_warnings: Vec::new(),
            ratio_gaps: Vec::new(),
            served_by,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.interactions.is_empty()
            && self.synergies.is_empty()
            && self.ratio_warnings.is_empty()
            && self.ratio_gaps.is_empty()
    }
}

/// Result of a timing-conflict check
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimingOutcome {
    pub warnings: Vec<TimingWarning>,
    pub served_by: EvaluationSource,
}

/// Combined warnings for a single triggering log event, narrowed to what is
/// new about this exact action
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEventWarnings {
    pub interactions: Vec<InteractionWarning>,
    pub synergies: Vec<InteractionWarning>,
    pub ratio_warnings: Vec<RatioWarning>,
    pub ratio_gaps: Vec<RatioGap>,
    pub timing_warnings: Vec<TimingWarning>,
    pub served_by: EvaluationSource,
}

// ============================================================================
// Dashboard Projection Types
// ============================================================================

/// One sampled point of the concentration timeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub at: DateTime<Utc>,
    /// Concentration percent per supplement id
    pub concentrations: HashMap<String, f64>,
}

/// Everything the dashboard needs for one load; a pure projection of the
/// current log state and rule catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub active_compounds: Vec<ActiveCompound>,
    pub exclusion_zones: Vec<ExclusionZone>,
    pub optimizations: Vec<OptimizationOpportunity>,
    pub bio_score: u8,
    pub timeline: Vec<TimelinePoint>,
}

// ============================================================================
// Catalog Type
// ============================================================================

/// A suggested co-factor pairing used for optimization opportunities
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CofactorPairing {
    pub supplement_id: String,
    pub cofactor_id: String,
    pub category: String,
    pub description: String,
    pub safety_warning: Option<String>,
}

/// The complete catalog of supplements, PK parameters and rules
#[derive(Clone, Debug)]
pub struct Catalog {
    pub supplements: HashMap<String, Supplement>,
    pub pk_params: HashMap<String, PkParams>,
    pub interaction_rules: Vec<InteractionRule>,
    pub ratio_rules: Vec<RatioRule>,
    pub timing_rules: Vec<TimingRule>,
    pub cofactors: Vec<CofactorPairing>,
}

impl Catalog {
    /// Display name for a supplement id, falling back to the id itself
    pub fn supplement_name(&self, id: &str) -> String {
        self.supplements
            .get(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}
