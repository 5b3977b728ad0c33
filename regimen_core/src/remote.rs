//! HTTP client for the remote evaluation engine.
//!
//! The engine is authoritative when reachable; every failure here is
//! classified for telemetry and recovered by the local evaluators, so no
//! error type in this module ever crosses the crate boundary.

use crate::config::EngineConfig;
use crate::{
    AnalysisOutcome, CallerIdentity, Error, EvaluationSource, InteractionKind, InteractionWarning,
    RatioGap, RatioWarning, Result, Severity, StackEntry, TimingWarning,
};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Header carrying the internal service key
const SERVICE_KEY_HEADER: &str = "x-service-key";

/// Header carrying the authenticated caller identity
const CALLER_ID_HEADER: &str = "x-caller-id";

/// Classified failure of a remote engine call.
///
/// Internal to the resilience boundary: callers of the crate never see it.
#[derive(Debug, thiserror::Error)]
pub enum EngineCallError {
    #[error("engine call timed out")]
    Timeout,

    #[error("engine network error: {0}")]
    Network(String),

    #[error("engine returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("engine call failed: {0}")]
    Unknown(String),
}

impl EngineCallError {
    pub fn reason(&self) -> crate::FallbackReason {
        match self {
            EngineCallError::Timeout => crate::FallbackReason::Timeout,
            EngineCallError::Network(_) => crate::FallbackReason::NetworkError,
            EngineCallError::InvalidResponse(_) => crate::FallbackReason::InvalidResponse,
            EngineCallError::Unknown(_) => crate::FallbackReason::Unknown,
        }
    }
}

impl From<reqwest::Error> for EngineCallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EngineCallError::Timeout
        } else if err.is_connect() || err.is_request() {
            EngineCallError::Network(err.to_string())
        } else if err.is_decode() {
            EngineCallError::InvalidResponse(err.to_string())
        } else {
            EngineCallError::Unknown(err.to_string())
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineCallError>;

/// Classify a transport failure and log it once, with duration and reason.
fn classified(err: reqwest::Error, path: &str, started: Instant) -> EngineCallError {
    let classified = EngineCallError::from(err);
    tracing::error!(
        path,
        reason = classified.reason().as_str(),
        duration_ms = started.elapsed().as_millis() as u64,
        error = %classified,
        "Engine call failed"
    );
    classified
}

/// Same for a malformed body: a remote failure, never a caller crash.
fn classified_decode(err: reqwest::Error, path: &str, started: Instant) -> EngineCallError {
    let classified = EngineCallError::InvalidResponse(err.to_string());
    tracing::error!(
        path,
        reason = classified.reason().as_str(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Engine returned a malformed response"
    );
    classified
}

// ============================================================================
// Wire types
// ============================================================================
// The engine's arrays may be `null` on the wire to mean "empty"; that is
// normalized here, once, at the deserialization boundary.

fn nullable_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequestWire<'a> {
    supplement_ids: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dosages: Option<HashMap<&'a str, f64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimingRequestWire<'a> {
    user_id: &'a str,
    supplement_id: &'a str,
    logged_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInteraction {
    rule_id: String,
    source_supplement_id: String,
    target_supplement_id: String,
    #[serde(rename = "type")]
    kind: InteractionKind,
    severity: Severity,
    mechanism: String,
    research_url: Option<String>,
    suggestion: Option<String>,
}

impl From<WireInteraction> for InteractionWarning {
    fn from(wire: WireInteraction) -> Self {
        Self {
            rule_id: wire.rule_id,
            source_supplement_id: wire.source_supplement_id,
            target_supplement_id: wire.target_supplement_id,
            kind: wire.kind,
            severity: wire.severity,
            mechanism: wire.mechanism,
            research_url: wire.research_url,
            suggestion: wire.suggestion,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRatioWarning {
    rule_id: String,
    source_supplement_id: String,
    target_supplement_id: String,
    actual_ratio: f64,
    optimal_ratio: Option<f64>,
    severity: Severity,
    message: String,
}

impl From<WireRatioWarning> for RatioWarning {
    fn from(wire: WireRatioWarning) -> Self {
        Self {
            rule_id: wire.rule_id,
            source_supplement_id: wire.source_supplement_id,
            target_supplement_id: wire.target_supplement_id,
            actual_ratio: wire.actual_ratio,
            optimal_ratio: wire.optimal_ratio,
            severity: wire.severity,
            message: wire.message,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRatioGap {
    rule_id: String,
    present_supplement_id: String,
    missing_supplement_id: String,
    severity: Severity,
    message: String,
}

impl From<WireRatioGap> for RatioGap {
    fn from(wire: WireRatioGap) -> Self {
        Self {
            rule_id: wire.rule_id,
            present_supplement_id: wire.present_supplement_id,
            missing_supplement_id: wire.missing_supplement_id,
            severity: wire.severity,
            message: wire.message,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTimingWarning {
    rule_id: String,
    source_supplement_id: String,
    target_supplement_id: String,
    // The engine may drop the conflicting log's identity; an accepted
    // approximation of the local result.
    conflicting_log_id: Option<Uuid>,
    conflicting_logged_at: Option<DateTime<Utc>>,
    actual_hours_apart: f64,
    min_hours_apart: f64,
    severity: Severity,
    reason: String,
}

impl From<WireTimingWarning> for TimingWarning {
    fn from(wire: WireTimingWarning) -> Self {
        Self {
            rule_id: wire.rule_id,
            source_supplement_id: wire.source_supplement_id,
            target_supplement_id: wire.target_supplement_id,
            conflicting_log_id: wire.conflicting_log_id,
            conflicting_logged_at: wire.conflicting_logged_at,
            actual_hours_apart: wire.actual_hours_apart,
            min_hours_apart: wire.min_hours_apart,
            severity: wire.severity,
            reason: wire.reason,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponseWire {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    warnings: Vec<WireInteraction>,
    #[serde(default, deserialize_with = "nullable_vec")]
    synergies: Vec<WireInteraction>,
    #[serde(default, deserialize_with = "nullable_vec")]
    ratio_warnings: Vec<WireRatioWarning>,
    #[serde(default, deserialize_with = "nullable_vec")]
    ratio_evaluation_gaps: Vec<WireRatioGap>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimingResponseWire {
    #[serde(default, deserialize_with = "nullable_vec")]
    warnings: Vec<WireTimingWarning>,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the remote engine
#[derive(Clone)]
pub struct EngineClient {
    client: Client,
    base_url: String,
    service_key: Option<String>,
}

impl EngineClient {
    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when no endpoint is configured; the caller then
    /// skips straight to the local path.
    pub fn from_config(config: &EngineConfig) -> Result<Option<Self>> {
        let endpoint = match &config.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => return Ok(None),
        };
        Ok(Some(Self::new(
            endpoint,
            config.service_key.clone(),
            Duration::from_secs(config.timeout_seconds),
        )?))
    }

    /// Create a client with an explicit URL and timeout
    pub fn new(
        base_url: impl Into<String>,
        service_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, path: &str, identity: &CallerIdentity) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(self.url(path))
            .header(CALLER_ID_HEADER, &identity.user_id);
        if let Some(key) = &self.service_key {
            builder = builder.header(SERVICE_KEY_HEADER, key);
        }
        builder
    }

    /// Evaluate a stack remotely.
    ///
    /// `Ok(None)` means the engine answered with a non-2xx status; that is
    /// "no result", not an error, and the caller proceeds to fallback.
    pub async fn analyze(
        &self,
        identity: &CallerIdentity,
        stack: &[StackEntry],
    ) -> EngineResult<Option<AnalysisOutcome>> {
        let dosages: HashMap<&str, f64> = stack
            .iter()
            .filter_map(|e| e.dosage.map(|d| (e.supplement_id.as_str(), d)))
            .collect();
        let payload = AnalyzeRequestWire {
            supplement_ids: stack.iter().map(|e| e.supplement_id.as_str()).collect(),
            dosages: if dosages.is_empty() { None } else { Some(dosages) },
        };

        let started = Instant::now();
        let response = self
            .request("/api/analyze", identity)
            .json(&payload)
            .send()
            .await
            .map_err(|e| classified(e, "/api/analyze", started))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                status = status.as_u16(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Engine /api/analyze returned non-success status"
            );
            return Ok(None);
        }

        let wire: AnalyzeResponseWire = response
            .json()
            .await
            .map_err(|e| classified_decode(e, "/api/analyze", started))?;

        tracing::debug!(
            status = wire.status.as_deref().unwrap_or("ok"),
            duration_ms = started.elapsed().as_millis() as u64,
            "Engine /api/analyze succeeded"
        );

        Ok(Some(AnalysisOutcome {
            interactions: wire.warnings.into_iter().map(Into::into).collect(),
            synergies: wire.synergies.into_iter().map(Into::into).collect(),
            ratio_warnings: wire.ratio_warnings.into_iter().map(Into::into).collect(),
            ratio_gaps: wire
                .ratio_evaluation_gaps
                .into_iter()
                .map(Into::into)
                .collect(),
            served_by: EvaluationSource::Remote,
        }))
    }

    /// Check timing conflicts remotely. Same non-2xx contract as `analyze`.
    pub async fn timing(
        &self,
        identity: &CallerIdentity,
        user_id: &str,
        supplement_id: &str,
        logged_at: DateTime<Utc>,
    ) -> EngineResult<Option<Vec<TimingWarning>>> {
        let payload = TimingRequestWire {
            user_id,
            supplement_id,
            logged_at,
        };

        let started = Instant::now();
        let response = self
            .request("/api/timing", identity)
            .json(&payload)
            .send()
            .await
            .map_err(|e| classified(e, "/api/timing", started))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                status = status.as_u16(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Engine /api/timing returned non-success status"
            );
            return Ok(None);
        }

        let wire: TimingResponseWire = response
            .json()
            .await
            .map_err(|e| classified_decode(e, "/api/timing", started))?;

        tracing::debug!(
            duration_ms = started.elapsed().as_millis() as u64,
            "Engine /api/timing succeeded"
        );

        Ok(Some(wire.warnings.into_iter().map(Into::into).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_arrays_normalize_to_empty() {
        let json = r#"{
            "status": "ok",
            "warnings": null,
            "synergies": null,
            "ratioWarnings": null,
            "ratioEvaluationGaps": null
        }"#;

        let wire: AnalyzeResponseWire = serde_json::from_str(json).unwrap();
        assert!(wire.warnings.is_empty());
        assert!(wire.synergies.is_empty());
        assert!(wire.ratio_warnings.is_empty());
        assert!(wire.ratio_evaluation_gaps.is_empty());
    }

    #[test]
    fn test_missing_arrays_normalize_to_empty() {
        let wire: AnalyzeResponseWire = serde_json::from_str(r#"{"status": "ok"}"#).unwrap();
        assert!(wire.warnings.is_empty());
        assert!(wire.ratio_evaluation_gaps.is_empty());
    }

    #[test]
    fn test_analyze_response_maps_to_domain() {
        let json = r#"{
            "status": "ok",
            "warnings": [{
                "ruleId": "ix_zinc_copper",
                "sourceSupplementId": "zinc",
                "targetSupplementId": "copper",
                "type": "competition",
                "severity": "medium",
                "mechanism": "absorption competition",
                "researchUrl": null,
                "suggestion": "space doses"
            }],
            "synergies": [],
            "ratioWarnings": [{
                "ruleId": "rr_zinc_copper",
                "sourceSupplementId": "zinc",
                "targetSupplementId": "copper",
                "actualRatio": 20.8,
                "optimalRatio": 10.0,
                "severity": "critical",
                "message": "too much zinc"
            }],
            "ratioEvaluationGaps": null
        }"#;

        let wire: AnalyzeResponseWire = serde_json::from_str(json).unwrap();
        let warning: InteractionWarning = wire.warnings.into_iter().next().unwrap().into();
        assert_eq!(warning.kind, InteractionKind::Competition);
        assert_eq!(warning.suggestion.as_deref(), Some("space doses"));

        let ratio: RatioWarning = wire.ratio_warnings.into_iter().next().unwrap().into();
        assert_eq!(ratio.actual_ratio, 20.8);
        assert_eq!(ratio.severity, Severity::Critical);
    }

    #[test]
    fn test_timing_response_tolerates_missing_log_identity() {
        let json = r#"{
            "warnings": [{
                "ruleId": "tr_tyrosine_5htp",
                "sourceSupplementId": "tyrosine",
                "targetSupplementId": "five_htp",
                "actualHoursApart": 1.0,
                "minHoursApart": 4.0,
                "severity": "medium",
                "reason": "transporter competition"
            }]
        }"#;

        let wire: TimingResponseWire = serde_json::from_str(json).unwrap();
        let warning: TimingWarning = wire.warnings.into_iter().next().unwrap().into();
        assert!(warning.conflicting_log_id.is_none());
        assert!(warning.conflicting_logged_at.is_none());
        assert_eq!(warning.actual_hours_apart, 1.0);
    }
}
