//! Evaluation engine: remote-first strategy with transparent local
//! fallback, plus the warning aggregator and dashboard projection.
//!
//! The remote engine and the local evaluators are behaviorally equivalent
//! for interaction and ratio semantics; only the transport differs.
//! Callers cannot tell which path served a request except through the
//! `served_by` telemetry tag.

use crate::config::SimulationConfig;
use crate::remote::EngineClient;
use crate::{
    interaction, pharma, ratio, timing, AnalysisOutcome, AnalysisRequest, CallerIdentity, Catalog,
    DashboardSnapshot, EvaluationSource, FallbackReason, InteractionKind, InteractionWarning,
    LogEventWarnings, LogStore, Result, RuleStore, StackEntry, TimingOutcome, TimingRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Evaluation port
// ============================================================================

/// The evaluation port consumed by the dashboard, the coach context
/// builder and the log-creation flow. Two strategies exist: the local
/// evaluators and the remote engine; `FallbackBackend` composes them.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Interaction + ratio evaluation over a stack
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome>;

    /// Timing-conflict evaluation for a newly logged intake
    async fn timing_conflicts(&self, request: &TimingRequest) -> Result<TimingOutcome>;
}

// ============================================================================
// Local strategy
// ============================================================================

/// Local evaluation strategy over the rule and log stores.
pub struct LocalBackend {
    rules: Arc<dyn RuleStore>,
    logs: Arc<dyn LogStore>,
}

impl LocalBackend {
    pub fn new(rules: Arc<dyn RuleStore>, logs: Arc<dyn LogStore>) -> Self {
        Self { rules, logs }
    }
}

#[async_trait]
impl AnalysisBackend for LocalBackend {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        let ids: Vec<String> = request
            .stack
            .iter()
            .map(|e| e.supplement_id.clone())
            .collect();

        // Interaction and ratio evaluation consume disjoint rule tables and
        // share only the read-only stack; run them concurrently.
        let (interactions, ratios) = tokio::join!(
            interaction::evaluate_interactions(self.rules.as_ref(), &ids),
            ratio::evaluate_ratios(self.rules.as_ref(), &request.stack),
        );
        let interactions = interactions?;
        let ratios = ratios?;

        let (synergies, interactions): (Vec<InteractionWarning>, Vec<InteractionWarning>) =
            interactions
                .into_iter()
                .partition(|w| w.kind == InteractionKind::Synergy);

        Ok(AnalysisOutcome {
            interactions,
            synergies,
            ratio_warnings: ratios.warnings,
            ratio_gaps: ratios.gaps,
            served_by: EvaluationSource::Local,
        })
    }

    async fn timing_conflicts(&self, request: &TimingRequest) -> Result<TimingOutcome> {
        let warnings = timing::evaluate_timing(
            self.rules.as_ref(),
            self.logs.as_ref(),
            &request.user_id,
            &request.supplement_id,
            request.logged_at,
        )
        .await?;

        Ok(TimingOutcome {
            warnings,
            served_by: EvaluationSource::Local,
        })
    }
}

// ============================================================================
// Fallback decorator
// ============================================================================

/// Remote-first strategy: try the engine, classify any failure, and serve
/// the request from the local evaluators. Remote failures never reach the
/// caller; local failures do, since there is no further fallback.
pub struct FallbackBackend {
    remote: Option<EngineClient>,
    local: LocalBackend,
}

impl FallbackBackend {
    pub fn new(remote: Option<EngineClient>, local: LocalBackend) -> Self {
        Self { remote, local }
    }

    /// Preconditions for even attempting the remote call: an endpoint must
    /// be configured and a caller identity available.
    fn precheck<'a>(
        &'a self,
        identity: &'a Option<CallerIdentity>,
    ) -> std::result::Result<(&'a EngineClient, &'a CallerIdentity), FallbackReason> {
        let client = self.remote.as_ref().ok_or(FallbackReason::NotConfigured)?;
        let identity = identity.as_ref().ok_or(FallbackReason::NoSession)?;
        Ok((client, identity))
    }
}

#[async_trait]
impl AnalysisBackend for FallbackBackend {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        let reason = match self.precheck(&request.identity) {
            Ok((client, identity)) => match client.analyze(identity, &request.stack).await {
                Ok(Some(outcome)) => return Ok(outcome),
                // Non-2xx was already logged with status and duration
                Ok(None) => FallbackReason::HttpStatus,
                // Transport failures were logged at the client with
                // duration and reason; here only the transition remains
                Err(err) => {
                    tracing::debug!(
                        reason = err.reason().as_str(),
                        "Falling back to local analysis"
                    );
                    err.reason()
                }
            },
            Err(reason) => {
                tracing::debug!(
                    reason = reason.as_str(),
                    "Skipping remote engine; evaluating locally"
                );
                reason
            }
        };

        let mut outcome = self.local.analyze(request).await?;
        outcome.served_by = EvaluationSource::Fallback(reason);
        Ok(outcome)
    }

    async fn timing_conflicts(&self, request: &TimingRequest) -> Result<TimingOutcome> {
        let reason = match self.precheck(&request.identity) {
            Ok((client, identity)) => {
                match client
                    .timing(
                        identity,
                        &request.user_id,
                        &request.supplement_id,
                        request.logged_at,
                    )
                    .await
                {
                    Ok(Some(warnings)) => {
                        return Ok(TimingOutcome {
                            warnings,
                            served_by: EvaluationSource::Remote,
                        })
                    }
                    Ok(None) => FallbackReason::HttpStatus,
                    Err(err) => {
                        tracing::debug!(
                            reason = err.reason().as_str(),
                            "Falling back to local timing evaluation"
                        );
                        err.reason()
                    }
                }
            }
            Err(reason) => {
                tracing::debug!(
                    reason = reason.as_str(),
                    "Skipping remote engine; evaluating locally"
                );
                reason
            }
        };

        let mut outcome = self.local.timing_conflicts(request).await?;
        outcome.served_by = EvaluationSource::Fallback(reason);
        Ok(outcome)
    }
}

// ============================================================================
// Warning aggregator
// ============================================================================

/// A triggering log event: the new intake plus the day's stack around it.
#[derive(Clone, Debug)]
pub struct LogEventRequest {
    pub identity: Option<CallerIdentity>,
    pub user_id: String,
    /// The newly logged supplement
    pub supplement_id: String,
    pub logged_at: DateTime<Utc>,
    /// The day's stack, including the new intake
    pub stack: Vec<StackEntry>,
}

/// Compose interaction, ratio and timing results for one log event.
///
/// Interaction results are narrowed to rules touching the newly logged
/// supplement; the other evaluators already return what is relevant to
/// this exact action. Stateless composition, no independent logic.
pub async fn evaluate_log_event(
    backend: &dyn AnalysisBackend,
    request: &LogEventRequest,
) -> Result<LogEventWarnings> {
    let analysis_request = AnalysisRequest {
        identity: request.identity.clone(),
        stack: request.stack.clone(),
    };
    let timing_request = TimingRequest {
        identity: request.identity.clone(),
        user_id: request.user_id.clone(),
        supplement_id: request.supplement_id.clone(),
        logged_at: request.logged_at,
    };

    let (analysis, timing) = tokio::join!(
        backend.analyze(&analysis_request),
        backend.timing_conflicts(&timing_request),
    );
    let analysis = analysis?;
    let timing = timing?;

    let touches_new = |w: &InteractionWarning| {
        w.source_supplement_id == request.supplement_id
            || w.target_supplement_id == request.supplement_id
    };

    Ok(LogEventWarnings {
        interactions: analysis.interactions.into_iter().filter(touches_new).collect(),
        synergies: analysis.synergies.into_iter().filter(touches_new).collect(),
        ratio_warnings: analysis.ratio_warnings,
        ratio_gaps: analysis.ratio_gaps,
        timing_warnings: timing.warnings,
        served_by: analysis.served_by,
    })
}

// ============================================================================
// Dashboard projection
// ============================================================================

/// Build the dashboard payload: active compounds, exclusion zones,
/// optimization opportunities, bio score and the sampled timeline. A pure
/// projection of the log window and rule catalog at `now`.
pub async fn dashboard_snapshot(
    rules: &dyn RuleStore,
    logs: &dyn LogStore,
    catalog: &Catalog,
    simulation: &SimulationConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<DashboardSnapshot> {
    let start = now - Duration::hours(simulation.horizon_hours);
    let entries = logs.logs_in_range(user_id, None, start, now).await?;

    let active = pharma::active_compounds(&entries, &catalog.pk_params, now);

    let mut active_ids: Vec<String> = active.iter().map(|c| c.supplement_id.clone()).collect();
    active_ids.sort();
    active_ids.dedup();

    // The rule store is per-supplement for timing rules; dedup across the
    // active set before deriving zones.
    let mut timing_rules = Vec::new();
    let mut seen = HashSet::new();
    for id in &active_ids {
        for rule in rules.timing_rules(id).await? {
            if seen.insert(rule.id.clone()) {
                timing_rules.push(rule);
            }
        }
    }

    let interaction_rules = if active_ids.is_empty() {
        Vec::new()
    } else {
        rules.interaction_rules(&active_ids).await?
    };

    let recent: HashSet<String> = entries.iter().map(|e| e.supplement_id.clone()).collect();

    let exclusion_zones = pharma::exclusion_zones(&active, &timing_rules, catalog, now);
    let optimizations = pharma::optimizations(
        &active,
        &interaction_rules,
        &catalog.cofactors,
        &recent,
        catalog,
    );
    let timeline = pharma::timeline(
        &entries,
        &catalog.pk_params,
        start,
        now,
        simulation.sample_minutes,
    );
    let bio_score = pharma::bio_score(&active, &exclusion_zones, &optimizations);

    Ok(DashboardSnapshot {
        active_compounds: active,
        exclusion_zones,
        optimizations,
        bio_score,
        timeline,
    })
}
