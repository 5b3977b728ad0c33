//! Timing window evaluator: minimum-separation conflicts between intakes.

use crate::{LogStore, Result, RuleStore, TimingWarning};
use chrono::{DateTime, Duration, Utc};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Find intakes of counterpart supplements that violate a timing rule
/// around a newly logged intake.
///
/// All rules referencing the supplement are fetched first; the union
/// window `logged_at ± max(min_hours_apart)` enables a single batched log
/// query instead of one query per rule. Each conflicting entry yields its
/// own warning. Warning attribution follows the rule's sides, not the
/// order the supplements were logged in.
pub async fn evaluate_timing(
    rules: &dyn RuleStore,
    logs: &dyn LogStore,
    user_id: &str,
    supplement_id: &str,
    logged_at: DateTime<Utc>,
) -> Result<Vec<TimingWarning>> {
    let matched_rules = rules.timing_rules(supplement_id).await?;
    if matched_rules.is_empty() {
        return Ok(Vec::new());
    }

    let max_hours = matched_rules
        .iter()
        .map(|r| r.min_hours_apart)
        .fold(0.0_f64, f64::max);
    let window = Duration::seconds((max_hours * 3600.0).ceil() as i64);
    let window_start = logged_at - window;
    let window_end = logged_at + window;

    let mut counterparts: Vec<String> = matched_rules
        .iter()
        .filter_map(|r| r.counterpart(supplement_id))
        .map(|s| s.to_string())
        .collect();
    counterparts.sort();
    counterparts.dedup();

    let candidates = logs
        .logs_in_range(user_id, Some(&counterparts), window_start, window_end)
        .await?;

    let mut warnings = Vec::new();

    for rule in &matched_rules {
        let counterpart = match rule.counterpart(supplement_id) {
            Some(c) => c,
            None => continue,
        };

        for entry in candidates.iter().filter(|e| e.supplement_id == counterpart) {
            let hours_diff =
                (logged_at - entry.logged_at).num_milliseconds().abs() as f64 / 3_600_000.0;

            if hours_diff < rule.min_hours_apart {
                warnings.push(TimingWarning {
                    rule_id: rule.id.clone(),
                    source_supplement_id: rule.source_supplement_id.clone(),
                    target_supplement_id: rule.target_supplement_id.clone(),
                    conflicting_log_id: Some(entry.id),
                    conflicting_logged_at: Some(entry.logged_at),
                    actual_hours_apart: round2(hours_diff),
                    min_hours_apart: rule.min_hours_apart,
                    severity: rule.severity.clone(),
                    reason: rule.reason.clone(),
                });
            }
        }
    }

    if !warnings.is_empty() {
        tracing::info!(
            "Timing evaluation found {} conflicts for {}",
            warnings.len(),
            supplement_id
        );
    }

    Ok(warnings)
}
