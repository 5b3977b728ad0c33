//! Interaction evaluator: pairwise chemical interaction detection.

use crate::{InteractionWarning, Result, RuleStore};

/// Evaluate interaction rules against a supplement set.
///
/// Sets of fewer than two supplements are a no-op: no rules are queried.
/// Rules are fetched by either endpoint and then narrowed to those whose
/// BOTH endpoints are in the set; a rule touching only one side of the
/// boundary is irrelevant. Matching is direction-agnostic.
pub async fn evaluate_interactions(
    rules: &dyn RuleStore,
    supplement_ids: &[String],
) -> Result<Vec<InteractionWarning>> {
    if supplement_ids.len() < 2 {
        return Ok(Vec::new());
    }

    let warnings: Vec<InteractionWarning> = rules
        .interaction_rules(supplement_ids)
        .await?
        .iter()
        .filter(|rule| {
            let source_in = supplement_ids.iter().any(|id| *id == rule.source_supplement_id);
            let target_in = supplement_ids.iter().any(|id| *id == rule.target_supplement_id);
            source_in && target_in
        })
        .map(InteractionWarning::from)
        .collect();

    if !warnings.is_empty() {
        tracing::info!("Interaction evaluation matched {} rules", warnings.len());
    }

    Ok(warnings)
}
