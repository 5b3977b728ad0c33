//! Ratio evaluator: dosage-ratio checks with a tolerance band.
//!
//! Ratios compare raw dosage magnitudes in the rule's declared units; no
//! unit normalization is performed.

use crate::{RatioGap, RatioWarning, Result, RuleStore, StackEntry};
use std::collections::HashMap;

/// Tolerance applied to declared ratio bounds before comparison, so
/// boundary-adjacent, practically-acceptable ratios are not flagged.
pub const RATIO_TOLERANCE: f64 = 0.15;

/// Outcome of a ratio evaluation: out-of-band warnings plus gaps for rules
/// whose counterpart supplement was never logged.
#[derive(Clone, Debug, Default)]
pub struct RatioEvaluation {
    pub warnings: Vec<RatioWarning>,
    pub gaps: Vec<RatioGap>,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Evaluate every ratio rule touching the stack.
///
/// Stacks of fewer than two entries are a no-op: no rules are queried.
/// A rule with both endpoints dosed is compared against its
/// tolerance-expanded bounds; a rule with exactly one endpoint present in
/// the stack yields a `RatioGap`. An endpoint that is present but has no
/// known dosage is skipped.
pub async fn evaluate_ratios(
    rules: &dyn RuleStore,
    stack: &[StackEntry],
) -> Result<RatioEvaluation> {
    if stack.len() < 2 {
        return Ok(RatioEvaluation::default());
    }

    let present: Vec<String> = stack.iter().map(|e| e.supplement_id.clone()).collect();
    let dosages: HashMap<&str, f64> = stack
        .iter()
        .filter_map(|e| e.dosage.map(|d| (e.supplement_id.as_str(), d)))
        .collect();

    let mut evaluation = RatioEvaluation::default();

    for rule in rules.ratio_rules(&present).await? {
        let source_present = present.iter().any(|id| *id == rule.source_supplement_id);
        let target_present = present.iter().any(|id| *id == rule.target_supplement_id);

        match (source_present, target_present) {
            (true, true) => {
                let (source_dose, target_dose) = match (
                    dosages.get(rule.source_supplement_id.as_str()),
                    dosages.get(rule.target_supplement_id.as_str()),
                ) {
                    (Some(s), Some(t)) => (*s, *t),
                    _ => {
                        tracing::debug!(
                            "Ratio rule {} skipped: endpoint present without dosage",
                            rule.id
                        );
                        continue;
                    }
                };

                if target_dose <= 0.0 {
                    tracing::debug!(
                        "Ratio rule {} skipped: non-positive target dosage",
                        rule.id
                    );
                    continue;
                }

                let ratio = source_dose / target_dose;
                let below = rule
                    .min_ratio
                    .map(|min| ratio < min * (1.0 - RATIO_TOLERANCE))
                    .unwrap_or(false);
                let above = rule
                    .max_ratio
                    .map(|max| ratio > max * (1.0 + RATIO_TOLERANCE))
                    .unwrap_or(false);

                if below || above {
                    evaluation.warnings.push(RatioWarning {
                        rule_id: rule.id.clone(),
                        source_supplement_id: rule.source_supplement_id.clone(),
                        target_supplement_id: rule.target_supplement_id.clone(),
                        actual_ratio: round1(ratio),
                        optimal_ratio: rule.optimal_ratio,
                        severity: rule.severity.clone(),
                        message: rule.warning_message.clone(),
                    });
                }
            }
            // Exactly one endpoint in the stack: the counterpart was never
            // logged, so the ratio is undefined against a finite bound.
            (true, false) | (false, true) => {
                let (present_id, missing_id) = if source_present {
                    (&rule.source_supplement_id, &rule.target_supplement_id)
                } else {
                    (&rule.target_supplement_id, &rule.source_supplement_id)
                };

                evaluation.gaps.push(RatioGap {
                    rule_id: rule.id.clone(),
                    present_supplement_id: present_id.clone(),
                    missing_supplement_id: missing_id.clone(),
                    severity: rule.severity.clone(),
                    message: rule.warning_message.clone(),
                });
            }
            (false, false) => {}
        }
    }

    if !evaluation.warnings.is_empty() || !evaluation.gaps.is_empty() {
        tracing::info!(
            "Ratio evaluation: {} warnings, {} gaps",
            evaluation.warnings.len(),
            evaluation.gaps.len()
        );
    }

    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRules;
    use crate::{DoseUnit, InteractionRule, RatioRule, RuleStore, Severity, TimingRule};
    use async_trait::async_trait;

    fn zinc_copper_rule() -> RatioRule {
        RatioRule {
            id: "rr_zinc_copper".into(),
            source_supplement_id: "zinc".into(),
            target_supplement_id: "copper".into(),
            min_ratio: Some(8.0),
            max_ratio: Some(15.0),
            optimal_ratio: Some(10.0),
            severity: Severity::Critical,
            warning_message: "Keep zinc:copper between 8:1 and 15:1".into(),
            research_url: None,
        }
    }

    fn rules_with(rule: RatioRule) -> MemoryRules {
        MemoryRules {
            ratio: vec![rule],
            ..Default::default()
        }
    }

    /// RuleStore that fails the test if any lookup happens.
    struct NoQueryRules;

    #[async_trait]
    impl RuleStore for NoQueryRules {
        async fn interaction_rules(&self, _: &[String]) -> Result<Vec<InteractionRule>> {
            panic!("rules must not be queried for stacks smaller than two");
        }
        async fn ratio_rules(&self, _: &[String]) -> Result<Vec<RatioRule>> {
            panic!("rules must not be queried for stacks smaller than two");
        }
        async fn timing_rules(&self, _: &str) -> Result<Vec<TimingRule>> {
            panic!("rules must not be queried for stacks smaller than two");
        }
    }

    #[tokio::test]
    async fn test_single_entry_is_noop_without_rule_query() {
        let stack = vec![StackEntry::dosed("zinc", 30.0, DoseUnit::Mg)];
        let result = evaluate_ratios(&NoQueryRules, &stack).await.unwrap();
        assert!(result.warnings.is_empty());
        assert!(result.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_boundary_ratios_absorbed_by_tolerance() {
        let rules = rules_with(zinc_copper_rule());

        // Exactly min (8:1)
        let stack = vec![
            StackEntry::dosed("zinc", 16.0, DoseUnit::Mg),
            StackEntry::dosed("copper", 2.0, DoseUnit::Mg),
        ];
        let result = evaluate_ratios(&rules, &stack).await.unwrap();
        assert!(result.warnings.is_empty());

        // Exactly max (15:1)
        let stack = vec![
            StackEntry::dosed("zinc", 30.0, DoseUnit::Mg),
            StackEntry::dosed("copper", 2.0, DoseUnit::Mg),
        ];
        let result = evaluate_ratios(&rules, &stack).await.unwrap();
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_ratio_below_tolerance_warns() {
        let rules = rules_with(zinc_copper_rule());

        // 8 * 0.8 = 6.4, below the tolerance-expanded floor of 6.8
        let stack = vec![
            StackEntry::dosed("zinc", 6.4, DoseUnit::Mg),
            StackEntry::dosed("copper", 1.0, DoseUnit::Mg),
        ];
        let result = evaluate_ratios(&rules, &stack).await.unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].actual_ratio, 6.4);
        assert_eq!(result.warnings[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_ratio_above_tolerance_warns_with_rounding() {
        let rules = rules_with(zinc_copper_rule());

        // 50 / 2.4 = 20.833..., above 15 * 1.15 = 17.25
        let stack = vec![
            StackEntry::dosed("zinc", 50.0, DoseUnit::Mg),
            StackEntry::dosed("copper", 2.4, DoseUnit::Mg),
        ];
        let result = evaluate_ratios(&rules, &stack).await.unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].actual_ratio, 20.8);
    }

    #[tokio::test]
    async fn test_ratio_inside_tolerance_band_does_not_warn() {
        let rules = rules_with(zinc_copper_rule());

        // 7:1 is below min but above the tolerance floor of 6.8
        let stack = vec![
            StackEntry::dosed("zinc", 7.0, DoseUnit::Mg),
            StackEntry::dosed("copper", 1.0, DoseUnit::Mg),
        ];
        let result = evaluate_ratios(&rules, &stack).await.unwrap();
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_counterpart_yields_gap() {
        let rules = rules_with(zinc_copper_rule());

        // Zinc logged, copper never logged that day
        let stack = vec![
            StackEntry::dosed("zinc", 30.0, DoseUnit::Mg),
            StackEntry::dosed("vitamin_c", 500.0, DoseUnit::Mg),
        ];
        let result = evaluate_ratios(&rules, &stack).await.unwrap();

        assert!(result.warnings.is_empty());
        assert_eq!(result.gaps.len(), 1);
        assert_eq!(result.gaps[0].present_supplement_id, "zinc");
        assert_eq!(result.gaps[0].missing_supplement_id, "copper");
        assert_eq!(result.gaps[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_undosed_counterpart_is_skipped() {
        let rules = rules_with(zinc_copper_rule());

        let stack = vec![
            StackEntry::dosed("zinc", 30.0, DoseUnit::Mg),
            StackEntry::bare("copper"),
        ];
        let result = evaluate_ratios(&rules, &stack).await.unwrap();
        assert!(result.warnings.is_empty());
        assert!(result.gaps.is_empty());
    }
}
