//! Default catalog of supplements, pharmacokinetic parameters and rules.
//!
//! This module provides the built-in reference data for the system:
//! supplement definitions, the static PK lookup table, and the default
//! interaction/ratio/timing rule set with co-factor pairings.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog_internal);

/// Get a reference to the cached default catalog
///
/// This function returns a reference to the pre-built catalog, avoiding
/// the overhead of rebuilding it on every operation.
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog with built-in supplements and rules
///
/// **Note**: For production use, prefer `get_default_catalog()` which returns
/// a cached reference. This function is retained for testing and custom
/// catalog creation.
pub fn build_default_catalog() -> Catalog {
    build_default_catalog_internal()
}

fn supplement(
    id: &str,
    name: &str,
    form: SupplementForm,
    category: SupplementCategory,
) -> (String, Supplement) {
    (
        id.to_string(),
        Supplement {
            id: id.to_string(),
            name: name.to_string(),
            form,
            category,
        },
    )
}

fn pk(id: &str, peak_minutes: f64, half_life_minutes: f64, bioavailability_percent: f64) -> (String, PkParams) {
    (
        id.to_string(),
        PkParams {
            peak_minutes,
            half_life_minutes,
            bioavailability_percent,
        },
    )
}

/// Internal function that actually builds the catalog
fn build_default_catalog_internal() -> Catalog {
    use SupplementCategory::*;
    use SupplementForm::*;

    // ========================================================================
    // Supplements
    // ========================================================================

    let supplements: HashMap<String, Supplement> = [
        supplement("zinc", "Zinc Picolinate", Capsule, Mineral),
        supplement("copper", "Copper Glycinate", Capsule, Mineral),
        supplement("magnesium", "Magnesium Glycinate", Capsule, Mineral),
        supplement("calcium", "Calcium Citrate", Tablet, Mineral),
        supplement("iron", "Iron Bisglycinate", Capsule, Mineral),
        supplement("vitamin_c", "Vitamin C", Tablet, Vitamin),
        supplement("vitamin_d3", "Vitamin D3", Capsule, Vitamin),
        supplement("vitamin_k2", "Vitamin K2 (MK-7)", Capsule, Vitamin),
        supplement("caffeine", "Caffeine", Tablet, Stimulant),
        supplement("l_theanine", "L-Theanine", Capsule, AminoAcid),
        supplement("tyrosine", "L-Tyrosine", Powder, AminoAcid),
        supplement("five_htp", "5-HTP", Capsule, AminoAcid),
        supplement("omega_3", "Omega-3 Fish Oil", Capsule, FattyAcid),
    ]
    .into_iter()
    .collect();

    // ========================================================================
    // Pharmacokinetic Parameters
    // ========================================================================
    // Static lookup data: minutes to peak, elimination half-life in minutes,
    // and oral bioavailability as a percentage. Typical published figures.

    let pk_params: HashMap<String, PkParams> = [
        pk("zinc", 120.0, 720.0, 30.0),
        pk("copper", 120.0, 1440.0, 55.0),
        pk("magnesium", 240.0, 1440.0, 40.0),
        pk("calcium", 90.0, 480.0, 35.0),
        pk("iron", 120.0, 360.0, 25.0),
        pk("vitamin_c", 120.0, 120.0, 80.0),
        pk("vitamin_d3", 720.0, 20160.0, 80.0),
        pk("vitamin_k2", 240.0, 4320.0, 90.0),
        pk("caffeine", 45.0, 300.0, 100.0),
        pk("l_theanine", 50.0, 75.0, 95.0),
        pk("tyrosine", 90.0, 150.0, 90.0),
        pk("five_htp", 100.0, 250.0, 70.0),
        pk("omega_3", 300.0, 2880.0, 85.0),
    ]
    .into_iter()
    .collect();

    // ========================================================================
    // Interaction Rules
    // ========================================================================

    let interaction_rules = vec![
        InteractionRule {
            id: "ix_zinc_copper".into(),
            source_supplement_id: "zinc".into(),
            target_supplement_id: "copper".into(),
            kind: InteractionKind::Competition,
            severity: Severity::Medium,
            mechanism: "Zinc and copper compete for metallothionein-mediated absorption in the intestinal mucosa".into(),
            research_url: Some("https://pubmed.ncbi.nlm.nih.gov/3890239/".into()),
            suggestion: Some("Separate doses, or keep the zinc:copper ratio balanced".into()),
        },
        InteractionRule {
            id: "ix_calcium_iron".into(),
            source_supplement_id: "calcium".into(),
            target_supplement_id: "iron".into(),
            kind: InteractionKind::Competition,
            severity: Severity::Medium,
            mechanism: "Calcium inhibits both heme and non-heme iron uptake at shared transport pathways".into(),
            research_url: Some("https://pubmed.ncbi.nlm.nih.gov/1984343/".into()),
            suggestion: Some("Take iron at least two hours away from calcium".into()),
        },
        InteractionRule {
            id: "ix_zinc_iron".into(),
            source_supplement_id: "zinc".into(),
            target_supplement_id: "iron".into(),
            kind: InteractionKind::Competition,
            severity: Severity::Low,
            mechanism: "Zinc and non-heme iron compete for the DMT1 transporter when taken on an empty stomach".into(),
            research_url: None,
            suggestion: Some("Space zinc and iron doses, or take them with food".into()),
        },
        InteractionRule {
            id: "ix_tyrosine_5htp".into(),
            source_supplement_id: "tyrosine".into(),
            target_supplement_id: "five_htp".into(),
            kind: InteractionKind::Competition,
            severity: Severity::Medium,
            mechanism: "Tyrosine and 5-HTP compete for the large neutral amino acid transporter at the blood-brain barrier".into(),
            research_url: None,
            suggestion: Some("Take tyrosine in the morning and 5-HTP in the evening".into()),
        },
        InteractionRule {
            id: "ix_caffeine_theanine".into(),
            source_supplement_id: "caffeine".into(),
            target_supplement_id: "l_theanine".into(),
            kind: InteractionKind::Synergy,
            severity: Severity::Low,
            mechanism: "L-theanine increases alpha-wave activity and smooths caffeine's stimulant edge without blunting alertness".into(),
            research_url: Some("https://pubmed.ncbi.nlm.nih.gov/18681988/".into()),
            suggestion: Some("Take together, commonly at a 2:1 theanine:caffeine ratio".into()),
        },
        InteractionRule {
            id: "ix_d3_k2".into(),
            source_supplement_id: "vitamin_d3".into(),
            target_supplement_id: "vitamin_k2".into(),
            kind: InteractionKind::Synergy,
            severity: Severity::Medium,
            mechanism: "Vitamin K2 activates matrix Gla protein, directing the calcium mobilized by vitamin D3 toward bone rather than soft tissue".into(),
            research_url: Some("https://pubmed.ncbi.nlm.nih.gov/28403946/".into()),
            suggestion: Some("Pair D3 with K2 in the same (fat-containing) meal".into()),
        },
        InteractionRule {
            id: "ix_magnesium_d3".into(),
            source_supplement_id: "magnesium".into(),
            target_supplement_id: "vitamin_d3".into(),
            kind: InteractionKind::Synergy,
            severity: Severity::Low,
            mechanism: "Magnesium is a cofactor for the hydroxylases that convert vitamin D to its active form".into(),
            research_url: None,
            suggestion: None,
        },
        InteractionRule {
            id: "ix_iron_vitc".into(),
            source_supplement_id: "iron".into(),
            target_supplement_id: "vitamin_c".into(),
            kind: InteractionKind::Synergy,
            severity: Severity::Low,
            mechanism: "Ascorbic acid reduces ferric iron to the better-absorbed ferrous form".into(),
            research_url: Some("https://pubmed.ncbi.nlm.nih.gov/2507689/".into()),
            suggestion: Some("Take iron together with vitamin C".into()),
        },
    ];

    // ========================================================================
    // Ratio Rules
    // ========================================================================

    let ratio_rules = vec![
        RatioRule {
            id: "rr_zinc_copper".into(),
            source_supplement_id: "zinc".into(),
            target_supplement_id: "copper".into(),
            min_ratio: Some(8.0),
            max_ratio: Some(15.0),
            optimal_ratio: Some(10.0),
            severity: Severity::Critical,
            warning_message: "Long-term zinc without balancing copper risks copper deficiency; keep the zinc:copper ratio between 8:1 and 15:1".into(),
            research_url: Some("https://pubmed.ncbi.nlm.nih.gov/3890239/".into()),
        },
        RatioRule {
            id: "rr_calcium_magnesium".into(),
            source_supplement_id: "calcium".into(),
            target_supplement_id: "magnesium".into(),
            min_ratio: Some(1.0),
            max_ratio: Some(2.0),
            optimal_ratio: Some(2.0),
            severity: Severity::Medium,
            warning_message: "Calcium to magnesium intake is best kept between 1:1 and 2:1".into(),
            research_url: None,
        },
    ];

    // ========================================================================
    // Timing Rules
    // ========================================================================

    let timing_rules = vec![
        TimingRule {
            id: "tr_zinc_copper".into(),
            source_supplement_id: "zinc".into(),
            target_supplement_id: "copper".into(),
            min_hours_apart: 2.0,
            severity: Severity::Medium,
            reason: "Zinc and copper compete for absorption when taken together".into(),
        },
        TimingRule {
            id: "tr_calcium_iron".into(),
            source_supplement_id: "calcium".into(),
            target_supplement_id: "iron".into(),
            min_hours_apart: 2.0,
            severity: Severity::Medium,
            reason: "Calcium blocks iron absorption; separate doses by at least two hours".into(),
        },
        TimingRule {
            id: "tr_zinc_iron".into(),
            source_supplement_id: "zinc".into(),
            target_supplement_id: "iron".into(),
            min_hours_apart: 2.0,
            severity: Severity::Low,
            reason: "Zinc and iron share the DMT1 transporter; spacing improves uptake of both".into(),
        },
        TimingRule {
            id: "tr_tyrosine_5htp".into(),
            source_supplement_id: "tyrosine".into(),
            target_supplement_id: "five_htp".into(),
            min_hours_apart: 4.0,
            severity: Severity::Medium,
            reason: "Tyrosine and 5-HTP compete for transport across the blood-brain barrier".into(),
        },
    ];

    // ========================================================================
    // Co-factor Pairings
    // ========================================================================

    let cofactors = vec![
        CofactorPairing {
            supplement_id: "vitamin_d3".into(),
            cofactor_id: "vitamin_k2".into(),
            category: "vitamin_transport".into(),
            description: "Vitamin D3 increases calcium absorption; K2 routes that calcium to bone".into(),
            safety_warning: None,
        },
        CofactorPairing {
            supplement_id: "vitamin_d3".into(),
            cofactor_id: "magnesium".into(),
            category: "activation".into(),
            description: "Magnesium is required to convert vitamin D to its active form".into(),
            safety_warning: None,
        },
        CofactorPairing {
            supplement_id: "zinc".into(),
            cofactor_id: "copper".into(),
            category: "mineral_balance".into(),
            description: "Sustained zinc supplementation depletes copper stores".into(),
            safety_warning: Some("Keep supplemental copper under ~3 mg/day".into()),
        },
        CofactorPairing {
            supplement_id: "iron".into(),
            cofactor_id: "vitamin_c".into(),
            category: "absorption".into(),
            description: "Vitamin C taken with iron markedly improves non-heme absorption".into(),
            safety_warning: Some("Keep iron away from calcium, coffee and tea".into()),
        },
        CofactorPairing {
            supplement_id: "caffeine".into(),
            cofactor_id: "l_theanine".into(),
            category: "stimulant_smoothing".into(),
            description: "L-theanine takes the edge off caffeine while preserving focus".into(),
            safety_warning: None,
        },
    ];

    Catalog {
        supplements,
        pk_params,
        interaction_rules,
        ratio_rules,
        timing_rules,
        cofactors,
    }
}

impl Catalog {
    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, supp) in &self.supplements {
            if id.is_empty() || supp.id.is_empty() {
                errors.push("Supplement has empty ID".to_string());
            }
            if id != &supp.id {
                errors.push(format!(
                    "Supplement key '{}' doesn't match supplement.id '{}'",
                    id, supp.id
                ));
            }
            if supp.name.is_empty() {
                errors.push(format!("Supplement '{}' has empty name", id));
            }
            if !self.pk_params.contains_key(id) {
                errors.push(format!("Supplement '{}' has no PK parameters", id));
            }
        }

        for (id, params) in &self.pk_params {
            if params.peak_minutes <= 0.0 || params.half_life_minutes <= 0.0 {
                errors.push(format!(
                    "PK parameters for '{}' must have positive peak and half-life",
                    id
                ));
            }
            if params.bioavailability_percent <= 0.0 || params.bioavailability_percent > 100.0 {
                errors.push(format!(
                    "PK parameters for '{}' have bioavailability outside (0, 100]",
                    id
                ));
            }
        }

        let mut check_endpoints = |rule_id: &str, source: &str, target: &str| {
            for endpoint in [source, target] {
                if !self.supplements.contains_key(endpoint) {
                    errors.push(format!(
                        "Rule '{}' references non-existent supplement '{}'",
                        rule_id, endpoint
                    ));
                }
            }
            if source == target {
                errors.push(format!("Rule '{}' references the same supplement twice", rule_id));
            }
        };

        for rule in &self.interaction_rules {
            check_endpoints(&rule.id, &rule.source_supplement_id, &rule.target_supplement_id);
        }
        for rule in &self.ratio_rules {
            check_endpoints(&rule.id, &rule.source_supplement_id, &rule.target_supplement_id);
        }
        for rule in &self.timing_rules {
            check_endpoints(&rule.id, &rule.source_supplement_id, &rule.target_supplement_id);
        }

        for rule in &self.ratio_rules {
            if rule.min_ratio.is_none() && rule.max_ratio.is_none() {
                errors.push(format!("Ratio rule '{}' declares no bounds", rule.id));
            }
            if let (Some(min), Some(max)) = (rule.min_ratio, rule.max_ratio) {
                if min > max {
                    errors.push(format!("Ratio rule '{}': min {} > max {}", rule.id, min, max));
                }
            }
            for bound in [rule.min_ratio, rule.max_ratio, rule.optimal_ratio].into_iter().flatten() {
                if bound <= 0.0 {
                    errors.push(format!("Ratio rule '{}' has non-positive bound {}", rule.id, bound));
                }
            }
        }

        for rule in &self.timing_rules {
            if rule.min_hours_apart <= 0.0 {
                errors.push(format!(
                    "Timing rule '{}' has non-positive separation {}",
                    rule.id, rule.min_hours_apart
                ));
            }
        }

        for pairing in &self.cofactors {
            for endpoint in [&pairing.supplement_id, &pairing.cofactor_id] {
                if !self.supplements.contains_key(endpoint) {
                    errors.push(format!(
                        "Co-factor pairing references non-existent supplement '{}'",
                        endpoint
                    ));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_loads() {
        let catalog = build_default_catalog();
        assert_eq!(catalog.supplements.len(), 13);
        assert!(!catalog.interaction_rules.is_empty());
        assert!(!catalog.ratio_rules.is_empty());
        assert!(!catalog.timing_rules.is_empty());
    }

    #[test]
    fn test_every_supplement_has_pk_params() {
        let catalog = build_default_catalog();
        for id in catalog.supplements.keys() {
            assert!(
                catalog.pk_params.contains_key(id),
                "Supplement {} has no PK parameters",
                id
            );
        }
    }

    #[test]
    fn test_all_rule_endpoints_exist() {
        let catalog = build_default_catalog();
        for rule in &catalog.interaction_rules {
            assert!(catalog.supplements.contains_key(&rule.source_supplement_id));
            assert!(catalog.supplements.contains_key(&rule.target_supplement_id));
        }
        for rule in &catalog.timing_rules {
            assert!(catalog.supplements.contains_key(&rule.source_supplement_id));
            assert!(catalog.supplements.contains_key(&rule.target_supplement_id));
        }
    }

    #[test]
    fn test_default_catalog_validates() {
        let catalog = build_default_catalog();
        let errors = catalog.validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_cached_catalog_matches_built() {
        let cached = get_default_catalog();
        let built = build_default_catalog();
        assert_eq!(cached.supplements.len(), built.supplements.len());
        assert_eq!(cached.ratio_rules.len(), built.ratio_rules.len());
    }
}
