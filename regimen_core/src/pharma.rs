//! Pharmacokinetic simulator.
//!
//! Derives per-compound concentration curves from intake logs and static
//! absorption/elimination parameters, classifies compound phases, and
//! projects exclusion zones and optimization opportunities for the
//! dashboard. Everything here is a pure function of `(logs, rules, now)`;
//! curves for concurrently active compounds are independent of each other.

use crate::{
    ActiveCompound, Catalog, CofactorPairing, CompoundPhase, ExclusionZone, InteractionKind,
    InteractionRule, LogEntry, OptimizationKind, OptimizationOpportunity, PkParams, TimelinePoint,
    TimingRule,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::f64::consts::LN_2;

/// Concentration below this percentage counts as cleared
pub const CLEARED_THRESHOLD_PERCENT: f64 = 1.0;

/// Fraction of peak concentration treated as "at/near peak"
const PEAK_BAND_FRACTION: f64 = 0.95;

// ============================================================================
// Concentration curve
// ============================================================================

/// Simulated concentration percentage at `elapsed_minutes` after intake.
///
/// Absorption rises linearly from 0 to `bioavailability_percent` at
/// `peak_minutes`; elimination decays exponentially with
/// `k = ln 2 / half_life_minutes`. Never negative.
pub fn concentration_percent(params: &PkParams, elapsed_minutes: f64) -> f64 {
    if elapsed_minutes < 0.0 {
        return 0.0;
    }

    let c_max = params.bioavailability_percent;
    if elapsed_minutes < params.peak_minutes {
        c_max * (elapsed_minutes / params.peak_minutes)
    } else {
        let k = LN_2 / params.half_life_minutes;
        c_max * (-k * (elapsed_minutes - params.peak_minutes)).exp()
    }
}

/// Classify the curve phase at `elapsed_minutes` after intake.
///
/// "Cleared" means the concentration has *fallen* below the detection
/// floor; a just-taken dose still climbing through low values is
/// absorbing, not cleared.
pub fn classify_phase(params: &PkParams, elapsed_minutes: f64) -> CompoundPhase {
    if elapsed_minutes < 0.0 {
        return CompoundPhase::Cleared;
    }

    let concentration = concentration_percent(params, elapsed_minutes);
    let near_peak = concentration >= PEAK_BAND_FRACTION * params.bioavailability_percent;

    if elapsed_minutes < params.peak_minutes {
        if near_peak {
            CompoundPhase::Peak
        } else {
            CompoundPhase::Absorbing
        }
    } else if concentration < CLEARED_THRESHOLD_PERCENT {
        CompoundPhase::Cleared
    } else if near_peak {
        CompoundPhase::Peak
    } else {
        CompoundPhase::Eliminating
    }
}

fn elapsed_minutes(entry: &LogEntry, now: DateTime<Utc>) -> f64 {
    (now - entry.logged_at).num_milliseconds() as f64 / 60_000.0
}

/// Simulate one log entry at `now`.
pub fn simulate_compound(entry: &LogEntry, params: &PkParams, now: DateTime<Utc>) -> ActiveCompound {
    let elapsed = elapsed_minutes(entry, now);
    ActiveCompound {
        log_id: entry.id,
        supplement_id: entry.supplement_id.clone(),
        dosage: entry.dosage,
        unit: entry.unit.clone(),
        logged_at: entry.logged_at,
        peak_minutes: params.peak_minutes,
        half_life_minutes: params.half_life_minutes,
        bioavailability_percent: params.bioavailability_percent,
        phase: classify_phase(params, elapsed),
        concentration_percent: concentration_percent(params, elapsed),
    }
}

/// Compounds still above the detection floor at `now`, highest
/// concentration first. Entries without PK parameters are skipped.
pub fn active_compounds(
    entries: &[LogEntry],
    pk_params: &HashMap<String, PkParams>,
    now: DateTime<Utc>,
) -> Vec<ActiveCompound> {
    let mut compounds: Vec<ActiveCompound> = entries
        .iter()
        .filter_map(|entry| match pk_params.get(&entry.supplement_id) {
            Some(params) => Some(simulate_compound(entry, params, now)),
            None => {
                tracing::debug!(
                    "No PK parameters for {}; skipping simulation",
                    entry.supplement_id
                );
                None
            }
        })
        .filter(|c| c.phase != CompoundPhase::Cleared)
        .collect();

    compounds.sort_by(|a, b| {
        b.concentration_percent
            .partial_cmp(&a.concentration_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    compounds
}

/// Sample summed per-supplement concentrations across `[start, end]` at a
/// fixed cadence. Multiple intakes of the same supplement stack additively;
/// distinct supplements never influence each other here.
pub fn timeline(
    entries: &[LogEntry],
    pk_params: &HashMap<String, PkParams>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step_minutes: i64,
) -> Vec<TimelinePoint> {
    let step = Duration::minutes(step_minutes.max(1));
    let mut points = Vec::new();
    let mut at = start;

    while at <= end {
        let mut concentrations: HashMap<String, f64> = HashMap::new();

        for entry in entries {
            let params = match pk_params.get(&entry.supplement_id) {
                Some(p) => p,
                None => continue,
            };
            let elapsed = (at - entry.logged_at).num_milliseconds() as f64 / 60_000.0;
            let c = concentration_percent(params, elapsed);
            if c > 0.0 {
                *concentrations.entry(entry.supplement_id.clone()).or_insert(0.0) += c;
            }
        }

        points.push(TimelinePoint { at, concentrations });
        at += step;
    }

    points
}

// ============================================================================
// Exclusion zones
// ============================================================================

/// Open exclusion zones for every active compound matching either side of a
/// timing rule: the counterpart supplement should not be taken until
/// `intake + min_hours_apart`.
///
/// Expired zones are cleared (filtered), never carried. When the same pair
/// is covered by several intakes, the latest-ending zone wins. Sorted by
/// `minutes_remaining` ascending, so the soonest-to-lift zone leads.
pub fn exclusion_zones(
    active: &[ActiveCompound],
    timing_rules: &[TimingRule],
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> Vec<ExclusionZone> {
    let mut by_pair: HashMap<(String, String), ExclusionZone> = HashMap::new();

    for compound in active {
        for rule in timing_rules {
            let blocked = match rule.counterpart(&compound.supplement_id) {
                Some(counterpart) => counterpart.to_string(),
                None => continue,
            };

            let ends_at = compound.logged_at
                + Duration::seconds((rule.min_hours_apart * 3600.0).round() as i64);
            if ends_at <= now {
                continue;
            }

            let zone = ExclusionZone {
                rule_id: rule.id.clone(),
                source_supplement_id: compound.supplement_id.clone(),
                target_supplement_id: blocked.clone(),
                target_supplement_name: catalog.supplement_name(&blocked),
                ends_at,
                minutes_remaining: (ends_at - now).num_minutes(),
                reason: rule.reason.clone(),
                severity: rule.severity.clone(),
            };

            by_pair
                .entry((rule.id.clone(), blocked))
                .and_modify(|existing| {
                    if zone.ends_at > existing.ends_at {
                        *existing = zone.clone();
                    }
                })
                .or_insert(zone);
        }
    }

    let mut zones: Vec<ExclusionZone> = by_pair.into_values().collect();
    zones.sort_by_key(|z| z.minutes_remaining);
    zones
}

// ============================================================================
// Optimization opportunities
// ============================================================================

/// Derive optimization opportunities from the current stack state:
/// active synergies, missing co-factors, and competing pairs that should be
/// moved to different time slots. `recent_supplements` is the set of
/// supplement ids seen anywhere in the lookback window, used to decide
/// whether a co-factor is genuinely absent rather than merely cleared.
pub fn optimizations(
    active: &[ActiveCompound],
    interaction_rules: &[InteractionRule],
    cofactors: &[CofactorPairing],
    recent_supplements: &HashSet<String>,
    catalog: &Catalog,
) -> Vec<OptimizationOpportunity> {
    let active_ids: HashSet<&str> = active.iter().map(|c| c.supplement_id.as_str()).collect();
    let mut opportunities = Vec::new();

    for rule in interaction_rules {
        let both_active = active_ids.contains(rule.source_supplement_id.as_str())
            && active_ids.contains(rule.target_supplement_id.as_str());
        if !both_active {
            continue;
        }

        let source_name = catalog.supplement_name(&rule.source_supplement_id);
        let target_name = catalog.supplement_name(&rule.target_supplement_id);

        match rule.kind {
            InteractionKind::Synergy => {
                opportunities.push(OptimizationOpportunity {
                    kind: OptimizationKind::Synergy,
                    category: "synergy".into(),
                    supplement_ids: vec![
                        rule.source_supplement_id.clone(),
                        rule.target_supplement_id.clone(),
                    ],
                    title: format!("Active synergy: {} + {}", source_name, target_name),
                    description: rule.mechanism.clone(),
                    priority: 2,
                    suggestion_key: format!("synergy_{}", rule.id),
                    safety_warning: None,
                    suggested_supplement: None,
                });
            }
            InteractionKind::Competition => {
                opportunities.push(OptimizationOpportunity {
                    kind: OptimizationKind::Timing,
                    category: "timing".into(),
                    supplement_ids: vec![
                        rule.source_supplement_id.clone(),
                        rule.target_supplement_id.clone(),
                    ],
                    title: format!("Space out {} and {}", source_name, target_name),
                    description: format!(
                        "{} and {} are both active and compete: {}",
                        source_name, target_name, rule.mechanism
                    ),
                    priority: 1,
                    suggestion_key: format!("timing_{}", rule.id),
                    safety_warning: None,
                    suggested_supplement: None,
                });
            }
            InteractionKind::Inhibition => {}
        }
    }

    for pairing in cofactors {
        let supplement_active = active_ids.contains(pairing.supplement_id.as_str());
        let cofactor_seen = recent_supplements.contains(&pairing.cofactor_id);
        if !supplement_active || cofactor_seen {
            continue;
        }

        let supplement_name = catalog.supplement_name(&pairing.supplement_id);
        let cofactor_name = catalog.supplement_name(&pairing.cofactor_id);

        opportunities.push(OptimizationOpportunity {
            kind: OptimizationKind::Balance,
            category: pairing.category.clone(),
            supplement_ids: vec![pairing.supplement_id.clone()],
            title: format!("Add {} alongside {}", cofactor_name, supplement_name),
            description: pairing.description.clone(),
            priority: 1,
            suggestion_key: format!(
                "cofactor_{}_{}",
                pairing.supplement_id, pairing.cofactor_id
            ),
            safety_warning: pairing.safety_warning.clone(),
            suggested_supplement: Some(pairing.cofactor_id.clone()),
        });
    }

    opportunities.sort_by_key(|o| o.priority);
    opportunities
}

// ============================================================================
// Bio score
// ============================================================================

/// Deterministic 0-100 summary of the current stack state for the
/// dashboard: coverage and active synergies raise it, open exclusion zones
/// and active competitions pull it down.
pub fn bio_score(
    active: &[ActiveCompound],
    zones: &[ExclusionZone],
    opportunities: &[OptimizationOpportunity],
) -> u8 {
    let distinct_active: HashSet<&str> = active.iter().map(|c| c.supplement_id.as_str()).collect();
    let synergies = opportunities
        .iter()
        .filter(|o| o.kind == OptimizationKind::Synergy)
        .count();
    let competitions = opportunities
        .iter()
        .filter(|o| o.kind == OptimizationKind::Timing)
        .count();

    let mut score = 50.0;
    score += (distinct_active.len().min(5) as f64) * 6.0;
    score += (synergies.min(2) as f64) * 8.0;
    score -= (zones.len() as f64) * 12.0;
    score -= (competitions as f64) * 10.0;

    score.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_default_catalog;
    use crate::DoseUnit;
    use uuid::Uuid;

    fn caffeine_params() -> PkParams {
        PkParams {
            peak_minutes: 45.0,
            half_life_minutes: 300.0,
            bioavailability_percent: 100.0,
        }
    }

    fn entry(supp: &str, dosage: f64, minutes_ago: i64, now: DateTime<Utc>) -> LogEntry {
        LogEntry {
            id: Uuid::new_v4(),
            user_id: "alice".into(),
            supplement_id: supp.into(),
            dosage,
            unit: DoseUnit::Mg,
            logged_at: now - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_concentration_never_negative() {
        let params = caffeine_params();
        for minutes in [-30.0, 0.0, 10.0, 45.0, 300.0, 3000.0, 100_000.0] {
            assert!(
                concentration_percent(&params, minutes) >= 0.0,
                "negative concentration at t={}",
                minutes
            );
        }
    }

    #[test]
    fn test_concentration_strictly_decreasing_after_peak() {
        let params = caffeine_params();
        let mut previous = concentration_percent(&params, params.peak_minutes);
        for offset in 1..20 {
            let c = concentration_percent(&params, params.peak_minutes + (offset * 30) as f64);
            assert!(c < previous, "not strictly decreasing at offset {}", offset);
            previous = c;
        }
    }

    #[test]
    fn test_absorption_reaches_bioavailability_at_peak() {
        let params = caffeine_params();
        let at_peak = concentration_percent(&params, params.peak_minutes);
        assert!((at_peak - 100.0).abs() < 1e-9);

        let halfway = concentration_percent(&params, params.peak_minutes / 2.0);
        assert!((halfway - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_caffeine_three_hours_after_dose() {
        let params = caffeine_params();
        // 180 min elapsed, 135 min past peak: 100 * 0.5^(135/300)
        let c = concentration_percent(&params, 180.0);
        assert!((c - 73.2).abs() < 0.1, "got {}", c);
        assert_eq!(classify_phase(&params, 180.0), CompoundPhase::Eliminating);
    }

    #[test]
    fn test_phase_classification_over_curve() {
        let params = caffeine_params();
        // A just-taken dose is absorbing, not cleared
        assert_eq!(classify_phase(&params, 0.0), CompoundPhase::Absorbing);
        assert_eq!(classify_phase(&params, 10.0), CompoundPhase::Absorbing);
        assert_eq!(classify_phase(&params, 44.0), CompoundPhase::Peak);
        assert_eq!(classify_phase(&params, 46.0), CompoundPhase::Peak);
        assert_eq!(classify_phase(&params, 240.0), CompoundPhase::Eliminating);
        // ~10 half-lives past peak
        assert_eq!(classify_phase(&params, 3100.0), CompoundPhase::Cleared);
    }

    #[test]
    fn test_simulator_is_idempotent() {
        let now = Utc::now();
        let catalog = build_default_catalog();
        let entries = vec![
            entry("caffeine", 100.0, 180, now),
            entry("zinc", 30.0, 60, now),
        ];

        let first = active_compounds(&entries, &catalog.pk_params, now);
        let second = active_compounds(&entries, &catalog.pk_params, now);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.log_id, b.log_id);
            assert_eq!(a.phase, b.phase);
            assert_eq!(a.concentration_percent, b.concentration_percent);
        }
    }

    #[test]
    fn test_active_compounds_skips_cleared_and_unknown() {
        let now = Utc::now();
        let catalog = build_default_catalog();
        let entries = vec![
            entry("caffeine", 100.0, 60, now),
            // Far past clearance
            entry("caffeine", 100.0, 60 * 60, now),
            // No PK parameters
            entry("mystery_blend", 500.0, 30, now),
        ];

        let active = active_compounds(&entries, &catalog.pk_params, now);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].supplement_id, "caffeine");
    }

    #[test]
    fn test_timeline_sums_repeat_doses() {
        let now = Utc::now();
        let catalog = build_default_catalog();
        let entries = vec![
            entry("caffeine", 100.0, 120, now),
            entry("caffeine", 100.0, 30, now),
        ];

        let points = timeline(&entries, &catalog.pk_params, now - Duration::hours(1), now, 60);
        assert_eq!(points.len(), 2);

        let latest = &points[1];
        let single_dose_max = 100.0;
        assert!(latest.concentrations["caffeine"] > single_dose_max);
    }

    #[test]
    fn test_exclusion_zone_opens_and_expires() {
        let now = Utc::now();
        let catalog = build_default_catalog();

        // Zinc 30 min ago: 2h rule leaves ~90 min of zone against copper
        let recent = vec![entry("zinc", 30.0, 30, now)];
        let active = active_compounds(&recent, &catalog.pk_params, now);
        let zones = exclusion_zones(&active, &catalog.timing_rules, &catalog, now);

        let copper_zone = zones
            .iter()
            .find(|z| z.target_supplement_id == "copper")
            .expect("zone against copper");
        assert!(copper_zone.minutes_remaining > 0);
        assert!(copper_zone.minutes_remaining <= 90);
        assert!(copper_zone.ends_at > now);

        // Zinc 3h ago: the 2h window has lapsed even though zinc is active
        let stale = vec![entry("zinc", 30.0, 180, now)];
        let active = active_compounds(&stale, &catalog.pk_params, now);
        let zones = exclusion_zones(&active, &catalog.timing_rules, &catalog, now);
        assert!(zones.iter().all(|z| z.target_supplement_id != "copper"));
    }

    #[test]
    fn test_exclusion_zones_sorted_soonest_first() {
        let now = Utc::now();
        let catalog = build_default_catalog();

        let entries = vec![
            entry("zinc", 30.0, 100, now),     // ~20 min left on 2h rules
            entry("tyrosine", 500.0, 30, now), // ~210 min left on 4h rule
        ];
        let active = active_compounds(&entries, &catalog.pk_params, now);
        let zones = exclusion_zones(&active, &catalog.timing_rules, &catalog, now);

        assert!(zones.len() >= 2);
        for pair in zones.windows(2) {
            assert!(pair[0].minutes_remaining <= pair[1].minutes_remaining);
        }
    }

    #[test]
    fn test_repeat_intake_keeps_latest_zone() {
        let now = Utc::now();
        let catalog = build_default_catalog();

        let entries = vec![
            entry("zinc", 30.0, 100, now),
            entry("zinc", 30.0, 10, now),
        ];
        let active = active_compounds(&entries, &catalog.pk_params, now);
        let zones = exclusion_zones(&active, &catalog.timing_rules, &catalog, now);

        let copper_zones: Vec<_> = zones
            .iter()
            .filter(|z| z.rule_id == "tr_zinc_copper")
            .collect();
        assert_eq!(copper_zones.len(), 1);
        // Bound by the most recent intake: ~110 minutes remaining
        assert!(copper_zones[0].minutes_remaining > 90);
    }

    #[test]
    fn test_active_synergy_opportunity() {
        let now = Utc::now();
        let catalog = build_default_catalog();

        let entries = vec![
            entry("vitamin_d3", 5000.0, 120, now),
            entry("vitamin_k2", 100.0, 120, now),
        ];
        let active = active_compounds(&entries, &catalog.pk_params, now);
        let recent: HashSet<String> = entries.iter().map(|e| e.supplement_id.clone()).collect();
        let opportunities = optimizations(
            &active,
            &catalog.interaction_rules,
            &catalog.cofactors,
            &recent,
            &catalog,
        );

        let synergy: Vec<_> = opportunities
            .iter()
            .filter(|o| o.kind == OptimizationKind::Synergy)
            .collect();
        assert_eq!(synergy.len(), 1);
        assert!(synergy[0].title.starts_with("Active synergy:"));
    }

    #[test]
    fn test_missing_cofactor_suggested() {
        let now = Utc::now();
        let catalog = build_default_catalog();

        let entries = vec![entry("zinc", 30.0, 60, now)];
        let active = active_compounds(&entries, &catalog.pk_params, now);
        let recent: HashSet<String> = entries.iter().map(|e| e.supplement_id.clone()).collect();
        let opportunities = optimizations(
            &active,
            &catalog.interaction_rules,
            &catalog.cofactors,
            &recent,
            &catalog,
        );

        let copper = opportunities
            .iter()
            .find(|o| o.suggested_supplement.as_deref() == Some("copper"))
            .expect("copper co-factor suggestion");
        assert_eq!(copper.kind, OptimizationKind::Balance);
        assert!(copper.safety_warning.is_some());
    }

    #[test]
    fn test_cofactor_not_suggested_when_recently_logged() {
        let now = Utc::now();
        let catalog = build_default_catalog();

        let entries = vec![
            entry("iron", 25.0, 60, now),
            // Long cleared, but still inside the lookback window
            entry("vitamin_c", 500.0, 60 * 20, now),
        ];
        let active = active_compounds(&entries, &catalog.pk_params, now);
        assert!(active.iter().all(|c| c.supplement_id != "vitamin_c"));

        let recent: HashSet<String> = entries.iter().map(|e| e.supplement_id.clone()).collect();
        let opportunities = optimizations(
            &active,
            &catalog.interaction_rules,
            &catalog.cofactors,
            &recent,
            &catalog,
        );

        assert!(opportunities
            .iter()
            .all(|o| o.suggested_supplement.as_deref() != Some("vitamin_c")));
    }

    #[test]
    fn test_competition_yields_timing_opportunity() {
        let now = Utc::now();
        let catalog = build_default_catalog();

        let entries = vec![
            entry("zinc", 30.0, 30, now),
            entry("copper", 2.0, 30, now),
        ];
        let active = active_compounds(&entries, &catalog.pk_params, now);
        let recent: HashSet<String> = entries.iter().map(|e| e.supplement_id.clone()).collect();
        let opportunities = optimizations(
            &active,
            &catalog.interaction_rules,
            &catalog.cofactors,
            &recent,
            &catalog,
        );

        assert!(opportunities
            .iter()
            .any(|o| o.kind == OptimizationKind::Timing && o.suggestion_key == "timing_ix_zinc_copper"));
    }

    #[test]
    fn test_bio_score_bounds_and_direction() {
        let now = Utc::now();
        let catalog = build_default_catalog();

        let clean = vec![
            entry("vitamin_d3", 5000.0, 120, now),
            entry("vitamin_k2", 100.0, 120, now),
        ];
        let active = active_compounds(&clean, &catalog.pk_params, now);
        let recent: HashSet<String> = clean.iter().map(|e| e.supplement_id.clone()).collect();
        let opps = optimizations(
            &active,
            &catalog.interaction_rules,
            &catalog.cofactors,
            &recent,
            &catalog,
        );
        let zones = exclusion_zones(&active, &catalog.timing_rules, &catalog, now);
        let synergy_score = bio_score(&active, &zones, &opps);

        let conflicted = vec![
            entry("zinc", 30.0, 30, now),
            entry("copper", 2.0, 30, now),
        ];
        let active = active_compounds(&conflicted, &catalog.pk_params, now);
        let recent: HashSet<String> = conflicted.iter().map(|e| e.supplement_id.clone()).collect();
        let opps = optimizations(
            &active,
            &catalog.interaction_rules,
            &catalog.cofactors,
            &recent,
            &catalog,
        );
        let zones = exclusion_zones(&active, &catalog.timing_rules, &catalog, now);
        let conflict_score = bio_score(&active, &zones, &opps);

        assert!(synergy_score <= 100);
        assert!(conflict_score < synergy_score);
    }
}
