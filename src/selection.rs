// 🎯 Plan Selector - median thresholds + inverse-volatility weights
//
// Selection:  roi > median(roi)  AND  volatility < median(volatility)
// Weighting:  w(e) = (1 / vol(e)) / sum over selected of (1 / vol(s))
//
// Both comparisons are strict, so an entity sitting exactly on a threshold is
// left out. An empty selection is a valid outcome, not an error.

use crate::error::{PlanError, Result};
use crate::metrics::{EntityMetric, MetricsTable};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Median with the usual even-count convention (mean of the middle pair).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

// ============================================================================
// SELECTION CRITERIA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub roi_threshold: f64,
    pub volatility_threshold: f64,
}

impl SelectionCriteria {
    /// Medians of ROI and volatility across the whole universe.
    pub fn from_metrics(metrics: &MetricsTable) -> Result<Self> {
        let roi_threshold = median(&metrics.rois()).ok_or(PlanError::NoEntities)?;
        let volatility_threshold = median(&metrics.volatilities()).ok_or(PlanError::NoEntities)?;

        Ok(SelectionCriteria {
            roi_threshold,
            volatility_threshold,
        })
    }

    /// High return and low risk, both strictly.
    pub fn admits(&self, metric: &EntityMetric) -> bool {
        metric.roi > self.roi_threshold && metric.volatility < self.volatility_threshold
    }
}

/// Entities passing the criteria, in entity-id order.
pub fn select_entities(metrics: &MetricsTable, criteria: &SelectionCriteria) -> Vec<String> {
    metrics
        .iter()
        .filter(|(_, m)| criteria.admits(m))
        .map(|(entity, _)| entity.to_string())
        .collect()
}

// ============================================================================
// ALLOCATION PLAN
// ============================================================================

/// Weights per selected entity; positive and summing to 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    weights: BTreeMap<String, f64>,
}

impl AllocationPlan {
    pub fn get(&self, entity: &str) -> Option<f64> {
        self.weights.get(entity).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.weights.contains_key(entity)
    }

    /// `(entity, weight)` in entity-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn entities(&self) -> Vec<String> {
        self.weights.keys().cloned().collect()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Largest allocation first; ties keep entity-id order.
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> =
            self.weights.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked
    }
}

/// Inverse-volatility weights over `selected`.
///
/// A selected entity with zero volatility has no defined inverse and fails
/// the whole allocation.
pub fn inverse_volatility_weights(
    metrics: &MetricsTable,
    selected: &[String],
) -> Result<AllocationPlan> {
    let mut inverse = BTreeMap::new();

    for entity in selected {
        let metric = metrics
            .get(entity)
            .ok_or_else(|| PlanError::config(format!("{} is not in the metrics table", entity)))?;

        if metric.volatility == 0.0 {
            return Err(PlanError::division_by_zero(entity.clone()));
        }
        inverse.insert(entity.clone(), 1.0 / metric.volatility);
    }

    let total: f64 = inverse.values().sum();
    let weights = inverse
        .into_iter()
        .map(|(entity, inv)| (entity, inv / total))
        .collect();

    Ok(AllocationPlan { weights })
}

// ============================================================================
// PLAN OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
    /// At least one entity passed; weights are allocated.
    Allocated {
        criteria: SelectionCriteria,
        plan: AllocationPlan,
    },
    /// Nobody passed both thresholds; there is nothing to project.
    EmptySelection { criteria: SelectionCriteria },
}

impl PlanOutcome {
    pub fn criteria(&self) -> &SelectionCriteria {
        match self {
            PlanOutcome::Allocated { criteria, .. } => criteria,
            PlanOutcome::EmptySelection { criteria } => criteria,
        }
    }

    pub fn plan(&self) -> Option<&AllocationPlan> {
        match self {
            PlanOutcome::Allocated { plan, .. } => Some(plan),
            PlanOutcome::EmptySelection { .. } => None,
        }
    }

    pub fn is_empty_selection(&self) -> bool {
        matches!(self, PlanOutcome::EmptySelection { .. })
    }
}

/// Thresholds, filter, then weights.
pub fn build_plan(metrics: &MetricsTable) -> Result<PlanOutcome> {
    let criteria = SelectionCriteria::from_metrics(metrics)?;
    debug!(
        roi_threshold = criteria.roi_threshold,
        volatility_threshold = criteria.volatility_threshold,
        "selection thresholds"
    );

    let selected = select_entities(metrics, &criteria);
    if selected.is_empty() {
        warn!(universe = metrics.len(), "no entity passed both thresholds");
        return Ok(PlanOutcome::EmptySelection { criteria });
    }

    let plan = inverse_volatility_weights(metrics, &selected)?;
    for (entity, weight) in plan.iter() {
        debug!(entity, weight, "allocation");
    }
    info!(
        selected = plan.len(),
        universe = metrics.len(),
        "allocation plan built"
    );

    Ok(PlanOutcome::Allocated { criteria, plan })
}

/// Selected entities ordered by ROI, best first.
pub fn ranked_by_roi(metrics: &MetricsTable, plan: &AllocationPlan) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = plan
        .iter()
        .filter_map(|(entity, _)| metrics.get(entity).map(|m| (entity.to_string(), m.roi)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::read_prices;
    use crate::metrics::compute_metrics;

    fn metric(roi: f64, volatility: f64) -> EntityMetric {
        EntityMetric {
            volatility,
            mean_growth_rate: 0.0,
            roi,
            observations: 10,
        }
    }

    fn table(entries: &[(&str, f64, f64)]) -> MetricsTable {
        let map = entries
            .iter()
            .map(|(e, roi, vol)| (e.to_string(), metric(*roi, *vol)))
            .collect();
        MetricsTable::from_map(map)
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[7.0]), Some(7.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_two_entity_scenario_selects_only_a() {
        // roi(A) = 21%, roi(B) = -19%, vol(A) ~ 10.5 < vol(B) ~ 15.2
        let csv = "Date,A,B\n2024-01-01,100,100\n2024-01-02,110,70\n2024-01-03,121,81\n";
        let metrics = compute_metrics(&read_prices(csv.as_bytes()).unwrap()).unwrap();

        let outcome = build_plan(&metrics).unwrap();
        let plan = outcome.plan().expect("A should be selected");

        assert_eq!(plan.entities(), vec!["A".to_string()]);
        assert!((plan.get("A").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_entity_wider_winner_is_empty_selection() {
        // A wins on roi but its prices spread wider than B's, so it fails
        // the volatility threshold and nothing is selected.
        let csv = "Date,A,B\n2024-01-01,100,100\n2024-01-02,110,90\n2024-01-03,121,81\n";
        let metrics = compute_metrics(&read_prices(csv.as_bytes()).unwrap()).unwrap();

        assert!(build_plan(&metrics).unwrap().is_empty_selection());
    }

    #[test]
    fn test_strict_thresholds_exclude_boundary() {
        // Medians: roi = 10, vol = 2. "MID" sits exactly on both.
        let metrics = table(&[
            ("HIGH", 20.0, 1.0),
            ("MID", 10.0, 2.0),
            ("LOW", 0.0, 3.0),
        ]);
        let criteria = SelectionCriteria::from_metrics(&metrics).unwrap();
        assert_eq!(criteria.roi_threshold, 10.0);
        assert_eq!(criteria.volatility_threshold, 2.0);

        let selected = select_entities(&metrics, &criteria);
        assert_eq!(selected, vec!["HIGH".to_string()]);
    }

    #[test]
    fn test_weights_sum_to_one_and_positive() {
        let metrics = table(&[
            ("A", 30.0, 1.0),
            ("B", 25.0, 2.0),
            ("C", 22.0, 4.0),
            ("D", 1.0, 50.0),
            ("E", 2.0, 60.0),
            ("F", 3.0, 70.0),
            ("G", -5.0, 80.0),
        ]);
        let outcome = build_plan(&metrics).unwrap();
        let plan = outcome.plan().unwrap();
        let criteria = outcome.criteria();

        assert!((plan.total_weight() - 1.0).abs() < 1e-9);
        for (entity, weight) in plan.iter() {
            assert!(weight > 0.0);
            let m = metrics.get(entity).unwrap();
            assert!(m.roi > criteria.roi_threshold);
            assert!(m.volatility < criteria.volatility_threshold);
        }

        // 1/1 : 1/2 : 1/4 = 4 : 2 : 1
        assert!((plan.get("A").unwrap() - 4.0 / 7.0).abs() < 1e-12);
        assert!((plan.get("C").unwrap() - 1.0 / 7.0).abs() < 1e-12);

        let ranked = plan.ranked();
        assert_eq!(ranked[0].0, "A");
        assert_eq!(ranked[2].0, "C");
    }

    #[test]
    fn test_identical_volatility_is_empty_selection() {
        let metrics = table(&[("A", 10.0, 5.0), ("B", 20.0, 5.0), ("C", 30.0, 5.0)]);
        let outcome = build_plan(&metrics).unwrap();
        assert!(outcome.is_empty_selection());
        assert!(outcome.plan().is_none());
    }

    #[test]
    fn test_identical_nonzero_volatility_allocates_equally() {
        let metrics = table(&[("A", 10.0, 5.0), ("B", 20.0, 5.0), ("C", 30.0, 5.0)]);
        let selected = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let plan = inverse_volatility_weights(&metrics, &selected).unwrap();
        for (_, weight) in plan.iter() {
            assert!((weight - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_identical_zero_volatility_signals_division_by_zero() {
        let metrics = table(&[("A", 10.0, 0.0), ("B", 20.0, 0.0)]);
        let selected = vec!["A".to_string(), "B".to_string()];

        let err = inverse_volatility_weights(&metrics, &selected).unwrap_err();
        assert!(matches!(err, PlanError::DivisionByZero { ref entity } if entity == "A"));
    }

    #[test]
    fn test_zero_volatility_selected_entity_fails_plan() {
        // Medians: roi = 10, vol = 1. FLAT passes both and has no volatility.
        let metrics = table(&[("FLAT", 50.0, 0.0), ("MID", 10.0, 1.0), ("WILD", -3.0, 9.0)]);
        assert!(matches!(
            build_plan(&metrics),
            Err(PlanError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_empty_universe_is_error() {
        let metrics = MetricsTable::default();
        assert!(matches!(build_plan(&metrics), Err(PlanError::NoEntities)));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let metrics = table(&[
            ("Z", 30.0, 1.0),
            ("Y", 25.0, 2.0),
            ("X", 1.0, 50.0),
            ("W", 2.0, 60.0),
        ]);
        let first = build_plan(&metrics).unwrap();
        let second = build_plan(&metrics).unwrap();
        assert_eq!(first, second);

        let order: Vec<String> = first.plan().unwrap().iter().map(|(e, _)| e.to_string()).collect();
        assert_eq!(order, vec!["Y".to_string(), "Z".to_string()]);
    }

    #[test]
    fn test_ranked_by_roi() {
        let metrics = table(&[
            ("A", 22.0, 1.0),
            ("B", 30.0, 2.0),
            ("C", 1.0, 50.0),
            ("D", 2.0, 60.0),
        ]);
        let outcome = build_plan(&metrics).unwrap();
        let ranked = ranked_by_roi(&metrics, outcome.plan().unwrap());
        assert_eq!(ranked[0], ("B".to_string(), 30.0));
        assert_eq!(ranked[1], ("A".to_string(), 22.0));
    }
}
