// 📊 Plan Report - the read-only views handed to renderers
//
// run_pipeline drives Loader output -> metrics -> plan -> projection and
// packs everything a renderer needs: the metrics table, the allocation plan
// (or the empty-selection state), the projection, and the plan-vs-peers
// comparison series.

use crate::config::PlanConfig;
use crate::error::Result;
use crate::loader::PriceTable;
use crate::metrics::{compute_metrics, EntityMetric, MetricsTable};
use crate::projection::{blended_annual_return, project, ProjectionResult};
use crate::selection::{build_plan, ranked_by_roi, AllocationPlan, PlanOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

// ============================================================================
// PEER COMPARISON
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonBar {
    pub entity: String,
    pub value: f64,
}

/// Plan entities set against the top-growth reference set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerComparison {
    /// Top entities by mean growth rate, fastest first.
    pub peer_entities: Vec<String>,
    pub plan_risk: Vec<ComparisonBar>,
    pub peer_risk: Vec<ComparisonBar>,
    pub plan_roi: Vec<ComparisonBar>,
    pub peer_roi: Vec<ComparisonBar>,
}

impl PeerComparison {
    pub fn build(metrics: &MetricsTable, plan: Option<&AllocationPlan>, peer_group_size: usize) -> Self {
        let peer_entities: Vec<String> = metrics
            .top_by_growth(peer_group_size)
            .into_iter()
            .map(|(entity, _)| entity)
            .collect();
        let plan_entities = plan.map(AllocationPlan::entities).unwrap_or_default();

        let bars = |entities: &[String], pick: fn(&EntityMetric) -> f64| {
            entities
                .iter()
                .filter_map(|e| {
                    metrics.get(e).map(|m| ComparisonBar {
                        entity: e.clone(),
                        value: pick(m),
                    })
                })
                .collect::<Vec<_>>()
        };

        PeerComparison {
            plan_risk: bars(&plan_entities, |m: &EntityMetric| m.volatility),
            peer_risk: bars(&peer_entities, |m: &EntityMetric| m.volatility),
            plan_roi: bars(&plan_entities, |m: &EntityMetric| m.roi),
            peer_roi: bars(&peer_entities, |m: &EntityMetric| m.roi),
            peer_entities,
        }
    }

    /// Entities appearing in both groups.
    pub fn overlap(&self) -> Vec<String> {
        self.plan_risk
            .iter()
            .filter(|bar| self.peer_entities.contains(&bar.entity))
            .map(|bar| bar.entity.clone())
            .collect()
    }
}

// ============================================================================
// RANKED LISTINGS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedListings {
    pub riskiest: Vec<(String, f64)>,
    pub fastest_growing: Vec<(String, f64)>,
    pub best_roi: Vec<(String, f64)>,
}

impl RankedListings {
    pub fn build(metrics: &MetricsTable, top_n: usize) -> Self {
        RankedListings {
            riskiest: metrics.top_by_volatility(top_n),
            fastest_growing: metrics.top_by_growth(top_n),
            best_roi: metrics.top_by_roi(top_n),
        }
    }
}

// ============================================================================
// PLAN REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    pub metrics: MetricsTable,
    pub outcome: PlanOutcome,
    /// Selected entities, best ROI first. Empty when nothing was selected.
    pub selected_by_roi: Vec<(String, f64)>,
    /// Blended annual rate used for the projection (decimal).
    pub blended_rate: Option<f64>,
    /// Absent when the selection was empty.
    pub projection: Option<ProjectionResult>,
    pub comparison: PeerComparison,
    pub rankings: RankedListings,
}

impl PlanReport {
    pub fn plan(&self) -> Option<&AllocationPlan> {
        self.outcome.plan()
    }

    pub fn is_empty_selection(&self) -> bool {
        self.outcome.is_empty_selection()
    }

    pub fn summary(&self) -> String {
        let criteria = self.outcome.criteria();
        match (&self.outcome, &self.projection) {
            (PlanOutcome::Allocated { plan, .. }, Some(projection)) => {
                let last = projection
                    .values
                    .last()
                    .map(|v| format!(", {:.2} after {} years", v.future_value, v.years))
                    .unwrap_or_default();
                format!(
                    "{} of {} entities selected (ROI > {:.2}%, volatility < {:.2}), blended rate {:.2}%{}",
                    plan.len(),
                    self.metrics.len(),
                    criteria.roi_threshold,
                    criteria.volatility_threshold,
                    projection.annual_rate * 100.0,
                    last
                )
            }
            _ => format!(
                "No entity passed ROI > {:.2}% and volatility < {:.2}; nothing to project",
                criteria.roi_threshold, criteria.volatility_threshold
            ),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Run metrics, selection and projection over a cleaned price table.
///
/// Any stage failure aborts the run; an empty selection finishes normally
/// with no plan and no projection.
pub fn run_pipeline(table: &PriceTable, config: &PlanConfig) -> Result<PlanReport> {
    config.validate()?;

    let metrics = compute_metrics(table)?;
    let outcome = build_plan(&metrics)?;

    let (selected_by_roi, blended_rate, projection) = match outcome.plan() {
        Some(plan) => {
            let rate = blended_annual_return(&metrics, plan);
            let projection = project(
                config.monthly_investment,
                rate,
                config.periods_per_year,
                &config.horizons,
            )?;
            info!(rate, horizons = config.horizons.len(), "projection computed");
            (ranked_by_roi(&metrics, plan), Some(rate), Some(projection))
        }
        None => (Vec::new(), None, None),
    };

    let comparison = PeerComparison::build(&metrics, outcome.plan(), config.peer_group_size);
    let rankings = RankedListings::build(&metrics, config.top_n);

    Ok(PlanReport {
        metrics,
        outcome,
        selected_by_roi,
        blended_rate,
        projection,
        comparison,
        rankings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanError;
    use crate::loader::load_from_reader;

    // Steady risers alongside wide swingers and decliners
    const UNIVERSE: &str = "\
Date,ALPHA,BRAVO,CHARLIE,DELTA,ECHO,FOXTROT,GOLF,HOTEL
2024-01-01,100,100,100,100,100,100,100,100
2024-01-02,101,102,,104,130,60,95,140
2024-01-03,102,103,101,105,70,120,90,60
2024-01-04,103,104,102,106,140,50,85,150
";

    fn report(config: &PlanConfig) -> PlanReport {
        let loaded = load_from_reader(UNIVERSE.as_bytes()).unwrap();
        run_pipeline(&loaded.table, config).unwrap()
    }

    #[test]
    fn test_pipeline_produces_plan_and_projection() {
        let report = report(&PlanConfig::default());

        let plan = report.plan().expect("some entities should be selected");
        assert!((plan.total_weight() - 1.0).abs() < 1e-9);
        assert!(!plan.contains("ECHO"));
        assert!(!plan.contains("GOLF"));

        let projection = report.projection.as_ref().unwrap();
        assert_eq!(projection.len(), 6);
        assert_eq!(projection.values[0].years, 1);
        assert_eq!(report.blended_rate, Some(projection.annual_rate));
        assert_eq!(report.selected_by_roi.len(), plan.len());
    }

    #[test]
    fn test_pipeline_every_selected_passes_thresholds() {
        let report = report(&PlanConfig::default());
        let criteria = report.outcome.criteria();

        for (entity, weight) in report.plan().unwrap().iter() {
            let m = report.metrics.get(entity).unwrap();
            assert!(weight > 0.0);
            assert!(m.roi > criteria.roi_threshold);
            assert!(m.volatility < criteria.volatility_threshold);
        }
    }

    #[test]
    fn test_peer_group_size_respected() {
        let config = PlanConfig::default().with_peer_group_size(3);
        let report = report(&config);

        assert_eq!(report.comparison.peer_entities.len(), 3);
        assert_eq!(report.comparison.peer_risk.len(), 3);
        assert_eq!(report.comparison.peer_roi.len(), 3);
        assert_eq!(
            report.comparison.plan_risk.len(),
            report.plan().map(|p| p.len()).unwrap_or(0)
        );
    }

    #[test]
    fn test_peer_group_larger_than_universe() {
        let report = report(&PlanConfig::default().with_peer_group_size(50));
        assert_eq!(report.comparison.peer_entities.len(), 8);
    }

    #[test]
    fn test_empty_selection_is_terminal_state() {
        let csv = "Date,A,B,C\n2024-01-01,10,20,30\n2024-01-02,11,21,31\n2024-01-03,10,20,30\n";
        let loaded = load_from_reader(csv.as_bytes()).unwrap();
        let report = run_pipeline(&loaded.table, &PlanConfig::default()).unwrap();

        assert!(report.is_empty_selection());
        assert!(report.projection.is_none());
        assert!(report.selected_by_roi.is_empty());
        assert!(report.comparison.plan_risk.is_empty());
        assert!(report.summary().starts_with("No entity passed"));
    }

    #[test]
    fn test_pipeline_aborts_on_invalid_config() {
        let loaded = load_from_reader(UNIVERSE.as_bytes()).unwrap();
        let config = PlanConfig::default().with_horizons(vec![0]);
        assert!(matches!(
            run_pipeline(&loaded.table, &config),
            Err(PlanError::InvalidHorizon { .. })
        ));
    }

    #[test]
    fn test_report_json_roundtrip() {
        let report = report(&PlanConfig::default());
        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"allocated\""));

        let back: PlanReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.plan().map(|p| p.len()), report.plan().map(|p| p.len()));
    }

    #[test]
    fn test_rankings_use_top_n() {
        let mut config = PlanConfig::default();
        config.top_n = 2;
        let report = report(&config);

        assert_eq!(report.rankings.riskiest.len(), 2);
        assert_eq!(report.rankings.best_roi[0].0, "HOTEL");
    }
}
