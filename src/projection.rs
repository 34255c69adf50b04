// 💰 Projection Engine - future value of a recurring contribution
//
//   FV(P, r, n, t) = P * (((1 + r/n)^(n*t) - 1) / (r/n)) * (1 + r/n)
//
// Contributions land at the start of each period (annuity due). With r = 0
// the formula divides by zero, so it collapses to P * n * t. The growth term
// goes through ln_1p/exp_m1 so rates near zero converge on that limit.

use crate::error::{PlanError, Result};
use crate::metrics::MetricsTable;
use crate::selection::AllocationPlan;
use serde::{Deserialize, Serialize};

/// Monthly contributions, monthly compounding.
pub const MONTHS_PER_YEAR: u32 = 12;

/// Future value of `contribution` paid every period for `years` years.
///
/// `annual_rate` is a decimal (0.12 for 12%).
pub fn future_value(contribution: f64, annual_rate: f64, periods_per_year: u32, years: u32) -> f64 {
    let n = periods_per_year as f64;
    let periods = n * years as f64;

    if annual_rate == 0.0 {
        return contribution * n * years as f64;
    }

    let rate = annual_rate / n;
    let growth = (periods * rate.ln_1p()).exp_m1() / rate;
    contribution * growth * (1.0 + rate)
}

/// Blended annual rate of a plan: mean ROI of its entities, as a decimal.
///
/// Unweighted, like the headline "expected ROI" of the plan. Returns 0.0 for
/// an empty plan.
pub fn blended_annual_return(metrics: &MetricsTable, plan: &AllocationPlan) -> f64 {
    let rois: Vec<f64> = plan
        .iter()
        .filter_map(|(entity, _)| metrics.get(entity).map(|m| m.roi))
        .collect();

    if rois.is_empty() {
        return 0.0;
    }
    rois.iter().sum::<f64>() / rois.len() as f64 / 100.0
}

// ============================================================================
// PROJECTION RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonValue {
    pub years: u32,
    pub future_value: f64,
    /// Sum of contributions paid in, before any growth.
    pub total_contributed: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub contribution: f64,
    pub annual_rate: f64,
    pub periods_per_year: u32,
    /// One entry per requested horizon, in the order requested.
    pub values: Vec<HorizonValue>,
}

impl ProjectionResult {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn at(&self, years: u32) -> Option<&HorizonValue> {
        self.values.iter().find(|v| v.years == years)
    }

    /// `("N year", future value)` pairs for charting.
    pub fn labelled(&self) -> Vec<(String, f64)> {
        self.values
            .iter()
            .map(|v| (format!("{} year", v.years), v.future_value))
            .collect()
    }
}

/// Project future value at every horizon.
pub fn project(
    contribution: f64,
    annual_rate: f64,
    periods_per_year: u32,
    horizons: &[u32],
) -> Result<ProjectionResult> {
    if !contribution.is_finite() || contribution < 0.0 {
        return Err(PlanError::InvalidContribution {
            amount: contribution,
        });
    }
    if periods_per_year == 0 {
        return Err(PlanError::config("periods_per_year must be at least 1"));
    }
    if !annual_rate.is_finite() {
        return Err(PlanError::config(format!("annual rate {} is not finite", annual_rate)));
    }
    if let Some(&bad) = horizons.iter().find(|&&h| h == 0) {
        return Err(PlanError::InvalidHorizon { horizon: bad });
    }

    let values = horizons
        .iter()
        .map(|&years| {
            let fv = future_value(contribution, annual_rate, periods_per_year, years);
            let total_contributed = contribution * periods_per_year as f64 * years as f64;
            HorizonValue {
                years,
                future_value: fv,
                total_contributed,
                gain: fv - total_contributed,
            }
        })
        .collect();

    Ok(ProjectionResult {
        contribution,
        annual_rate,
        periods_per_year,
        values,
    })
}
