// 📈 Return / Risk Engine - per-entity volatility, growth and ROI
//
//   volatility  = sample std dev of closing prices (n - 1 denominator)
//   growth[i]   = (p[i] - p[i-1]) / p[i-1] * 100, undefined at i = 0
//   mean growth = mean of the defined growth rates
//   roi         = (last - first) / first * 100
//
// Only observed cells count. After forward fill that means a leading gap is
// skipped and ROI starts from the first observed price.

use crate::error::{PlanError, Result};
use crate::loader::PriceTable;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::info;

// ============================================================================
// ENTITY METRIC
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityMetric {
    /// Sample standard deviation of the price series (>= 0).
    pub volatility: f64,
    /// Mean period-over-period growth, in percent.
    pub mean_growth_rate: f64,
    /// Return on investment over the whole table, in percent.
    pub roi: f64,
    /// Observed prices the metric was computed from.
    pub observations: usize,
}

impl EntityMetric {
    /// Compute the metric for one observed price series.
    pub fn from_prices(entity: &str, prices: &[f64]) -> Result<Self> {
        if prices.len() < 2 {
            return Err(PlanError::insufficient_data(entity, prices.len()));
        }

        let first = prices[0];
        let last = prices[prices.len() - 1];

        Ok(EntityMetric {
            volatility: sample_std_dev(prices),
            mean_growth_rate: mean(&growth_rates(prices)),
            roi: (last - first) / first * 100.0,
            observations: prices.len(),
        })
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; 0.0 for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let n = values.len() as f64;
    let avg = mean(values);
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - avg;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);

    variance.sqrt()
}

/// Period-over-period growth in percent; one value per consecutive pair.
pub fn growth_rates(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0] * 100.0)
        .collect()
}

// ============================================================================
// METRICS TABLE
// ============================================================================

/// Metrics for the whole universe, keyed and ordered by entity id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsTable {
    metrics: BTreeMap<String, EntityMetric>,
}

impl MetricsTable {
    pub fn from_map(metrics: BTreeMap<String, EntityMetric>) -> Self {
        MetricsTable { metrics }
    }

    pub fn get(&self, entity: &str) -> Option<&EntityMetric> {
        self.metrics.get(entity)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterate in entity-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityMetric)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn rois(&self) -> Vec<f64> {
        self.metrics.values().map(|m| m.roi).collect()
    }

    pub fn volatilities(&self) -> Vec<f64> {
        self.metrics.values().map(|m| m.volatility).collect()
    }

    /// Riskiest entities first.
    pub fn top_by_volatility(&self, n: usize) -> Vec<(String, f64)> {
        self.top_by(n, |m| m.volatility)
    }

    /// Fastest average growth first.
    pub fn top_by_growth(&self, n: usize) -> Vec<(String, f64)> {
        self.top_by(n, |m| m.mean_growth_rate)
    }

    pub fn top_by_roi(&self, n: usize) -> Vec<(String, f64)> {
        self.top_by(n, |m| m.roi)
    }

    /// Descending by `key`; equal values keep entity-id order.
    fn top_by<F>(&self, n: usize, key: F) -> Vec<(String, f64)>
    where
        F: Fn(&EntityMetric) -> f64,
    {
        let mut ranked: Vec<(String, f64)> = self
            .metrics
            .iter()
            .map(|(entity, m)| (entity.clone(), key(m)))
            .collect();

        // BTreeMap order + stable sort gives deterministic ties
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(n);
        ranked
    }
}

/// Compute metrics for every entity in the table.
///
/// Any entity with fewer than two observed prices aborts the whole run,
/// since the selection thresholds are medians over the full universe.
pub fn compute_metrics(table: &PriceTable) -> Result<MetricsTable> {
    let mut metrics = BTreeMap::new();

    for entity in table.entities() {
        let prices = table.observed(entity);
        let metric = EntityMetric::from_prices(entity, &prices)?;
        metrics.insert(entity.clone(), metric);
    }

    info!(entities = metrics.len(), "return/risk metrics computed");

    Ok(MetricsTable { metrics })
}
