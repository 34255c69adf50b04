// ⚙️ Plan Configuration - contribution, horizons, peer group size
// Defaults mirror the classic setup: 5000/month, 1..50 year horizons.

use crate::error::{PlanError, Result};
use crate::projection::MONTHS_PER_YEAR;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Amount contributed every period.
    pub monthly_investment: f64,
    /// Projection horizons in years, reported in this order.
    pub horizons: Vec<u32>,
    /// Contribution and compounding frequency per year.
    pub periods_per_year: u32,
    /// Size of the top-growth reference set used in comparisons.
    pub peer_group_size: usize,
    /// Length of the ranked listings (riskiest, fastest growing, best ROI).
    pub top_n: usize,
}

impl Default for PlanConfig {
    fn default() -> Self {
        PlanConfig {
            monthly_investment: 5000.0,
            horizons: vec![1, 3, 5, 10, 20, 50],
            periods_per_year: MONTHS_PER_YEAR,
            peer_group_size: 10,
            top_n: 10,
        }
    }
}

impl PlanConfig {
    /// Parse a TOML document; missing keys fall back to defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: PlanConfig =
            toml::from_str(source).map_err(|e| PlanError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Builder: override the monthly contribution.
    pub fn with_monthly_investment(mut self, amount: f64) -> Self {
        self.monthly_investment = amount;
        self
    }

    /// Builder: override the horizons.
    pub fn with_horizons(mut self, horizons: Vec<u32>) -> Self {
        self.horizons = horizons;
        self
    }

    /// Builder: override the peer group size.
    pub fn with_peer_group_size(mut self, size: usize) -> Self {
        self.peer_group_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.monthly_investment.is_finite() || self.monthly_investment < 0.0 {
            return Err(PlanError::InvalidContribution {
                amount: self.monthly_investment,
            });
        }
        if self.periods_per_year == 0 {
            return Err(PlanError::config("periods_per_year must be at least 1"));
        }
        if let Some(&bad) = self.horizons.iter().find(|&&h| h == 0) {
            return Err(PlanError::InvalidHorizon { horizon: bad });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PlanConfig::default();
        assert_eq!(config.monthly_investment, 5000.0);
        assert_eq!(config.horizons, vec![1, 3, 5, 10, 20, 50]);
        assert_eq!(config.periods_per_year, 12);
        assert_eq!(config.peer_group_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PlanConfig::from_toml_str("monthly_investment = 2500.0\nhorizons = [5, 10]\n").unwrap();
        assert_eq!(
            config,
            PlanConfig {
                monthly_investment: 2500.0,
                horizons: vec![5, 10],
                ..PlanConfig::default()
            }
        );
    }

    #[test]
    fn test_invalid_toml_values() {
        assert!(matches!(
            PlanConfig::from_toml_str("horizons = [1, 0]"),
            Err(PlanError::InvalidHorizon { horizon: 0 })
        ));
        assert!(matches!(
            PlanConfig::from_toml_str("monthly_investment = -10.0"),
            Err(PlanError::InvalidContribution { .. })
        ));
        assert!(matches!(
            PlanConfig::from_toml_str("horizons = \"soon\""),
            Err(PlanError::Config { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "peer_group_size = 5").unwrap();
        writeln!(file, "periods_per_year = 4").unwrap();

        let config = PlanConfig::load(file.path()).unwrap();
        assert_eq!(config.peer_group_size, 5);
        assert_eq!(config.periods_per_year, 4);
        assert_eq!(config.monthly_investment, 5000.0);
    }

    #[test]
    fn test_builders() {
        let config = PlanConfig::default()
            .with_monthly_investment(100.0)
            .with_horizons(vec![2])
            .with_peer_group_size(3);
        assert_eq!(config.monthly_investment, 100.0);
        assert_eq!(config.horizons, vec![2]);
        assert_eq!(config.peer_group_size, 3);
    }
}
