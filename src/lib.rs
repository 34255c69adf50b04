// Mutual Fund Plan - Core Library
// Exposes the load -> metrics -> selection -> projection pipeline for the CLI and tests

pub mod error;
pub mod loader;
pub mod metrics;
pub mod selection;
pub mod projection;
pub mod config;
pub mod report;
pub mod render;

// Terminal viewer, only with the TUI feature
#[cfg(feature = "tui")]
pub mod ui;

// Re-export commonly used types
pub use error::{PlanError, Result};
pub use loader::{
    PriceTable, MissingSummary, LoadedPrices,
    load_csv, load_from_reader, read_prices, parse_date, forward_fill,
};
pub use metrics::{
    EntityMetric, MetricsTable,
    compute_metrics, sample_std_dev, growth_rates,
};
pub use selection::{
    SelectionCriteria, AllocationPlan, PlanOutcome,
    median, select_entities, inverse_volatility_weights, build_plan, ranked_by_roi,
};
pub use projection::{
    HorizonValue, ProjectionResult, MONTHS_PER_YEAR,
    future_value, blended_annual_return, project,
};
pub use config::PlanConfig;
pub use report::{
    PlanReport, PeerComparison, ComparisonBar, RankedListings, run_pipeline,
};
pub use render::{ReportRenderer, SvgReportRenderer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
