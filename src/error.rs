// ⚠️ Error Taxonomy - every failure the pipeline can surface
// One variant per failure class; nothing is retried, the batch just stops.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Error, Debug)]
pub enum PlanError {
    // ========================================================================
    // LOADING
    // ========================================================================
    /// A date label could not be parsed into a calendar date.
    #[error("Malformed date {value:?} at row {row}")]
    MalformedDate { row: usize, value: String },

    /// Rows must arrive in strictly increasing date order.
    #[error("Dates not strictly increasing at row {row}: {current} follows {previous}")]
    UnorderedDates {
        row: usize,
        previous: chrono::NaiveDate,
        current: chrono::NaiveDate,
    },

    /// A price cell held something other than a positive finite number.
    #[error("Invalid price {value:?} for {entity} at row {row}")]
    InvalidPrice {
        row: usize,
        entity: String,
        value: String,
    },

    #[error("Price table has no date column")]
    MissingDateColumn,

    #[error("Price table has no entity columns")]
    NoEntities,

    #[error("Entity {entity} appears more than once in the header")]
    DuplicateEntity { entity: String },

    #[error("Price table has no rows")]
    EmptyTable,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // METRICS / SELECTION
    // ========================================================================
    /// Fewer than two observed prices for an entity.
    #[error("Insufficient data for {entity}: need at least 2 observations, got {observations}")]
    InsufficientData { entity: String, observations: usize },

    /// A selected entity has zero volatility, so its inverse weight is undefined.
    #[error("Division by zero: {entity} has zero volatility")]
    DivisionByZero { entity: String },

    // ========================================================================
    // PROJECTION / CONFIG
    // ========================================================================
    #[error("Invalid horizon {horizon}: horizons must be positive whole years")]
    InvalidHorizon { horizon: u32 },

    #[error("Invalid contribution {amount}: must be a finite, non-negative amount")]
    InvalidContribution { amount: f64 },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl PlanError {
    pub fn malformed_date(row: usize, value: impl Into<String>) -> Self {
        Self::MalformedDate {
            row,
            value: value.into(),
        }
    }

    pub fn insufficient_data(entity: impl Into<String>, observations: usize) -> Self {
        Self::InsufficientData {
            entity: entity.into(),
            observations,
        }
    }

    pub fn division_by_zero(entity: impl Into<String>) -> Self {
        Self::DivisionByZero {
            entity: entity.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = PlanError::malformed_date(3, "31/31/2024");
        assert_eq!(err.to_string(), "Malformed date \"31/31/2024\" at row 3");

        let err = PlanError::insufficient_data("TCS", 1);
        assert!(err.to_string().contains("TCS"));
        assert!(err.to_string().contains("got 1"));

        let err = PlanError::division_by_zero("INFY");
        assert_eq!(err.to_string(), "Division by zero: INFY has zero volatility");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err: PlanError = io.into();
        assert!(matches!(err, PlanError::Io(_)));
    }
}
