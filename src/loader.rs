// 📂 Time Series Loader - dated closing-price table
// Reads a CSV (date column + one price column per entity), parses dates,
// then forward-fills gaps per entity as a pure transform.

use crate::error::{PlanError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Cell values treated as "no observation".
const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "-"];

/// Date-only layouts accepted for the date column. `%m/%d/%Y` is US order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%d %b %Y"];

/// Timestamp layouts; only the calendar date is kept.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

// ============================================================================
// PRICE TABLE
// ============================================================================

/// Dated closing prices for a fixed set of entities.
///
/// Prices are stored column-major: one series per entity, aligned with
/// `dates`. A `None` cell means no observation on that date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    entities: Vec<String>,
    prices: Vec<Vec<Option<f64>>>,
}

impl PriceTable {
    /// Build a table, checking the shape invariants.
    ///
    /// Dates must be strictly increasing, every entity needs one cell per
    /// date, and entity ids must be unique.
    pub fn new(
        dates: Vec<NaiveDate>,
        entities: Vec<String>,
        prices: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if entities.is_empty() {
            return Err(PlanError::NoEntities);
        }
        if dates.is_empty() {
            return Err(PlanError::EmptyTable);
        }
        if prices.len() != entities.len() {
            return Err(PlanError::config(format!(
                "{} price columns for {} entities",
                prices.len(),
                entities.len()
            )));
        }

        let mut seen = HashSet::new();
        for entity in &entities {
            if !seen.insert(entity.as_str()) {
                return Err(PlanError::DuplicateEntity {
                    entity: entity.clone(),
                });
            }
        }

        for (entity, column) in entities.iter().zip(&prices) {
            if column.len() != dates.len() {
                return Err(PlanError::config(format!(
                    "{} has {} prices for {} dates",
                    entity,
                    column.len(),
                    dates.len()
                )));
            }
        }

        // Row numbers count the header as line 1
        for (i, pair) in dates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(PlanError::UnorderedDates {
                    row: i + 3,
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }

        Ok(PriceTable {
            dates,
            entities,
            prices,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Entity ids in header order.
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    /// Number of dated rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn series(&self, entity: &str) -> Option<&[Option<f64>]> {
        self.entities
            .iter()
            .position(|e| e == entity)
            .map(|idx| self.prices[idx].as_slice())
    }

    /// Iterate `(entity, series)` pairs in header order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.entities
            .iter()
            .map(String::as_str)
            .zip(self.prices.iter().map(Vec::as_slice))
    }

    /// Observed prices of one entity, skipping missing cells.
    pub fn observed(&self, entity: &str) -> Vec<f64> {
        self.series(entity)
            .map(|s| s.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.dates.first()?, *self.dates.last()?))
    }

    /// Count missing cells per entity.
    pub fn missing_summary(&self) -> MissingSummary {
        let per_entity = self
            .columns()
            .map(|(entity, series)| {
                let missing = series.iter().filter(|v| v.is_none()).count();
                (entity.to_string(), missing)
            })
            .collect();

        MissingSummary { per_entity }
    }

    /// Entities whose series starts with missing cells, with the gap length.
    pub fn leading_gaps(&self) -> Vec<(String, usize)> {
        self.columns()
            .filter_map(|(entity, series)| {
                let gap = series.iter().take_while(|v| v.is_none()).count();
                (gap > 0).then(|| (entity.to_string(), gap))
            })
            .collect()
    }
}

// ============================================================================
// MISSING VALUE SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSummary {
    /// `(entity, missing cell count)` in header order.
    pub per_entity: Vec<(String, usize)>,
}

impl MissingSummary {
    pub fn total(&self) -> usize {
        self.per_entity.iter().map(|(_, n)| n).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn summary(&self) -> String {
        let affected = self.per_entity.iter().filter(|(_, n)| *n > 0).count();
        format!(
            "{} missing cells across {} of {} entities",
            self.total(),
            affected,
            self.per_entity.len()
        )
    }
}

/// Output of a load: the filled table plus what the raw file looked like.
#[derive(Debug, Clone)]
pub struct LoadedPrices {
    pub table: PriceTable,
    /// Missing cells before forward fill.
    pub missing_before_fill: MissingSummary,
    /// Entities still missing leading cells after the fill.
    pub leading_gaps: Vec<(String, usize)>,
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse a date label into a calendar date.
///
/// Accepts ISO dates, a few common slash/month-name layouts, timestamps
/// (time part dropped) and RFC 3339 with offsets.
///
/// Slash dates are month-first: `01/02/2024` is 2 January. Day-first
/// exports should be converted to ISO or month-name dates before loading.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z"))
        .map(|dt| dt.date_naive())
        .ok()
}

fn parse_price(row: usize, entity: &str, raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if MISSING_TOKENS.contains(&raw) {
        return Ok(None);
    }

    let cleaned = raw.replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(Some(v)),
        _ => Err(PlanError::InvalidPrice {
            row,
            entity: entity.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Read a raw (unfilled) price table from any CSV source.
pub fn read_prices<R: Read>(reader: R) -> Result<PriceTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(PlanError::MissingDateColumn);
    }

    let entities: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    if entities.is_empty() {
        return Err(PlanError::NoEntities);
    }

    let mut dates = Vec::new();
    let mut prices: Vec<Vec<Option<f64>>> = vec![Vec::new(); entities.len()];

    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        // Line in the file, header is line 1
        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        let label = record.get(0).unwrap_or_default();
        let date = parse_date(label).ok_or_else(|| PlanError::malformed_date(row, label))?;
        dates.push(date);

        for (col, entity) in entities.iter().enumerate() {
            let raw = record.get(col + 1).unwrap_or_default();
            prices[col].push(parse_price(row, entity, raw)?);
        }
    }

    PriceTable::new(dates, entities, prices)
}

// ============================================================================
// FORWARD FILL
// ============================================================================

/// Propagate the last observed price forward, per entity.
///
/// Leading gaps have nothing to propagate and stay `None`. Returns a new
/// table; the input is untouched. Filling an already filled table is a no-op.
pub fn forward_fill(table: &PriceTable) -> PriceTable {
    let prices = table
        .prices
        .iter()
        .map(|series| {
            let mut last = None;
            series
                .iter()
                .map(|cell| {
                    if cell.is_some() {
                        last = *cell;
                    }
                    last
                })
                .collect()
        })
        .collect();

    PriceTable {
        dates: table.dates.clone(),
        entities: table.entities.clone(),
        prices,
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Read, summarise and forward-fill a CSV source.
pub fn load_from_reader<R: Read>(reader: R) -> Result<LoadedPrices> {
    let raw = read_prices(reader)?;
    let missing_before_fill = raw.missing_summary();
    let table = forward_fill(&raw);
    let leading_gaps = table.leading_gaps();

    for (entity, gap) in &leading_gaps {
        warn!(
            entity = %entity,
            rows = gap,
            "leading prices missing; excluded from statistics"
        );
    }

    info!(
        rows = table.len(),
        entities = table.entities().len(),
        missing = missing_before_fill.total(),
        "price table loaded"
    );

    Ok(LoadedPrices {
        table,
        missing_before_fill,
        leading_gaps,
    })
}

/// Load a price CSV from disk.
pub fn load_csv(csv_path: &Path) -> Result<LoadedPrices> {
    let file = File::open(csv_path)?;
    load_from_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-08-20"), Some(date(2024, 8, 20)));
        assert_eq!(parse_date("2024/08/20"), Some(date(2024, 8, 20)));
        assert_eq!(parse_date("08/20/2024"), Some(date(2024, 8, 20)));
        assert_eq!(parse_date("20-Aug-2024"), Some(date(2024, 8, 20)));
        assert_eq!(parse_date("2024-08-20 00:00:00"), Some(date(2024, 8, 20)));
        assert_eq!(parse_date("2024-08-20T15:30:00+05:30"), Some(date(2024, 8, 20)));
        assert_eq!(parse_date("  2024-08-20  "), Some(date(2024, 8, 20)));
    }

    #[test]
    fn test_slash_dates_are_month_first() {
        assert_eq!(parse_date("01/02/2024"), Some(date(2024, 1, 2)));
        // No 13th month, and no day-first fallback
        assert_eq!(parse_date("13/02/2024"), None);
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-13-45"), None);
    }

    #[test]
    fn test_read_prices_with_gaps() {
        let csv = "Date,A,B\n2024-01-01,100,\n2024-01-02,,50\n2024-01-03,102,51\n";
        let table = read_prices(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.entities(), &["A".to_string(), "B".to_string()]);
        assert_eq!(table.series("A").unwrap(), &[Some(100.0), None, Some(102.0)]);
        assert_eq!(table.series("B").unwrap(), &[None, Some(50.0), Some(51.0)]);
        assert_eq!(table.missing_summary().total(), 2);
    }

    #[test]
    fn test_malformed_date_aborts() {
        let csv = "Date,A\n2024-01-01,100\nnot-a-date,101\n";
        let err = read_prices(csv.as_bytes()).unwrap_err();

        match err {
            PlanError::MalformedDate { row, value } => {
                assert_eq!(row, 3);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unordered_dates_rejected() {
        let csv = "Date,A\n2024-01-02,100\n2024-01-01,101\n";
        let err = read_prices(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PlanError::UnorderedDates { row: 3, .. }));
    }

    #[test]
    fn test_invalid_price_rejected() {
        let csv = "Date,A\n2024-01-01,abc\n";
        let err = read_prices(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidPrice { ref entity, .. } if entity == "A"));

        let csv = "Date,A\n2024-01-01,-5\n";
        assert!(read_prices(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_header_without_entities() {
        let csv = "Date\n2024-01-01\n";
        assert!(matches!(read_prices(csv.as_bytes()), Err(PlanError::NoEntities)));
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let csv = "Date,A,B\n";
        assert!(matches!(read_prices(csv.as_bytes()), Err(PlanError::EmptyTable)));
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let csv = "Date,A,A\n2024-01-01,1,2\n";
        assert!(matches!(
            read_prices(csv.as_bytes()),
            Err(PlanError::DuplicateEntity { .. })
        ));
    }

    #[test]
    fn test_forward_fill_propagates_last_value() {
        let csv = "Date,A,B\n2024-01-01,100,\n2024-01-02,,50\n2024-01-03,,\n2024-01-04,103,52\n";
        let raw = read_prices(csv.as_bytes()).unwrap();
        let filled = forward_fill(&raw);

        assert_eq!(
            filled.series("A").unwrap(),
            &[Some(100.0), Some(100.0), Some(100.0), Some(103.0)]
        );
        // Leading gap has nothing to propagate
        assert_eq!(filled.series("B").unwrap(), &[None, Some(50.0), Some(50.0), Some(52.0)]);

        // Input untouched
        assert_eq!(raw.series("A").unwrap()[1], None);
    }

    #[test]
    fn test_forward_fill_idempotent() {
        let csv = "Date,A,B\n2024-01-01,,1\n2024-01-02,5,\n2024-01-03,,\n2024-01-04,6,3\n";
        let raw = read_prices(csv.as_bytes()).unwrap();
        let once = forward_fill(&raw);
        let twice = forward_fill(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_load_reports_missing_and_leading_gaps() {
        let csv = "Date,A,B\n2024-01-01,100,\n2024-01-02,,50\n2024-01-03,102,51\n";
        let loaded = load_from_reader(csv.as_bytes()).unwrap();

        assert_eq!(loaded.missing_before_fill.total(), 2);
        assert_eq!(loaded.table.missing_summary().total(), 1);
        assert_eq!(loaded.leading_gaps, vec![("B".to_string(), 1)]);
        assert_eq!(loaded.table.observed("B"), vec![50.0, 51.0]);
    }

    #[test]
    fn test_load_csv_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,RELIANCE,TCS").unwrap();
        writeln!(file, "2024-08-20,\"2,991.90\",4487.85").unwrap();
        writeln!(file, "2024-08-21,2997.35,4524.90").unwrap();

        let loaded = load_csv(file.path()).unwrap();
        assert_eq!(loaded.table.observed("RELIANCE"), vec![2991.90, 2997.35]);
        assert!(loaded.missing_before_fill.is_clean());
        assert_eq!(
            loaded.table.date_range(),
            Some((date(2024, 8, 20), date(2024, 8, 21)))
        );
    }

    #[test]
    fn test_load_csv_missing_file() {
        let err = load_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, PlanError::Io(_)));
    }
}
