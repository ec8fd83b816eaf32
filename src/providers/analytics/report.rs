//! Report queries and the columnar report shape

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive date window for a report. `start_date <= end_date` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDateRange")]
pub struct DateRange {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("start date {start_date} is after end date {end_date}")]
pub struct InvertedDateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDateRange {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = InvertedDateRange;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        Self::new(raw.start_date, raw.end_date).ok_or(InvertedDateRange {
            start_date: raw.start_date,
            end_date: raw.end_date,
        })
    }
}

impl DateRange {
    /// Returns `None` when `start_date` is after `end_date`
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Option<Self> {
        (start_date <= end_date).then_some(Self {
            start_date,
            end_date,
        })
    }

    /// The `days`-long window ending today (UTC)
    pub fn trailing_days(days: u32) -> Self {
        let end_date = Utc::now().date_naive();
        let start_date = end_date - Duration::days(i64::from(days.saturating_sub(1)));
        Self {
            start_date,
            end_date,
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn start(&self) -> String {
        self.start_date.format(DATE_FORMAT).to_string()
    }

    pub fn end(&self) -> String {
        self.end_date.format(DATE_FORMAT).to_string()
    }
}

/// A validated report query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub property_id: String,
    pub date_range: DateRange,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
}

impl ReportQuery {
    /// Request body for the `runReport` endpoint
    pub fn to_request_body(&self) -> Value {
        json!({
            "dateRanges": [{
                "startDate": self.date_range.start(),
                "endDate": self.date_range.end(),
            }],
            "metrics": self.metrics.iter().map(|m| json!({ "name": m })).collect::<Vec<_>>(),
            "dimensions": self.dimensions.iter().map(|d| json!({ "name": d })).collect::<Vec<_>>(),
        })
    }
}

/// Normalize a property id, accepting both `123` and `properties/123`
pub fn normalize_property_id(property_id: &str) -> Option<String> {
    let trimmed = property_id.trim();
    let id = trimmed.strip_prefix("properties/").unwrap_or(trimmed);
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| id.to_string())
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("row {row} has {actual} cells but there are {expected} column headers")]
pub struct RowLengthMismatch {
    pub row: usize,
    pub expected: usize,
    pub actual: usize,
}

/// Tabular report: column headers plus rows of cell values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnarReport {
    pub column_headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ColumnarReport {
    /// Reshape into one record per row, mapping column name to cell value.
    /// Row order and column order are preserved.
    pub fn records(&self) -> Result<Vec<Map<String, Value>>, RowLengthMismatch> {
        let expected = self.column_headers.len();
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                if row.len() != expected {
                    return Err(RowLengthMismatch {
                        row: index,
                        expected,
                        actual: row.len(),
                    });
                }
                Ok(self
                    .column_headers
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|cell| Value::String(cell.clone())))
                    .collect())
            })
            .collect()
    }
}

// --- API Response Types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RunReportResponse {
    #[serde(default)]
    dimension_headers: Vec<ColumnHeader>,
    #[serde(default)]
    metric_headers: Vec<ColumnHeader>,
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
struct ColumnHeader {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    dimension_values: Vec<CellValue>,
    #[serde(default)]
    metric_values: Vec<CellValue>,
}

#[derive(Debug, Deserialize)]
struct CellValue {
    #[serde(default)]
    value: String,
}

impl From<RunReportResponse> for ColumnarReport {
    /// Dimension columns come first, then metric columns, for headers and cells alike
    fn from(response: RunReportResponse) -> Self {
        let column_headers = response
            .dimension_headers
            .into_iter()
            .chain(response.metric_headers)
            .map(|h| h.name)
            .collect();

        let rows = response
            .rows
            .into_iter()
            .map(|row| {
                row.dimension_values
                    .into_iter()
                    .chain(row.metric_values)
                    .map(|c| c.value)
                    .collect()
            })
            .collect();

        Self {
            column_headers,
            rows,
        }
    }
}
