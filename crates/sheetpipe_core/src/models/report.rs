//! Summary report and export target models.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sheet name used when none is given.
pub const DEFAULT_SHEET_NAME: &str = "Data";

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    /// Non-null cells
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation (None with fewer than two values)
    pub std: Option<f64>,
    /// Smallest value
    pub min: f64,
    /// 25th percentile
    #[serde(rename = "25%")]
    pub p25: f64,
    /// Median
    #[serde(rename = "50%")]
    pub p50: f64,
    /// 75th percentile
    #[serde(rename = "75%")]
    pub p75: f64,
    /// Largest value
    pub max: f64,
}

/// Shape, missing-value and numeric statistics of a tabular result.
///
/// The default value is the empty report returned for an empty input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// Number of rows
    pub row_count: usize,
    /// Number of columns
    pub column_count: usize,
    /// Column names in table order
    pub columns: Vec<String>,
    /// Null cells per column, in column order
    pub missing_values: IndexMap<String, usize>,
    /// Statistics for numeric columns only, in column order
    pub numeric_summary: IndexMap<String, NumericSummary>,
}

impl SummaryReport {
    /// Check if nothing was populated.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
            && self.column_count == 0
            && self.columns.is_empty()
            && self.missing_values.is_empty()
            && self.numeric_summary.is_empty()
    }

    /// Missing-value count for a column.
    pub fn missing(&self, column: &str) -> Option<usize> {
        self.missing_values.get(column).copied()
    }

    /// Numeric statistics for a column, if it is numeric.
    pub fn numeric(&self, column: &str) -> Option<&NumericSummary> {
        self.numeric_summary.get(column)
    }
}

/// Destination file and sheet for an export. Existing files are overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    /// Output file path
    pub path: PathBuf,
    /// Worksheet name
    pub sheet_name: String,
}

impl ExportTarget {
    /// Target with the default `Data` sheet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), sheet_name: DEFAULT_SHEET_NAME.to_string() }
    }

    /// Set the sheet name.
    pub fn with_sheet_name(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = sheet_name.into();
        self
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
