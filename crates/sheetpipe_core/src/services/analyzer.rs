//! Descriptive statistics over tabular results.

use crate::models::{CellValue, NumericSummary, SummaryReport, TabularResult};

use indexmap::IndexMap;

/// Compute shape, missing-value counts and numeric statistics.
///
/// Returns the empty report for an empty input. A column gets numeric
/// statistics only if it has at least one number and every non-null cell in
/// it is a number.
pub fn analyze(table: &TabularResult) -> SummaryReport {
    if table.is_empty() {
        return SummaryReport::default();
    }

    let mut missing_values = IndexMap::new();
    let mut numeric_summary = IndexMap::new();

    for (index, name) in table.columns().iter().enumerate() {
        let cells = table.rows().iter().map(|row| &row[index]);

        let missing = cells.clone().filter(|c| c.is_null()).count();
        missing_values.insert(name.clone(), missing);

        if let Some(values) = numeric_values(cells) {
            numeric_summary.insert(name.clone(), describe(values));
        }
    }

    SummaryReport {
        row_count: table.row_count(),
        column_count: table.column_count(),
        columns: table.columns().to_vec(),
        missing_values,
        numeric_summary,
    }
}

/// Non-null values of a column if the column is numeric.
fn numeric_values<'a>(cells: impl Iterator<Item = &'a CellValue>) -> Option<Vec<f64>> {
    let mut values = Vec::new();
    for cell in cells {
        match cell {
            CellValue::Null => {}
            other => values.push(other.as_f64()?),
        }
    }
    (!values.is_empty()).then_some(values)
}

/// Describe a non-empty set of values.
fn describe(mut values: Vec<f64>) -> NumericSummary {
    values.sort_by(f64::total_cmp);

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (sum_sq / (count - 1) as f64).sqrt()
    });

    NumericSummary {
        count,
        mean,
        std,
        min: values[0],
        p25: percentile(&values, 0.25),
        p50: percentile(&values, 0.50),
        p75: percentile(&values, 0.75),
        max: values[count - 1],
    }
}

/// Linear interpolation between the closest ranks of sorted values.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
