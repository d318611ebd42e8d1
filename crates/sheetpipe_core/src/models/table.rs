//! Tabular results shared by the query executor, reader, analyzer and exporter.

use crate::error::SheetpipeError;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Missing / NULL
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text, including rendered dates and times
    String(String),
}

impl CellValue {
    /// Check if the cell is missing.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if the cell holds a number. Booleans are not numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Numeric value as f64, if the cell is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert a JSON scalar. Arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Ordered rows with a uniform set of named columns.
///
/// Every row holds exactly one cell per column. Once built the table is
/// only read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularResult {
    /// Create an empty result with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a result from column names and positional rows.
    ///
    /// Fails if any row width differs from the number of columns.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self, SheetpipeError> {
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len())
        {
            return Err(SheetpipeError::internal(format!(
                "Row {index} has {} cells but there are {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build from records of `(column, value)` pairs.
    ///
    /// Column order is the order of first appearance. A column absent from a
    /// record is `Null` in that row.
    pub fn from_records<I, R, K>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, CellValue)>,
        K: Into<String>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<Vec<CellValue>> = Vec::new();

        for record in records {
            let mut row = vec![CellValue::Null; columns.len()];
            for (key, value) in record {
                let key = key.into();
                let index = match positions.get(&key) {
                    Some(&index) => index,
                    None => {
                        let index = columns.len();
                        positions.insert(key.clone(), index);
                        columns.push(key);
                        row.push(CellValue::Null);
                        index
                    }
                };
                row[index] = value;
            }
            rows.push(row);
        }

        // Rows seen before a later column first appeared are short.
        for row in &mut rows {
            row.resize(columns.len(), CellValue::Null);
        }

        Self { columns, rows }
    }

    /// Build from a JSON array of objects, e.g. `[{"a": 1, "b": 2}]`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, SheetpipeError> {
        let records = value
            .as_array()
            .ok_or_else(|| SheetpipeError::internal("Expected a JSON array of objects"))?;

        let mut objects = Vec::with_capacity(records.len());
        for record in records {
            let object = record
                .as_object()
                .ok_or_else(|| SheetpipeError::internal("Expected every record to be an object"))?;
            objects.push(
                object
                    .iter()
                    .map(|(k, v)| (k.clone(), CellValue::from_json(v)))
                    .collect::<Vec<_>>(),
            );
        }

        Ok(Self::from_records(objects))
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order.
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of one column, top to bottom.
    pub fn column_values<'a>(
        &'a self,
        name: &str,
    ) -> Option<impl Iterator<Item = &'a CellValue> + 'a> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    /// Get one cell by row position and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_records_keeps_first_appearance_order() {
        let table = TabularResult::from_records(vec![
            vec![("date", CellValue::from("2024-01-01")), ("sales", CellValue::Int(100))],
            vec![("sales", CellValue::Int(150)), ("region", CellValue::from("north"))],
        ]);

        assert_eq!(table.columns(), &["date", "sales", "region"]);
        assert_eq!(table.get(0, "region"), Some(&CellValue::Null));
        assert_eq!(table.get(1, "date"), Some(&CellValue::Null));
        assert_eq!(table.get(1, "sales"), Some(&CellValue::Int(150)));
    }

    #[test]
    fn test_from_json_maps_scalars() {
        let table = TabularResult::from_json(&json!([
            {"name": "widget", "price": 2.5, "qty": 3, "active": true, "note": null}
        ]))
        .unwrap();

        assert_eq!(table.columns(), &["name", "price", "qty", "active", "note"]);
        assert_eq!(
            table.rows()[0],
            vec![
                CellValue::from("widget"),
                CellValue::Float(2.5),
                CellValue::Int(3),
                CellValue::Bool(true),
                CellValue::Null,
            ]
        );
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(TabularResult::from_json(&json!({"a": 1})).is_err());
        assert!(TabularResult::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = TabularResult::new(
            vec!["a".into(), "b".into()],
            vec![vec![CellValue::Int(1)]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_empty() {
        let table = TabularResult::empty();
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 0);
        assert!(table.column_values("a").is_none());
    }

    #[test]
    fn test_bool_is_not_numeric() {
        assert!(!CellValue::Bool(true).is_numeric());
        assert_eq!(CellValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(CellValue::from(None::<i64>), CellValue::Null);
    }
}
