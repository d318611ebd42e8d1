//! Spreadsheet reading with calamine.
//!
//! The first row of the sheet is the header. Supports every workbook format
//! calamine detects from the file extension (xlsx, xlsm, xlsb, xls, ods).

use crate::error::SheetpipeError;
use crate::models::{CellValue, TabularResult};

use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use std::collections::HashSet;
use std::path::Path;

/// Largest magnitude at which every integral f64 is exact.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Reads spreadsheet files into tabular results.
pub struct SpreadsheetReader;

impl SpreadsheetReader {
    /// Read the first sheet of a workbook.
    pub fn read(path: impl AsRef<Path>) -> Result<TabularResult, SheetpipeError> {
        Self::read_sheet(path, None)
    }

    /// Read a named sheet, or the first sheet when `sheet` is None.
    pub fn read_sheet(
        path: impl AsRef<Path>,
        sheet: Option<&str>,
    ) -> Result<TabularResult, SheetpipeError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SheetpipeError::file_not_found(path));
        }

        let mut workbook = open_workbook_auto(path).map_err(|e| match e {
            calamine::Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                SheetpipeError::file_not_found(path)
            }
            other => SheetpipeError::from(other),
        })?;

        let range = match sheet {
            Some(name) => workbook.worksheet_range(name)?,
            None => workbook
                .worksheet_range_at(0)
                .ok_or_else(|| SheetpipeError::spreadsheet_parse("Workbook has no sheets"))??,
        };

        let table = range_to_table(&range)?;

        tracing::info!("Successfully loaded {}", path.display());
        tracing::info!("Shape: {} rows, {} columns", table.row_count(), table.column_count());

        Ok(table)
    }

    /// Read the first sheet, logging and returning an empty result on failure.
    ///
    /// A missing file is reported separately from any other read error.
    pub fn read_or_empty(path: impl AsRef<Path>) -> TabularResult {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(table) => table,
            Err(SheetpipeError::FileNotFound { .. }) => {
                tracing::error!(path = %path.display(), "Error: File not found at {}", path.display());
                TabularResult::empty()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Error reading spreadsheet: {e}");
                TabularResult::empty()
            }
        }
    }
}

/// Convert a sheet range into a table using its first row as the header.
fn range_to_table(range: &Range<Data>) -> Result<TabularResult, SheetpipeError> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(TabularResult::empty());
    };

    let columns = header_names(header);
    let mut body: Vec<Vec<CellValue>> = rows.map(|r| r.iter().map(cell_value).collect()).collect();

    for index in 0..columns.len() {
        normalize_integral_column(&mut body, index);
    }

    TabularResult::new(columns, body)
}

/// Header labels: blank cells become `Unnamed: <index>`, repeats get `.N` suffixes.
fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(header.len());

    for (index, cell) in header.iter().enumerate() {
        let base = match cell_value(cell) {
            CellValue::Null => format!("Unnamed: {index}"),
            value => value.to_string(),
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }

    names
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => CellValue::String(s.clone()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| CellValue::String(dt.to_string()))
            .unwrap_or(CellValue::Null),
    }
}

/// Workbooks store numbers as floats; a column whose numbers are all whole
/// is read back as integers.
fn normalize_integral_column(rows: &mut [Vec<CellValue>], index: usize) {
    let mut has_float = false;
    for row in rows.iter() {
        match row[index] {
            CellValue::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => has_float = true,
            CellValue::Float(_) => return,
            _ => {}
        }
    }

    if !has_float {
        return;
    }

    for row in rows.iter_mut() {
        if let CellValue::Float(f) = row[index] {
            row[index] = CellValue::Int(f as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// In-memory sink for formatted log output.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a thread-local subscriber and return what it logged.
    fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        let output = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
        (result, output)
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.xlsx");

        let err = SpreadsheetReader::read(&path).unwrap_err();
        assert!(err.is_file_not_found());

        let (table, logs) = capture_logs(|| SpreadsheetReader::read_or_empty(&path));
        assert!(table.is_empty());
        assert!(logs.contains("File not found at"), "logs: {logs}");
        assert!(!logs.contains("Error reading spreadsheet"), "logs: {logs}");
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.xlsx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();

        let err = SpreadsheetReader::read(&path).unwrap_err();
        assert!(matches!(err, SheetpipeError::SpreadsheetParse { .. }));

        let (table, logs) = capture_logs(|| SpreadsheetReader::read_or_empty(&path));
        assert!(table.is_empty());
        assert!(logs.contains("Error reading spreadsheet"), "logs: {logs}");
        assert!(!logs.contains("File not found"), "logs: {logs}");
    }

    #[test]
    fn test_header_names_fill_blanks_and_dedupe() {
        let header = vec![
            Data::String("id".into()),
            Data::Empty,
            Data::String("id".into()),
            Data::String("id".into()),
            Data::Float(2024.0),
        ];
        assert_eq!(header_names(&header), vec!["id", "Unnamed: 1", "id.1", "id.2", "2024"]);
    }

    #[test]
    fn test_cell_values() {
        assert_eq!(cell_value(&Data::Empty), CellValue::Null);
        assert_eq!(
            cell_value(&Data::Error(calamine::CellErrorType::Div0)),
            CellValue::Null
        );
        assert_eq!(cell_value(&Data::Bool(false)), CellValue::Bool(false));
        assert_eq!(
            cell_value(&Data::DateTimeIso("2024-01-01T00:00:00".into())),
            CellValue::from("2024-01-01T00:00:00")
        );
    }

    #[test]
    fn test_integral_float_columns_become_ints() {
        let mut rows = vec![
            vec![CellValue::Float(1.0), CellValue::Float(1.0)],
            vec![CellValue::Null, CellValue::Float(2.5)],
            vec![CellValue::Float(3.0), CellValue::Float(3.0)],
        ];
        normalize_integral_column(&mut rows, 0);
        normalize_integral_column(&mut rows, 1);

        assert_eq!(rows[0][0], CellValue::Int(1));
        assert_eq!(rows[1][0], CellValue::Null);
        assert_eq!(rows[2][0], CellValue::Int(3));
        assert_eq!(rows[0][1], CellValue::Float(1.0));
        assert_eq!(rows[1][1], CellValue::Float(2.5));
    }
}
