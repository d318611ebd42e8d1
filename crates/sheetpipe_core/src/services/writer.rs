//! Spreadsheet export with rust_xlsxwriter.

use crate::error::SheetpipeError;
use crate::models::{CellValue, ExportTarget, TabularResult};

use rust_xlsxwriter::{Format, Workbook, Worksheet};

/// Longest text a single xlsx cell can hold, in characters.
const MAX_CELL_CHARS: usize = 32_767;

/// Writes tabular results to xlsx files.
pub struct SpreadsheetWriter;

impl SpreadsheetWriter {
    /// Write all rows to one sheet, header first, no index column.
    ///
    /// The workbook is assembled in memory and written in a single call,
    /// replacing any existing file at the target path.
    pub fn write(table: &TabularResult, target: &ExportTarget) -> Result<(), SheetpipeError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(target.sheet_name.as_str())?;

        fill_worksheet(worksheet, table)?;

        let buffer = workbook.save_to_buffer()?;
        std::fs::write(target.path(), buffer)
            .map_err(|e| SheetpipeError::export_io(target.path(), e))?;

        tracing::debug!(
            path = %target.path().display(),
            sheet = %target.sheet_name,
            rows = table.row_count(),
            columns = table.column_count(),
            "Workbook written"
        );

        Ok(())
    }

    /// Write the table, logging instead of returning any failure.
    pub fn export(table: &TabularResult, target: &ExportTarget) {
        match Self::write(table, target) {
            Ok(()) => tracing::info!("Data exported to {}", target.path().display()),
            Err(e) => tracing::error!(
                path = %target.path().display(),
                error = %e,
                "Error exporting to spreadsheet: {e}"
            ),
        }
    }
}

fn fill_worksheet(worksheet: &mut Worksheet, table: &TabularResult) -> Result<(), SheetpipeError> {
    let header_format = Format::new().set_bold();

    for (col, name) in table.columns().iter().enumerate() {
        let col = column_number(col)?;
        worksheet.write_string_with_format(0, col, truncate_chars(name), &header_format)?;
    }

    for (index, row) in table.rows().iter().enumerate() {
        let row_number = u32::try_from(index + 1)
            .map_err(|_| SheetpipeError::export_write("Too many rows for one sheet", None))?;

        for (col, cell) in row.iter().enumerate() {
            let col = column_number(col)?;
            match cell {
                CellValue::Null => {}
                CellValue::Bool(b) => {
                    worksheet.write_boolean(row_number, col, *b)?;
                }
                CellValue::Int(i) => {
                    worksheet.write_number(row_number, col, *i as f64)?;
                }
                CellValue::Float(f) if f.is_finite() => {
                    worksheet.write_number(row_number, col, *f)?;
                }
                // NaN and infinities have no cell representation.
                CellValue::Float(_) => {}
                CellValue::String(s) => {
                    let text = truncate_chars(s);
                    if text.len() < s.len() {
                        tracing::warn!(
                            row = index,
                            column = %table.columns()[usize::from(col)],
                            chars = s.chars().count(),
                            "Text truncated to {MAX_CELL_CHARS} characters"
                        );
                    }
                    worksheet.write_string(row_number, col, text)?;
                }
            }
        }
    }

    worksheet.autofit();
    Ok(())
}

fn truncate_chars(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

fn column_number(index: usize) -> Result<u16, SheetpipeError> {
    u16::try_from(index)
        .map_err(|_| SheetpipeError::export_write("Too many columns for one sheet", None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let target = ExportTarget::new(dir.path().join("no_such_dir").join("out.xlsx"));
        let table = TabularResult::from_records(vec![vec![("a", CellValue::Int(1))]]);

        let err = SpreadsheetWriter::write(&table, &target).unwrap_err();
        assert_eq!(err.category(), "Export");
        assert_eq!(err.hint(), Some("Parent directory does not exist"));

        // Fail-soft variant only logs.
        SpreadsheetWriter::export(&table, &target);
        assert!(!target.path().exists());
    }

    #[test]
    fn test_invalid_sheet_name_fails() {
        let dir = tempdir().unwrap();
        let target = ExportTarget::new(dir.path().join("out.xlsx")).with_sheet_name("bad[name]");
        let err = SpreadsheetWriter::write(&TabularResult::empty(), &target).unwrap_err();
        assert!(matches!(err, SheetpipeError::ExportWrite { .. }));
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempdir().unwrap();
        let target = ExportTarget::new(dir.path().join("out.xlsx"));
        let table = TabularResult::from_records(vec![vec![
            ("name", CellValue::from("widget")),
            ("price", CellValue::Float(f64::NAN)),
            ("active", CellValue::Bool(true)),
        ]]);

        SpreadsheetWriter::write(&table, &target).unwrap();
        assert!(target.path().exists());
    }

    #[test]
    fn test_long_text_is_truncated_not_rejected() {
        let dir = tempdir().unwrap();
        let target = ExportTarget::new(dir.path().join("notes.xlsx"));
        let long_note = "é".repeat(40_000);
        let table = TabularResult::from_records(vec![
            vec![("id", CellValue::Int(1)), ("note", CellValue::String(long_note))],
            vec![("id", CellValue::Int(2)), ("note", CellValue::from("short"))],
        ]);

        SpreadsheetWriter::write(&table, &target).unwrap();

        let back = crate::services::SpreadsheetReader::read(target.path()).unwrap();
        assert_eq!(back.row_count(), 2);
        match back.get(0, "note") {
            Some(CellValue::String(note)) => assert_eq!(note.chars().count(), MAX_CELL_CHARS),
            other => panic!("expected text, got {other:?}"),
        }
        assert_eq!(back.get(1, "note"), Some(&CellValue::from("short")));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let text = "ü".repeat(MAX_CELL_CHARS + 5);
        assert_eq!(truncate_chars(&text).chars().count(), MAX_CELL_CHARS);
        assert_eq!(truncate_chars("fits"), "fits");
    }

    #[test]
    fn test_column_number_limit() {
        assert_eq!(column_number(3).unwrap(), 3);
        assert!(column_number(usize::from(u16::MAX) + 1).is_err());
    }
}
