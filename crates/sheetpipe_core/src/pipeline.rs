//! End-to-end pipelines.
//!
//! - Database export: build a connection, run one query, write the rows.
//! - Spreadsheet analysis: read a workbook, summarize it, write it back out.

use crate::error::SheetpipeError;
use crate::models::{ConnectionDescriptor, ExportTarget, SummaryReport};
use crate::services::{analyze, ConnectionBuilder, QueryService, SpreadsheetReader, SpreadsheetWriter};

use std::path::Path;

/// Run `sql` against the described database and export the rows.
///
/// Nothing is written when the query returns no rows. Returns the number of
/// rows exported.
pub async fn export_query(
    descriptor: &ConnectionDescriptor,
    sql: &str,
    target: &ExportTarget,
) -> Result<usize, SheetpipeError> {
    let handle = ConnectionBuilder::build(descriptor)?;
    let table = QueryService::fetch(&handle, sql).await?;
    tracing::info!("Query returned {} rows", table.row_count());

    if table.is_empty() {
        tracing::info!(path = %target.path().display(), "No rows to export");
        return Ok(0);
    }

    SpreadsheetWriter::write(&table, target)?;
    tracing::info!("Data exported to {}", target.path().display());
    Ok(table.row_count())
}

/// Read `input`, summarize it and re-export it to `target`.
///
/// An empty workbook yields the empty report and no output file.
pub fn analyze_file(
    input: impl AsRef<Path>,
    target: &ExportTarget,
) -> Result<SummaryReport, SheetpipeError> {
    let table = SpreadsheetReader::read(input)?;
    let report = analyze(&table);

    if !table.is_empty() {
        SpreadsheetWriter::write(&table, target)?;
        tracing::info!("Data exported to {}", target.path().display());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_export_query_reports_unreachable_server() {
        let dir = tempdir().unwrap();
        let target = ExportTarget::new(dir.path().join("out.xlsx"));
        let descriptor =
            ConnectionDescriptor::postgres("127.0.0.1", "mydb", "postgres", "").with_port(1);

        let err = export_query(&descriptor, "SELECT 1", &target).await.unwrap_err();
        assert_eq!(err.category(), "Connection");
        assert!(!target.path().exists());
    }

    #[tokio::test]
    async fn test_export_query_rejects_invalid_descriptor() {
        let dir = tempdir().unwrap();
        let target = ExportTarget::new(dir.path().join("out.xlsx"));
        let descriptor = ConnectionDescriptor::sql_server("db01", "");

        let err = export_query(&descriptor, "SELECT 1", &target).await.unwrap_err();
        assert!(matches!(err, SheetpipeError::ConnectionBuild { .. }));
    }
}
