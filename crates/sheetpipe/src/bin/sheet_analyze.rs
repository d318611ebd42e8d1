//! Read a workbook, print summary statistics and export a processed copy.
//!
//! `SHEETPIPE_INPUT` names the workbook to read; `SHEETPIPE_OUTPUT` the copy.

use sheetpipe::ensure_parent_dir;
use sheetpipe_core::config::{load_dotenv, log_dotenv, AnalyzeConfig};
use sheetpipe_core::logging::init_logging_default;
use sheetpipe_core::{analyze, ExportTarget, SpreadsheetReader, SpreadsheetWriter};

fn main() {
    let dotenv = load_dotenv();
    let _logging_guard = init_logging_default();
    log_dotenv(&dotenv);

    let config = AnalyzeConfig::from_env();
    let Some(input) = config.input.as_deref() else {
        println!("Spreadsheet analysis");
        println!("Set SHEETPIPE_INPUT to a workbook path (and optionally SHEETPIPE_OUTPUT) to process it");
        return;
    };

    let table = SpreadsheetReader::read_or_empty(input);
    if table.is_empty() {
        return;
    }

    let report = analyze(&table);
    println!("\nData Analysis:");
    match serde_json::to_value(&report) {
        Ok(serde_json::Value::Object(fields)) => {
            for (key, value) in fields {
                println!("{key}: {value}");
            }
        }
        Ok(other) => println!("{other}"),
        Err(e) => tracing::error!(error = %e, "Failed to render report"),
    }

    ensure_parent_dir(&config.output);
    SpreadsheetWriter::export(&table, &ExportTarget::new(&config.output));
}
