//! Run one query against SQL Server or PostgreSQL and export the rows to a workbook.
//!
//! Configured entirely from the environment (a `.env` file is loaded first):
//! `SHEETPIPE_DRIVER`, `SHEETPIPE_QUERY`, `SHEETPIPE_OUTPUT`, `PG_*` for
//! PostgreSQL and `MSSQL_SERVER`, `MSSQL_DATABASE`, `DB_USERNAME`,
//! `DB_PASSWORD` for SQL Server.

use sheetpipe::ensure_parent_dir;
use sheetpipe_core::config::{load_dotenv, log_dotenv, ExportConfig};
use sheetpipe_core::logging::init_logging_default;
use sheetpipe_core::pipeline::export_query;
use sheetpipe_core::ExportTarget;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let dotenv = load_dotenv();
    let _logging_guard = init_logging_default();
    log_dotenv(&dotenv);

    let config = match ExportConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let Some(query) = config.query.as_deref() else {
        print_usage();
        return;
    };

    let descriptor = config.descriptor();
    tracing::info!(driver = %descriptor.driver, target = %descriptor.display_url(), "Starting export");

    ensure_parent_dir(&config.output);
    let target = ExportTarget::new(&config.output);

    if let Err(e) = export_query(&descriptor, query, &target).await {
        let info = e.to_error_info();
        tracing::error!(
            category = %info.error_type,
            hint = info.hint.as_deref().unwrap_or_default(),
            detail = info.technical_detail.as_deref().unwrap_or_default(),
            "Export failed: {}",
            info.message
        );
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Database export");
    println!("1. Create a .env file with your database settings (PG_HOST, PG_DATABASE, PG_USER, PG_PASSWORD");
    println!("   or SHEETPIPE_DRIVER=sqlserver with MSSQL_SERVER, MSSQL_DATABASE and optional DB_USERNAME/DB_PASSWORD)");
    println!("2. Set SHEETPIPE_QUERY to the query to run and optionally SHEETPIPE_OUTPUT");
    println!("3. Run db_export again to write the results to a workbook");
}
