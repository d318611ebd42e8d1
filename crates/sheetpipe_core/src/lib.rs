//! Core types and services for sheetpipe.
//!
//! This crate provides two linear pipelines:
//!
//! - **Database export**: connection builder, query executor, spreadsheet exporter
//! - **Spreadsheet analysis**: spreadsheet reader, summary analyzer, spreadsheet exporter
//!
//! Modules:
//!
//! - **error**: Typed errors with hints
//! - **models**: Connection descriptors, tabular results, summary reports
//! - **services**: The pipeline stages
//! - **pipeline**: The stages wired together
//! - **config**: Settings read from the environment
//! - **logging**: Structured logging setup

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod services;

pub use error::SheetpipeError;
pub use models::{
    CellValue, ConnectionDescriptor, DriverKind, ExportTarget, NumericSummary, SummaryReport,
    TabularResult,
};
pub use services::{
    analyze, ConnectionBuilder, ConnectionHandle, QueryService, SpreadsheetReader,
    SpreadsheetWriter,
};
