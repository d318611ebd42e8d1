//! Data models for sheetpipe.
//!
//! - `connection` - ConnectionDescriptor, DriverKind
//! - `table` - TabularResult, CellValue
//! - `report` - SummaryReport, NumericSummary, ExportTarget

pub mod connection;
pub mod report;
pub mod table;

pub use connection::{ConnectionDescriptor, DriverKind};
pub use report::{ExportTarget, NumericSummary, SummaryReport, DEFAULT_SHEET_NAME};
pub use table::{CellValue, TabularResult};
