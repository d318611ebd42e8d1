//! Pipeline stages.
//!
//! - `connection` - Connection handles built from descriptors, scoped connections
//! - `query` - Query execution into tabular results
//! - `reader` - Spreadsheet reading with calamine
//! - `analyzer` - Summary statistics
//! - `writer` - Spreadsheet export with rust_xlsxwriter

pub mod analyzer;
pub mod connection;
pub mod query;
pub mod reader;
pub mod writer;

pub use analyzer::analyze;
pub use connection::{ConnectionBuilder, ConnectionHandle};
pub use query::QueryService;
pub use reader::SpreadsheetReader;
pub use writer::SpreadsheetWriter;
