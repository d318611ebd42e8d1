//! Error types for sheetpipe.
//!
//! Every typed operation returns [`SheetpipeError`]. The fail-soft wrappers in
//! `services` log these errors and hand back empty results instead.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for sheetpipe.
#[derive(Debug, Error)]
pub enum SheetpipeError {
    /// The connection descriptor could not be turned into a driver handle.
    #[error("Connection build error: {message}")]
    ConnectionBuild {
        /// Human-readable error message.
        message: String,
    },

    /// Database connection failed or was lost.
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication failed.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
    },

    /// Query execution error with server-reported details.
    #[error("{message}")]
    Query {
        /// Server error message.
        message: String,
        /// Additional detail from the server.
        detail: Option<String>,
        /// Server hint.
        hint: Option<String>,
        /// Position in query (1-indexed).
        position: Option<usize>,
        /// SQLSTATE or server error number.
        code: Option<String>,
    },

    /// Input spreadsheet does not exist.
    #[error("File not found at {}", path.display())]
    FileNotFound {
        /// Path that was requested.
        path: PathBuf,
    },

    /// Input spreadsheet exists but could not be parsed.
    #[error("Spreadsheet error: {message}")]
    SpreadsheetParse {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Writing the output spreadsheet failed.
    #[error("Export error: {message}")]
    ExportWrite {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl SheetpipeError {
    // ========== Constructors ==========

    /// Create a new connection build error.
    pub fn connection_build(message: impl Into<String>) -> Self {
        Self::ConnectionBuild { message: message.into() }
    }

    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Create a new connection error with source.
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new authentication error.
    pub fn authentication(message: impl Into<String>, hint: &str) -> Self {
        Self::Authentication { message: message.into(), hint: Some(hint.to_string()) }
    }

    /// Create a new query error with full server details.
    pub fn query(
        message: impl Into<String>,
        detail: Option<String>,
        hint: Option<String>,
        position: Option<usize>,
        code: Option<String>,
    ) -> Self {
        Self::Query { message: message.into(), detail, hint, position, code }
    }

    /// Create a file-not-found error.
    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        Self::FileNotFound { path: path.as_ref().to_path_buf() }
    }

    /// Create a new spreadsheet parse error.
    pub fn spreadsheet_parse(message: impl Into<String>) -> Self {
        Self::SpreadsheetParse { message: message.into(), source: None }
    }

    /// Create a new export error.
    pub fn export_write(message: impl Into<String>, hint: Option<&str>) -> Self {
        Self::ExportWrite { message: message.into(), hint: hint.map(String::from), source: None }
    }

    /// Create an export error from an I/O failure, choosing a hint by error kind.
    pub fn export_io(path: &Path, err: std::io::Error) -> Self {
        let hint = match err.kind() {
            std::io::ErrorKind::PermissionDenied => "Check write permissions for the output path",
            std::io::ErrorKind::NotFound => "Parent directory does not exist",
            _ => "Check disk space and permissions",
        };
        Self::ExportWrite {
            message: format!("Failed to write {}: {err}", path.display()),
            hint: Some(hint.to_string()),
            source: Some(Box::new(err)),
        }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    // ========== Methods ==========

    /// Check if this error is a missing input file.
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConnectionBuild { .. } => "Connection",
            Self::Connection { .. } => "Connection",
            Self::Authentication { .. } => "Authentication",
            Self::Query { .. } => "Query",
            Self::FileNotFound { .. } => "File",
            Self::SpreadsheetParse { .. } => "Spreadsheet",
            Self::ExportWrite { .. } => "Export",
            Self::Config { .. } => "Config",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Get actionable hint for the user.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::ConnectionBuild { .. } => Some("Check the connection settings"),
            Self::Connection { .. } => Some("Check that the database server is running"),
            Self::Authentication { hint, .. } => hint.as_deref(),
            Self::Query { hint, .. } => hint.as_deref(),
            Self::FileNotFound { .. } => Some("Check the input file path"),
            Self::SpreadsheetParse { .. } => {
                Some("Make sure the file is a valid xlsx, xls, xlsb or ods workbook")
            }
            Self::ExportWrite { hint, .. } => hint.as_deref(),
            Self::Config { .. } => None,
            Self::Internal { .. } => Some("Please report this issue"),
        }
    }

    /// Get SQLSTATE / server error code (if applicable).
    pub fn sql_code(&self) -> Option<&str> {
        match self {
            Self::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Convert to user-displayable error info.
    pub fn to_error_info(&self) -> ErrorInfo {
        let error_type = format!("{} Error", self.category());
        let message = self.to_string();
        let hint = self.hint().map(String::from);

        let technical_detail = match self {
            Self::Query { detail, code, position, .. } => {
                let mut parts = Vec::new();
                if let Some(code) = code {
                    parts.push(format!("Code: {code}"));
                }
                if let Some(pos) = position {
                    parts.push(format!("Position: {pos}"));
                }
                if let Some(detail) = detail {
                    parts.push(format!("Detail: {detail}"));
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
            _ => None,
        };

        ErrorInfo { error_type, message, hint, technical_detail }
    }
}

/// User-displayable error information.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Category name (e.g., "Connection Error").
    pub error_type: String,
    /// User-friendly message.
    pub message: String,
    /// Actionable suggestion.
    pub hint: Option<String>,
    /// Technical detail such as SQLSTATE and position.
    pub technical_detail: Option<String>,
}

// ========== Error Conversions ==========

/// Convert from tokio_postgres::Error to SheetpipeError.
impl From<tokio_postgres::Error> for SheetpipeError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let message = db_err.message().to_string();
            let detail = db_err.detail().map(String::from);
            let hint = db_err.hint().map(String::from);
            let position = db_err.position().and_then(|p| match p {
                tokio_postgres::error::ErrorPosition::Original(pos) => Some(*pos as usize),
                tokio_postgres::error::ErrorPosition::Internal { .. } => None,
            });
            let code_str = db_err.code().code();

            return match code_str {
                "28P01" => SheetpipeError::authentication(
                    message,
                    "Invalid password - check your credentials",
                ),
                "28000" => SheetpipeError::authentication(
                    message,
                    "Authentication failed - check username and permissions",
                ),
                _ if code_str.starts_with("08") => {
                    SheetpipeError::Connection { message, source: Some(Box::new(err)) }
                }
                _ => SheetpipeError::Query {
                    message,
                    detail,
                    hint,
                    position,
                    code: Some(code_str.to_string()),
                },
            };
        }

        if err.is_closed() {
            return SheetpipeError::Connection {
                message: "Connection closed".to_string(),
                source: Some(Box::new(err)),
            };
        }

        SheetpipeError::Connection { message: err.to_string(), source: Some(Box::new(err)) }
    }
}

/// Convert from deadpool_postgres::PoolError to SheetpipeError.
impl From<deadpool_postgres::PoolError> for SheetpipeError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(pg) => SheetpipeError::from(pg),
            other => SheetpipeError::connection(format!("Failed to acquire connection: {other}")),
        }
    }
}

/// Convert from tiberius::error::Error to SheetpipeError.
impl From<tiberius::error::Error> for SheetpipeError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as MsError;

        match err {
            MsError::Server(token) => {
                let message = token.message().to_string();
                // 18456: login failed for user
                if token.code() == 18456 {
                    return SheetpipeError::authentication(
                        message,
                        "Login failed - check username and password",
                    );
                }
                let procedure = token.procedure();
                SheetpipeError::Query {
                    message,
                    detail: (!procedure.is_empty()).then(|| format!("Procedure: {procedure}")),
                    hint: None,
                    position: None,
                    code: Some(token.code().to_string()),
                }
            }
            MsError::Io { .. } | MsError::Tls(_) | MsError::Routing { .. } => {
                SheetpipeError::Connection { message: err.to_string(), source: Some(Box::new(err)) }
            }
            other => SheetpipeError::query(other.to_string(), None, None, None, None),
        }
    }
}

/// Convert from calamine::Error to SheetpipeError.
impl From<calamine::Error> for SheetpipeError {
    fn from(err: calamine::Error) -> Self {
        SheetpipeError::SpreadsheetParse {
            message: format!("Error reading spreadsheet: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from rust_xlsxwriter::XlsxError to SheetpipeError.
impl From<rust_xlsxwriter::XlsxError> for SheetpipeError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        SheetpipeError::ExportWrite {
            message: format!("Error exporting to spreadsheet: {err}"),
            hint: None,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_message_names_path() {
        let err = SheetpipeError::file_not_found("data/raw/missing.xlsx");
        assert!(err.is_file_not_found());
        assert_eq!(err.to_string(), "File not found at data/raw/missing.xlsx");
        assert_eq!(err.category(), "File");
    }

    #[test]
    fn test_export_io_hint_by_kind() {
        let err = SheetpipeError::export_io(
            Path::new("/nope/out.xlsx"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.hint(), Some("Check write permissions for the output path"));
        assert_eq!(err.category(), "Export");
    }

    #[test]
    fn test_query_error_info_collects_details() {
        let err = SheetpipeError::query(
            "relation \"sales_data\" does not exist",
            None,
            None,
            Some(15),
            Some("42P01".to_string()),
        );
        let info = err.to_error_info();
        assert_eq!(info.error_type, "Query Error");
        assert_eq!(err.sql_code(), Some("42P01"));
        assert_eq!(info.technical_detail.as_deref(), Some("Code: 42P01\nPosition: 15"));
    }

    #[test]
    fn test_authentication_carries_hint() {
        let err = SheetpipeError::authentication("Login failed for user 'sa'", "Check the login");
        assert_eq!(err.category(), "Authentication");
        assert_eq!(err.hint(), Some("Check the login"));
    }

    #[test]
    fn test_categories_are_distinct_for_file_and_parse() {
        let missing = SheetpipeError::file_not_found("a.xlsx");
        let parse = SheetpipeError::spreadsheet_parse("bad zip");
        assert_ne!(missing.category(), parse.category());
        assert!(!parse.is_file_not_found());
    }
}
