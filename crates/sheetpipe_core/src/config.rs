//! Pipeline configuration.
//!
//! Settings are plain structs with named defaults. They are read from an
//! explicit lookup function so callers (and tests) decide where values come
//! from; [`load_dotenv`] plus the `from_env` constructors cover the usual
//! case of the process environment.

use crate::error::SheetpipeError;
use crate::models::{ConnectionDescriptor, DriverKind};

use std::path::PathBuf;

/// Default PostgreSQL host.
pub const DEFAULT_PG_HOST: &str = "localhost";
/// Default PostgreSQL database.
pub const DEFAULT_PG_DATABASE: &str = "mydb";
/// Default PostgreSQL user.
pub const DEFAULT_PG_USER: &str = "postgres";
/// Default PostgreSQL password.
pub const DEFAULT_PG_PASSWORD: &str = "";

/// Default SQL Server host.
pub const DEFAULT_MSSQL_SERVER: &str = "localhost";
/// Default SQL Server database.
pub const DEFAULT_MSSQL_DATABASE: &str = "master";

/// Default output of the export pipeline.
pub const DEFAULT_EXPORT_OUTPUT: &str = "outputs/query_export.xlsx";
/// Default output of the analysis pipeline.
pub const DEFAULT_ANALYZE_OUTPUT: &str = "data/processed/analyzed_data.xlsx";

/// Load a `.env` file from the working directory, if present.
///
/// Runs before logging is set up so the file can supply `SHEETPIPE_LOG`;
/// pass the outcome to [`log_dotenv`] once a subscriber exists.
pub fn load_dotenv() -> Result<Option<PathBuf>, SheetpipeError> {
    match dotenv::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(SheetpipeError::config(format!("Failed to load .env file: {e}"))),
    }
}

/// Log the outcome of [`load_dotenv`].
pub fn log_dotenv(outcome: &Result<Option<PathBuf>, SheetpipeError>) {
    match outcome {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Ok(None) => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!(error = %e, "Continuing without .env settings"),
    }
}

/// Process-environment lookup.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// PostgreSQL settings (`PG_HOST`, `PG_DATABASE`, `PG_USER`, `PG_PASSWORD`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    /// Server host
    pub host: String,
    /// Database name
    pub database: String,
    /// Login user
    pub user: String,
    /// Login password
    pub password: String,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_PG_HOST.to_string(),
            database: DEFAULT_PG_DATABASE.to_string(),
            user: DEFAULT_PG_USER.to_string(),
            password: DEFAULT_PG_PASSWORD.to_string(),
        }
    }
}

impl PostgresSettings {
    /// Read settings through `lookup`, falling back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("PG_HOST").unwrap_or(defaults.host),
            database: lookup("PG_DATABASE").unwrap_or(defaults.database),
            user: lookup("PG_USER").unwrap_or(defaults.user),
            password: lookup("PG_PASSWORD").unwrap_or(defaults.password),
        }
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Connection descriptor for these settings.
    pub fn descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::postgres(&self.host, &self.database, &self.user, &self.password)
    }
}

/// SQL Server settings (`MSSQL_SERVER`, `MSSQL_DATABASE`, `DB_USERNAME`, `DB_PASSWORD`).
///
/// Without `DB_USERNAME` the connection uses integrated authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlServerSettings {
    /// Server name or IP
    pub server: String,
    /// Database name
    pub database: String,
    /// Optional login user
    pub username: Option<String>,
    /// Optional login password
    pub password: Option<String>,
}

impl Default for SqlServerSettings {
    fn default() -> Self {
        Self {
            server: DEFAULT_MSSQL_SERVER.to_string(),
            database: DEFAULT_MSSQL_DATABASE.to_string(),
            username: None,
            password: None,
        }
    }
}

impl SqlServerSettings {
    /// Read settings through `lookup`, falling back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            server: lookup("MSSQL_SERVER").unwrap_or(defaults.server),
            database: lookup("MSSQL_DATABASE").unwrap_or(defaults.database),
            username: non_empty(lookup("DB_USERNAME")),
            password: lookup("DB_PASSWORD"),
        }
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Connection descriptor for these settings.
    pub fn descriptor(&self) -> ConnectionDescriptor {
        let descriptor = ConnectionDescriptor::sql_server(&self.server, &self.database);
        match &self.username {
            Some(user) => {
                descriptor.with_credentials(user, self.password.as_deref().unwrap_or_default())
            }
            None => descriptor,
        }
    }
}

/// Settings for the database export pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Which driver to use (`SHEETPIPE_DRIVER`, default postgres)
    pub driver: DriverKind,
    /// PostgreSQL settings
    pub postgres: PostgresSettings,
    /// SQL Server settings
    pub sql_server: SqlServerSettings,
    /// Query to run (`SHEETPIPE_QUERY`)
    pub query: Option<String>,
    /// Output workbook (`SHEETPIPE_OUTPUT`)
    pub output: PathBuf,
}

impl ExportConfig {
    /// Read settings through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SheetpipeError> {
        let driver = match non_empty(lookup("SHEETPIPE_DRIVER")) {
            Some(name) => DriverKind::parse(&name)?,
            None => DriverKind::Postgres,
        };

        Ok(Self {
            driver,
            postgres: PostgresSettings::from_lookup(&lookup),
            sql_server: SqlServerSettings::from_lookup(&lookup),
            query: non_empty(lookup("SHEETPIPE_QUERY")),
            output: non_empty(lookup("SHEETPIPE_OUTPUT"))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_OUTPUT)),
        })
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, SheetpipeError> {
        Self::from_lookup(env_lookup)
    }

    /// Descriptor for the selected driver.
    pub fn descriptor(&self) -> ConnectionDescriptor {
        match self.driver {
            DriverKind::Postgres => self.postgres.descriptor(),
            DriverKind::SqlServer => self.sql_server.descriptor(),
        }
    }
}

/// Settings for the spreadsheet analysis pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeConfig {
    /// Workbook to read (`SHEETPIPE_INPUT`)
    pub input: Option<PathBuf>,
    /// Output workbook (`SHEETPIPE_OUTPUT`)
    pub output: PathBuf,
}

impl AnalyzeConfig {
    /// Read settings through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            input: non_empty(lookup("SHEETPIPE_INPUT")).map(PathBuf::from),
            output: non_empty(lookup("SHEETPIPE_OUTPUT"))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ANALYZE_OUTPUT)),
        }
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }
}
