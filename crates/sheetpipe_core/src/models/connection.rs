//! Connection descriptor models.

use crate::error::SheetpipeError;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default SQL Server port.
pub const SQL_SERVER_DEFAULT_PORT: u16 = 1433;

/// Default PostgreSQL port.
pub const POSTGRES_DEFAULT_PORT: u16 = 5432;

/// Default application name reported to the server.
pub const DEFAULT_APPLICATION_NAME: &str = "sheetpipe";

/// Database driver to connect with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Microsoft SQL Server over TDS
    SqlServer,
    /// PostgreSQL
    Postgres,
}

impl DriverKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlServer => "sqlserver",
            Self::Postgres => "postgres",
        }
    }

    /// Parse from string representation.
    pub fn parse(s: &str) -> Result<Self, SheetpipeError> {
        match s.trim().to_lowercase().as_str() {
            "sqlserver" | "sql-server" | "mssql" => Ok(Self::SqlServer),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(SheetpipeError::config(format!(
                "Unknown driver '{other}' (expected 'postgres' or 'sqlserver')"
            ))),
        }
    }

    /// Default port for this driver.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::SqlServer => SQL_SERVER_DEFAULT_PORT,
            Self::Postgres => POSTGRES_DEFAULT_PORT,
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters needed to open a database connection.
///
/// Lives for one pipeline run and is never persisted.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Driver to connect with
    pub driver: DriverKind,
    /// Server hostname or IP
    pub host: String,
    /// Server port (None = driver default)
    pub port: Option<u16>,
    /// Database name
    pub database: String,
    /// Login username; None selects integrated authentication on SQL Server
    pub username: Option<String>,
    /// Login password
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Application name sent to the server
    pub application_name: String,
}

impl ConnectionDescriptor {
    /// SQL Server descriptor using integrated (trusted) authentication.
    pub fn sql_server(server: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            driver: DriverKind::SqlServer,
            host: server.into(),
            port: None,
            database: database.into(),
            username: None,
            password: None,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        }
    }

    /// PostgreSQL descriptor with user and password.
    pub fn postgres(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            driver: DriverKind::Postgres,
            host: host.into(),
            port: None,
            database: database.into(),
            username: Some(user.into()),
            password: Some(password.into()),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        }
    }

    /// Switch to username/password authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set an explicit port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.driver.default_port())
    }

    /// Whether SQL Server integrated authentication is in effect.
    pub fn uses_integrated_auth(&self) -> bool {
        self.driver == DriverKind::SqlServer && self.username.is_none()
    }

    /// Validate the descriptor.
    pub fn validate(&self) -> Result<(), SheetpipeError> {
        if self.host.trim().is_empty() {
            return Err(SheetpipeError::connection_build("Host is required"));
        }
        if self.database.trim().is_empty() {
            return Err(SheetpipeError::connection_build("Database name is required"));
        }
        if self.driver == DriverKind::Postgres
            && self.username.as_deref().map_or(true, |u| u.is_empty())
        {
            return Err(SheetpipeError::connection_build(
                "PostgreSQL connections require a user",
            ));
        }
        Ok(())
    }

    /// Driver-specific connection string, including the password.
    ///
    /// SQL Server uses the ADO.NET form; PostgreSQL uses libpq key/value form.
    pub fn connection_string(&self) -> String {
        self.render_connection_string(self.password.as_deref().unwrap_or(""))
    }

    /// Get the display connection string (without password).
    pub fn display_url(&self) -> String {
        match self.driver {
            DriverKind::SqlServer => match &self.username {
                Some(user) => format!(
                    "mssql://{}@{}:{}/{}",
                    user,
                    self.host,
                    self.port(),
                    self.database
                ),
                None => format!("mssql://{}:{}/{}", self.host, self.port(), self.database),
            },
            DriverKind::Postgres => format!(
                "postgresql://{}@{}:{}/{}",
                self.username.as_deref().unwrap_or_default(),
                self.host,
                self.port(),
                self.database
            ),
        }
    }

    fn render_connection_string(&self, password: &str) -> String {
        match self.driver {
            DriverKind::SqlServer => {
                let mut parts = vec![
                    format!("Server=tcp:{},{}", ado_value(&self.host), self.port()),
                    format!("Database={}", ado_value(&self.database)),
                    format!("Application Name={}", ado_value(&self.application_name)),
                ];
                match &self.username {
                    Some(user) => {
                        parts.push(format!("User Id={}", ado_value(user)));
                        parts.push(format!("Password={}", ado_value(password)));
                    }
                    None => parts.push("Integrated Security=true".to_string()),
                }
                parts.push("TrustServerCertificate=true".to_string());
                parts.join(";")
            }
            DriverKind::Postgres => [
                format!("host={}", libpq_value(&self.host)),
                format!("port={}", self.port()),
                format!("dbname={}", libpq_value(&self.database)),
                format!("user={}", libpq_value(self.username.as_deref().unwrap_or_default())),
                format!("password={}", libpq_value(password)),
                format!("application_name={}", libpq_value(&self.application_name)),
            ]
            .join(" "),
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("application_name", &self.application_name)
            .finish()
    }
}

/// Quote a libpq key/value connection string value.
fn libpq_value(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\', '=']) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Escape an ADO.NET connection string value.
///
/// Separators and quotes are wrapped one at a time in `{}`; a closing brace
/// cannot appear inside braces, so it is wrapped in double quotes instead.
fn ado_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '}' => escaped.push_str("\"}\""),
            ';' | '=' | '{' | '"' | '\'' | ' ' | '\t' | '\n' => {
                escaped.push('{');
                escaped.push(c);
                escaped.push('}');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_server_defaults_to_integrated_auth() {
        let descriptor = ConnectionDescriptor::sql_server("db01", "warehouse");
        assert!(descriptor.uses_integrated_auth());
        assert_eq!(descriptor.port(), 1433);
        assert_eq!(
            descriptor.connection_string(),
            "Server=tcp:db01,1433;Database=warehouse;Application Name=sheetpipe;\
             Integrated Security=true;TrustServerCertificate=true"
        );
    }

    #[test]
    fn test_sql_server_with_credentials() {
        let descriptor =
            ConnectionDescriptor::sql_server("db01", "warehouse").with_credentials("etl", "p;w");
        assert!(!descriptor.uses_integrated_auth());
        let conn = descriptor.connection_string();
        assert!(conn.contains("User Id=etl"));
        assert!(conn.contains("Password=p{;}w"));
        assert!(!conn.contains("Integrated Security"));
    }

    #[test]
    fn test_postgres_connection_string_quotes_values() {
        let descriptor = ConnectionDescriptor::postgres("localhost", "mydb", "postgres", "it's");
        assert_eq!(
            descriptor.connection_string(),
            "host=localhost port=5432 dbname=mydb user=postgres password='it\\'s' \
             application_name=sheetpipe"
        );
    }

    #[test]
    fn test_postgres_empty_password_is_quoted() {
        let descriptor = ConnectionDescriptor::postgres("localhost", "mydb", "postgres", "");
        assert!(descriptor.connection_string().contains("password=''"));
    }

    #[test]
    fn test_display_url_omits_password() {
        let descriptor =
            ConnectionDescriptor::postgres("pg.internal", "sales", "analyst", "secret")
                .with_port(6543);
        assert_eq!(descriptor.display_url(), "postgresql://analyst@pg.internal:6543/sales");
        assert!(!format!("{descriptor:?}").contains("secret"));
    }

    #[test]
    fn test_validate_requires_postgres_user() {
        let mut descriptor = ConnectionDescriptor::postgres("localhost", "mydb", "", "");
        assert!(matches!(descriptor.validate(), Err(SheetpipeError::ConnectionBuild { .. })));

        descriptor.username = None;
        assert!(descriptor.validate().is_err());

        let descriptor = ConnectionDescriptor::sql_server("db01", "warehouse");
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_ado_value_escapes_separators() {
        assert_eq!(ado_value("plain"), "plain");
        assert_eq!(ado_value("p;w"), "p{;}w");
        assert_eq!(ado_value("a=b c"), "a{=}b{ }c");
        assert_eq!(ado_value("{x}"), "{{}x\"}\"");
    }

    #[test]
    fn test_driver_kind_parse() {
        assert_eq!(DriverKind::parse("PostgreSQL").unwrap(), DriverKind::Postgres);
        assert_eq!(DriverKind::parse("mssql").unwrap(), DriverKind::SqlServer);
        assert!(DriverKind::parse("oracle").is_err());
    }
}
