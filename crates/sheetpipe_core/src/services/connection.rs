//! Connection building and scoped connection acquisition.
//!
//! Building a handle never dials the server; reachability and authentication
//! failures surface when a connection is acquired for a query.

use crate::error::SheetpipeError;
use crate::models::{ConnectionDescriptor, DriverKind};

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio::net::TcpStream;
use tokio_postgres::NoTls;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use uuid::Uuid;

/// Builds driver handles from connection descriptors.
pub struct ConnectionBuilder;

impl ConnectionBuilder {
    /// Build an opaque, not-yet-connected handle for the descriptor.
    pub fn build(descriptor: &ConnectionDescriptor) -> Result<ConnectionHandle, SheetpipeError> {
        descriptor.validate()?;

        let handle = match descriptor.driver {
            DriverKind::Postgres => ConnectionHandle::Postgres(Self::build_postgres(descriptor)?),
            DriverKind::SqlServer => {
                ConnectionHandle::SqlServer(Self::build_sql_server(descriptor)?)
            }
        };

        tracing::debug!(
            handle_id = %handle.id(),
            target = %descriptor.display_url(),
            "Connection handle built"
        );

        Ok(handle)
    }

    fn build_postgres(descriptor: &ConnectionDescriptor) -> Result<PostgresHandle, SheetpipeError> {
        let pg_config: tokio_postgres::Config =
            descriptor.connection_string().parse().map_err(|e| {
                SheetpipeError::connection_build(format!("Invalid PostgreSQL settings: {e}"))
            })?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig { recycling_method: RecyclingMethod::Fast },
        );

        // One connection per handle; it is detached and closed after each query.
        let pool = Pool::builder(manager)
            .max_size(1)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| SheetpipeError::connection_build(format!("Failed to create pool: {e}")))?;

        Ok(PostgresHandle { id: Uuid::new_v4(), pool, display_url: descriptor.display_url() })
    }

    fn build_sql_server(
        descriptor: &ConnectionDescriptor,
    ) -> Result<SqlServerHandle, SheetpipeError> {
        let mut config = tiberius::Config::from_ado_string(&descriptor.connection_string())
            .map_err(|e| {
                SheetpipeError::connection_build(format!("Invalid SQL Server settings: {e}"))
            })?;

        if descriptor.uses_integrated_auth() {
            Self::integrated_auth(&mut config);
        }

        Ok(SqlServerHandle { id: Uuid::new_v4(), config, display_url: descriptor.display_url() })
    }

    #[cfg(windows)]
    fn integrated_auth(config: &mut tiberius::Config) {
        config.authentication(tiberius::AuthMethod::Integrated);
    }

    #[cfg(not(windows))]
    fn integrated_auth(_config: &mut tiberius::Config) {
        // Login goes out with an empty SQL login and is rejected by the server.
        tracing::warn!("Integrated authentication is only available on Windows");
    }
}

/// Driver-specific handle produced by [`ConnectionBuilder`].
pub enum ConnectionHandle {
    /// PostgreSQL via deadpool-postgres
    Postgres(PostgresHandle),
    /// SQL Server via tiberius
    SqlServer(SqlServerHandle),
}

impl ConnectionHandle {
    /// Unique identifier used in log events.
    pub fn id(&self) -> Uuid {
        match self {
            Self::Postgres(h) => h.id,
            Self::SqlServer(h) => h.id,
        }
    }

    /// Driver this handle talks to.
    pub fn driver(&self) -> DriverKind {
        match self {
            Self::Postgres(_) => DriverKind::Postgres,
            Self::SqlServer(_) => DriverKind::SqlServer,
        }
    }

    /// Password-free connection URL.
    pub fn display_url(&self) -> &str {
        match self {
            Self::Postgres(h) => &h.display_url,
            Self::SqlServer(h) => &h.display_url,
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id())
            .field("driver", &self.driver())
            .field("url", &self.display_url())
            .finish()
    }
}

/// PostgreSQL handle wrapping a single-connection pool.
pub struct PostgresHandle {
    id: Uuid,
    pool: Pool,
    display_url: String,
}

impl PostgresHandle {
    /// Acquire a scoped connection.
    pub async fn acquire(&self) -> Result<ScopedPgConnection, SheetpipeError> {
        let client = self.pool.get().await.map_err(SheetpipeError::from)?;
        tracing::debug!(handle_id = %self.id, "PostgreSQL connection acquired");
        Ok(ScopedPgConnection { client: Some(client), handle_id: self.id })
    }
}

/// A PostgreSQL connection that is closed when dropped.
pub struct ScopedPgConnection {
    client: Option<deadpool_postgres::Client>,
    handle_id: Uuid,
}

impl ScopedPgConnection {
    /// Prepare and run a statement, returning its column names and rows.
    pub async fn query(
        &self,
        sql: &str,
    ) -> Result<(Vec<String>, Vec<tokio_postgres::Row>), SheetpipeError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| SheetpipeError::connection("Connection already released"))?;

        let statement = client.prepare(sql).await?;
        let columns = statement.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = client.query(&statement, &[]).await?;
        Ok((columns, rows))
    }
}

impl Drop for ScopedPgConnection {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            // Detach from the pool so the underlying connection is closed.
            drop(deadpool_postgres::Object::take(client));
            tracing::debug!(handle_id = %self.handle_id, "PostgreSQL connection released");
        }
    }
}

/// SQL Server handle holding the client configuration.
pub struct SqlServerHandle {
    id: Uuid,
    config: tiberius::Config,
    display_url: String,
}

impl SqlServerHandle {
    /// Open a scoped connection.
    pub async fn acquire(&self) -> Result<ScopedMssqlConnection, SheetpipeError> {
        let tcp = TcpStream::connect(self.config.get_addr()).await.map_err(|e| {
            SheetpipeError::connection_with_source(
                format!("Failed to reach {}", self.display_url),
                e,
            )
        })?;
        tcp.set_nodelay(true).map_err(|e| {
            SheetpipeError::connection_with_source("Failed to configure socket", e)
        })?;

        let client = tiberius::Client::connect(self.config.clone(), tcp.compat_write()).await?;
        tracing::debug!(handle_id = %self.id, "SQL Server connection acquired");

        Ok(ScopedMssqlConnection { client: Some(client), handle_id: self.id })
    }
}

/// A SQL Server connection that is closed when dropped.
pub struct ScopedMssqlConnection {
    client: Option<tiberius::Client<Compat<TcpStream>>>,
    handle_id: Uuid,
}

impl ScopedMssqlConnection {
    /// Run a batch and return the first result set's column names and rows.
    pub async fn query(
        &mut self,
        sql: &str,
    ) -> Result<(Vec<String>, Vec<tiberius::Row>), SheetpipeError> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| SheetpipeError::connection("Connection already released"))?;

        let mut stream = client.simple_query(sql).await?;
        let columns = stream
            .columns()
            .await?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = stream.into_first_result().await?;
        Ok((columns, rows))
    }

    /// Close the connection gracefully.
    pub async fn close(mut self) -> Result<(), SheetpipeError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
            tracing::debug!(handle_id = %self.handle_id, "SQL Server connection closed");
        }
        Ok(())
    }
}

impl Drop for ScopedMssqlConnection {
    fn drop(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!(handle_id = %self.handle_id, "SQL Server connection dropped");
        }
    }
}
