//! Backend dispatch.
//!
//! [`Backend`] is the closed set of live connections, one variant per
//! dialect. [`ConnectionRegistry`] keeps named backends so callers can
//! address several databases by label.

use std::collections::HashMap;

use async_trait::async_trait;
use strata_core::{Dialect, Migration, SqlValue};
use tracing::info;

use crate::connection::{
    Executor, MssqlBackend, MySqlBackend, PostgresBackend, Row, SqliteBackend, TxOptions,
};
use crate::error::{DbResult, MigrateError, Result};
use crate::options::ConnectionOptions;
use crate::runner::{MigrationRunner, RunReport};

/// A live connection to one of the supported backends.
#[derive(Debug)]
pub enum Backend {
    /// SQL Server.
    Mssql(MssqlBackend),
    /// MySQL.
    MySql(MySqlBackend),
    /// SQLite.
    Sqlite(SqliteBackend),
    /// PostgreSQL.
    Postgres(PostgresBackend),
}

impl Backend {
    /// Connects to the backend named by `tag`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedBackend` for an unknown tag before any I/O, and
    /// `Connection` when the backend cannot be reached.
    pub async fn connect(tag: &str, options: &ConnectionOptions) -> Result<Self> {
        let dialect: Dialect = tag.parse()?;
        Self::connect_dialect(dialect, options).await
    }

    /// Connects to the backend of `dialect`.
    pub async fn connect_dialect(dialect: Dialect, options: &ConnectionOptions) -> Result<Self> {
        let connected = match dialect {
            Dialect::Mssql => MssqlBackend::connect(options).await.map(Self::Mssql),
            Dialect::MySql => MySqlBackend::connect(options).await.map(Self::MySql),
            Dialect::Sqlite => SqliteBackend::connect(options).await.map(Self::Sqlite),
            Dialect::Postgres => PostgresBackend::connect(options).await.map(Self::Postgres),
        };
        connected.map_err(|source| MigrateError::Connection { dialect, source })
    }

    fn executor(&mut self) -> &mut dyn Executor {
        match self {
            Self::Mssql(db) => db,
            Self::MySql(db) => db,
            Self::Sqlite(db) => db,
            Self::Postgres(db) => db,
        }
    }

    /// Closes the connection.
    pub async fn close(self) -> DbResult<()> {
        match self {
            Self::Mssql(db) => db.close().await,
            Self::MySql(db) => db.close().await,
            Self::Sqlite(db) => db.close().await,
            Self::Postgres(db) => db.close().await,
        }
    }
}

#[async_trait]
impl Executor for Backend {
    fn dialect(&self) -> Dialect {
        match self {
            Self::Mssql(_) => Dialect::Mssql,
            Self::MySql(_) => Dialect::MySql,
            Self::Sqlite(_) => Dialect::Sqlite,
            Self::Postgres(_) => Dialect::Postgres,
        }
    }

    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<u64> {
        self.executor().exec(sql, args).await
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Vec<Row>> {
        self.executor().query(sql, args).await
    }

    async fn begin_tx(&mut self, options: TxOptions) -> DbResult<()> {
        self.executor().begin_tx(options).await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.executor().commit().await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.executor().rollback().await
    }
}

/// Something that can apply a batch of migrations to itself.
#[async_trait]
pub trait Migrator {
    /// Applies `migrations` in order and logs each one in the ledger.
    async fn create_migrations(&mut self, migrations: Vec<Migration>) -> Result<RunReport>;
}

#[async_trait]
impl<E: Executor> Migrator for E {
    async fn create_migrations(&mut self, migrations: Vec<Migration>) -> Result<RunReport> {
        let mut runner = MigrationRunner::new();
        runner.add_migrations(migrations);
        runner.run(self).await
    }
}

/// Named live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Backend>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects and registers a backend under `label`, replacing (and
    /// closing) any backend already registered under it.
    pub async fn connect(
        &mut self,
        label: impl Into<String>,
        tag: &str,
        options: &ConnectionOptions,
    ) -> Result<()> {
        let label = label.into();
        let backend = Backend::connect(tag, options).await?;
        info!(label = %label, dialect = %backend.dialect(), "Registered connection");
        if let Some(previous) = self.connections.insert(label, backend) {
            previous.close().await?;
        }
        Ok(())
    }

    /// Registers an already connected backend.
    pub fn insert(&mut self, label: impl Into<String>, backend: Backend) -> Option<Backend> {
        self.connections.insert(label.into(), backend)
    }

    /// The backend registered under `label`.
    pub fn get_mut(&mut self, label: &str) -> Result<&mut Backend> {
        self.connections
            .get_mut(label)
            .ok_or_else(|| MigrateError::UnknownConnection(label.to_string()))
    }

    /// Runs a statement on the backend registered under `label`.
    pub async fn exec(&mut self, label: &str, sql: &str, args: &[SqlValue]) -> Result<u64> {
        Ok(self.get_mut(label)?.exec(sql, args).await?)
    }

    /// Runs a query on the backend registered under `label`.
    pub async fn query(&mut self, label: &str, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
        Ok(self.get_mut(label)?.query(sql, args).await?)
    }

    /// Applies a batch on the backend registered under `label`.
    pub async fn create_migrations(
        &mut self,
        label: &str,
        migrations: Vec<Migration>,
    ) -> Result<RunReport> {
        self.get_mut(label)?.create_migrations(migrations).await
    }

    /// Closes and removes the backend registered under `label`.
    pub async fn close(&mut self, label: &str) -> Result<()> {
        let backend = self
            .connections
            .remove(label)
            .ok_or_else(|| MigrateError::UnknownConnection(label.to_string()))?;
        backend.close().await?;
        Ok(())
    }

    /// Registered labels, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.connections.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::MigrationField;

    #[tokio::test]
    async fn test_unsupported_backend_fails_before_io() {
        let err = Backend::connect("oracle", &ConnectionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::UnsupportedBackend(tag) if tag == "oracle"));
    }

    #[tokio::test]
    async fn test_registry_routes_by_label() {
        let mut registry = ConnectionRegistry::new();
        registry
            .connect("main", "sqlite", &ConnectionOptions::sqlite(":memory:"))
            .await
            .unwrap();
        registry
            .connect("audit", "SQLite3", &ConnectionOptions::sqlite(":memory:"))
            .await
            .unwrap();
        assert_eq!(registry.labels(), vec!["audit", "main"]);

        let report = registry
            .create_migrations(
                "main",
                vec![Migration::new("events").field(MigrationField::new("id", "integer"))],
            )
            .await
            .unwrap();
        assert_eq!(report.applied, vec!["events"]);

        let count = |rows: Vec<Row>| rows[0].get_i64(0);
        let main = registry
            .query("main", "SELECT COUNT(*) FROM sqlite_master WHERE name = ?", &[SqlValue::Text("events".into())])
            .await
            .unwrap();
        assert_eq!(count(main), Some(1));
        let audit = registry
            .query("audit", "SELECT COUNT(*) FROM sqlite_master WHERE name = ?", &[SqlValue::Text("events".into())])
            .await
            .unwrap();
        assert_eq!(count(audit), Some(0));

        registry.close("audit").await.unwrap();
        assert!(matches!(
            registry.exec("audit", "SELECT 1", &[]).await,
            Err(MigrateError::UnknownConnection(_))
        ));
    }
}
