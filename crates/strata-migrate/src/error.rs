//! Error types for the migration system.

use std::error::Error as _;
use std::fmt;
use std::time::Duration;

use strata_core::{Dialect, InvalidMigration, UnsupportedDialect};

/// Errors raised by a database driver.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// MySQL, PostgreSQL or SQLite driver error.
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// SQL Server driver error.
    #[error(transparent)]
    Tiberius(#[from] tiberius::error::Error),

    /// Socket or file error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The backend answered with something the caller cannot interpret.
    #[error("{0}")]
    Unexpected(String),
}

/// Result type for driver calls.
pub type DbResult<T> = std::result::Result<T, DbError>;

/// The step of a migration that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlPhase {
    /// Opening the per-migration transaction.
    Begin,
    /// Running `CREATE TABLE`.
    CreateTable,
    /// Adding the named foreign key.
    ForeignKey(String),
    /// Running the statements of a SQL file.
    Script,
    /// Committing the per-migration transaction.
    Commit,
}

impl fmt::Display for DdlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => f.write_str("begin transaction"),
            Self::CreateTable => f.write_str("create table"),
            Self::ForeignKey(name) => write!(f, "foreign key '{name}'"),
            Self::Script => f.write_str("sql script"),
            Self::Commit => f.write_str("commit"),
        }
    }
}

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The backend could not be reached or refused the credentials.
    #[error("failed to connect to {dialect} database")]
    Connection {
        /// Dialect of the failed connection.
        dialect: Dialect,
        /// Driver error.
        #[source]
        source: DbError,
    },

    /// The dialect tag names no supported backend.
    #[error("unsupported database backend '{0}'")]
    UnsupportedBackend(String),

    /// A migration of the batch violates an invariant.
    #[error("invalid migration: {0}")]
    InvalidMigration(#[from] InvalidMigration),

    /// The ledger table could not be created or its schema resolved.
    #[error("error creating/checking migrations table")]
    LedgerSetup(#[source] DbError),

    /// Checking whether a migration was applied failed.
    #[error("error checking whether migration '{migration}' is applied")]
    CatalogQuery {
        /// Migration name.
        migration: String,
        /// Driver error.
        #[source]
        source: DbError,
    },

    /// A DDL statement of a migration failed.
    #[error("error executing migration '{migration}' ({phase})")]
    DdlExecution {
        /// Migration name.
        migration: String,
        /// Failed step.
        phase: DdlPhase,
        /// Driver error.
        #[source]
        source: DbError,
    },

    /// The table was created but the ledger row could not be written.
    #[error("error logging migration '{migration}'")]
    LedgerWrite {
        /// Migration name.
        migration: String,
        /// Driver error.
        #[source]
        source: DbError,
    },

    /// The run exceeded its time budget.
    #[error("migration run timed out after {0:?}")]
    Timeout(Duration),

    /// The run was cancelled by the caller.
    #[error("migration run cancelled")]
    Cancelled,

    /// No connection is registered under the label.
    #[error("no connection registered as '{0}'")]
    UnknownConnection(String),

    /// A statement outside a migration failed.
    #[error("database error")]
    Database(#[from] DbError),

    /// IO error (reading batch or config files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<UnsupportedDialect> for MigrateError {
    fn from(err: UnsupportedDialect) -> Self {
        Self::UnsupportedBackend(err.0)
    }
}

impl MigrateError {
    /// Name of the migration the error is attributed to, if any.
    #[must_use]
    pub fn migration(&self) -> Option<&str> {
        match self {
            Self::CatalogQuery { migration, .. }
            | Self::DdlExecution { migration, .. }
            | Self::LedgerWrite { migration, .. } => Some(migration),
            _ => None,
        }
    }

    /// Formats the error with its whole source chain, one cause per line.
    #[must_use]
    pub fn format_detailed(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
