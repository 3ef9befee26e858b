//! SQLite backend.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use strata_core::Dialect;
use tracing::info;

use crate::error::DbResult;
use crate::options::ConnectionOptions;

/// A SQLite database file (or in-memory database) on one connection.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: SqliteConnection,
}

impl SqliteBackend {
    /// Opens the database at `options.database`, creating the file if missing.
    pub async fn connect(options: &ConnectionOptions) -> DbResult<Self> {
        let path = options.database.as_str();
        info!(path = %path, "establishing connection with sqlite database");
        let connect_options = if path.is_empty() || path == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };
        let conn = SqliteConnection::connect_with(&connect_options.foreign_keys(true)).await?;
        Ok(Self { conn })
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> DbResult<Self> {
        Self::connect(&ConnectionOptions::sqlite(":memory:")).await
    }

    /// Closes the connection.
    pub async fn close(self) -> DbResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

sqlx_executor!(SqliteBackend, sqlx::Sqlite, Dialect::Sqlite);
