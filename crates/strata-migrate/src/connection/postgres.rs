//! PostgreSQL backend.

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use strata_core::Dialect;
use tracing::info;

use crate::error::DbResult;
use crate::options::ConnectionOptions;

/// A PostgreSQL server on one connection.
#[derive(Debug)]
pub struct PostgresBackend {
    conn: PgConnection,
}

impl PostgresBackend {
    /// Connects over TCP.
    pub async fn connect(options: &ConnectionOptions) -> DbResult<Self> {
        info!(
            dsn = %options.redacted_dsn(Dialect::Postgres),
            "establishing connection with postgres database"
        );
        let connect_options = PgConnectOptions::new()
            .host(&options.server)
            .port(options.port_for(Dialect::Postgres).unwrap_or(5432))
            .username(&options.user)
            .password(&options.password)
            .database(&options.database);
        Ok(Self {
            conn: PgConnection::connect_with(&connect_options).await?,
        })
    }

    /// Closes the connection.
    pub async fn close(self) -> DbResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

sqlx_executor!(PostgresBackend, sqlx::Postgres, Dialect::Postgres);
