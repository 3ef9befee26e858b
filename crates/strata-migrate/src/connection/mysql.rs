//! MySQL backend.

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use strata_core::Dialect;
use tracing::info;

use crate::error::DbResult;
use crate::options::ConnectionOptions;

/// A MySQL server on one connection.
#[derive(Debug)]
pub struct MySqlBackend {
    conn: MySqlConnection,
}

impl MySqlBackend {
    /// Connects over TCP, or over the unix socket at `server` when the
    /// protocol is `unix`.
    pub async fn connect(options: &ConnectionOptions) -> DbResult<Self> {
        info!(
            dsn = %options.redacted_dsn(Dialect::MySql),
            "establishing connection with mysql database"
        );
        Ok(Self {
            conn: MySqlConnection::connect_with(&Self::connect_options(options)).await?,
        })
    }

    fn connect_options(options: &ConnectionOptions) -> MySqlConnectOptions {
        let base = MySqlConnectOptions::new()
            .username(&options.user)
            .password(&options.password)
            .database(&options.database);
        if options.uses_unix_socket() {
            base.socket(&options.server)
        } else {
            base.host(&options.server)
                .port(options.port_for(Dialect::MySql).unwrap_or(3306))
        }
    }

    /// Closes the connection.
    pub async fn close(self) -> DbResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

sqlx_executor!(MySqlBackend, sqlx::MySql, Dialect::MySql);
