//! Connection parameters shared by every backend.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_core::Dialect;

/// Connection parameters.
///
/// For SQLite, `database` is the file path (`:memory:` for an in-memory
/// database) and the network fields are ignored.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Host name or, for MySQL over `unix`, the socket path.
    pub server: String,
    /// TCP port; the dialect's default when absent.
    pub port: Option<u16>,
    /// Database name or SQLite file path.
    pub database: String,
    /// Login name.
    pub user: String,
    /// Login password.
    pub password: String,
    /// MySQL transport (`tcp` or `unix`); TCP when absent.
    pub protocol: Option<String>,
}

impl ConnectionOptions {
    /// Creates options for a server and database.
    #[must_use]
    pub fn new(server: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Creates options for a SQLite file.
    #[must_use]
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            database: path.into(),
            ..Self::default()
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the MySQL transport.
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// The port to connect to, falling back to the dialect's default.
    #[must_use]
    pub fn port_for(&self, dialect: Dialect) -> Option<u16> {
        self.port.or_else(|| dialect.default_port())
    }

    /// Whether MySQL should connect through a unix socket.
    #[must_use]
    pub fn uses_unix_socket(&self) -> bool {
        self.protocol
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("unix"))
    }

    /// Renders the dialect's connection string with the password masked.
    #[must_use]
    pub fn redacted_dsn(&self, dialect: Dialect) -> String {
        let port = self
            .port_for(dialect)
            .map(|p| format!(":{p}"))
            .unwrap_or_default();
        match dialect {
            Dialect::Mssql => format!(
                "server={};user id={};password=***;port={};database={}",
                self.server,
                self.user,
                port.trim_start_matches(':'),
                self.database
            ),
            Dialect::MySql => {
                let protocol = self.protocol.as_deref().filter(|p| !p.is_empty());
                match protocol {
                    Some(p) if p.eq_ignore_ascii_case("unix") => {
                        format!("{}:***@unix({})/{}", self.user, self.server, self.database)
                    }
                    Some(p) => format!(
                        "{}:***@{p}({}{port})/{}",
                        self.user, self.server, self.database
                    ),
                    None => format!("{}:***@{}{port}/{}", self.user, self.server, self.database),
                }
            }
            Dialect::Sqlite => self.database.clone(),
            Dialect::Postgres => format!(
                "postgres://{}:***@{}{port}/{}",
                self.user, self.server, self.database
            ),
        }
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("protocol", &self.protocol)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ConnectionOptions {
        ConnectionOptions::new("db.local", "app").credentials("admin", "s3cret")
    }

    #[test]
    fn test_redacted_dsn_masks_password() {
        for dialect in Dialect::ALL {
            let dsn = opts().redacted_dsn(dialect);
            assert!(!dsn.contains("s3cret"), "{dialect}: {dsn}");
        }
        assert!(!format!("{:?}", opts()).contains("s3cret"));
    }

    #[test]
    fn test_mysql_dsn_shapes() {
        assert_eq!(
            opts().redacted_dsn(Dialect::MySql),
            "admin:***@db.local:3306/app"
        );
        assert_eq!(
            opts().protocol("tcp").port(3307).redacted_dsn(Dialect::MySql),
            "admin:***@tcp(db.local:3307)/app"
        );
        assert_eq!(
            ConnectionOptions::new("/run/mysqld.sock", "app")
                .credentials("root", "x")
                .protocol("unix")
                .redacted_dsn(Dialect::MySql),
            "root:***@unix(/run/mysqld.sock)/app"
        );
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(opts().port_for(Dialect::Mssql), Some(1433));
        assert_eq!(opts().port_for(Dialect::Postgres), Some(5432));
        assert_eq!(opts().port(6000).port_for(Dialect::Postgres), Some(6000));
        assert_eq!(ConnectionOptions::sqlite(":memory:").port_for(Dialect::Sqlite), None);
    }

    #[test]
    fn test_deserialize_partial() {
        let o: ConnectionOptions =
            serde_json::from_str(r#"{"server": "h", "database": "d", "port": 1444}"#).unwrap();
        assert_eq!(o.port, Some(1444));
        assert!(o.user.is_empty());
        assert!(o.protocol.is_none());
    }
}
