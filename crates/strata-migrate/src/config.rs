//! JSON configuration and batch files.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_core::{Dialect, Migration};

use crate::error::{MigrateError, Result};
use crate::options::ConnectionOptions;

/// Settings read from a `--config` file.
///
/// Every field is optional; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Dialect tag, e.g. `postgres`.
    pub dialect: Option<String>,
    /// Connection parameters.
    pub connection: ConnectionOptions,
    /// Ledger table override.
    pub ledger_table: Option<String>,
    /// Run timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl MigrateConfig {
    /// Reads a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Parses the configured dialect.
    pub fn dialect(&self) -> Result<Dialect> {
        let tag = self
            .dialect
            .as_deref()
            .ok_or_else(|| MigrateError::Config("no dialect configured".into()))?;
        Ok(tag.parse()?)
    }

    /// The configured timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Reads a JSON array of migrations.
pub fn load_batch(path: &Path) -> Result<Vec<Migration>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.json");
        std::fs::write(
            &path,
            r#"{
                "dialect": "PostgreSQL",
                "connection": {"server": "localhost", "database": "app", "user": "app"},
                "timeout_secs": 30
            }"#,
        )
        .unwrap();

        let config = MigrateConfig::load(&path).unwrap();
        assert_eq!(config.dialect().unwrap(), Dialect::Postgres);
        assert_eq!(config.connection.server, "localhost");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.ledger_table, None);
    }

    #[test]
    fn test_missing_dialect_is_a_config_error() {
        assert!(matches!(
            MigrateConfig::default().dialect(),
            Err(MigrateError::Config(_))
        ));
    }

    #[test]
    fn test_load_batch_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, "[{\"fields\": []}]").unwrap();
        assert!(matches!(load_batch(&path), Err(MigrateError::Serialization(_))));
    }
}
