//! Raw SQL file migrations.
//!
//! A migrations directory holds one `.sql` file per migration. Files run in
//! file-name order and are logged in the ledger under their file stem, so
//! `0001_create_users.sql` is recorded as `0001_create_users`.

use std::path::Path;

use crate::error::{MigrateError, Result};

/// One SQL file migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlScript {
    /// Ledger name of the script.
    pub name: String,
    /// Statements to run, possibly several.
    pub sql: String,
    /// Stored as the ledger description.
    pub description: String,
}

impl SqlScript {
    /// Creates a script from its name and SQL text.
    #[must_use]
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            description: String::new(),
        }
    }

    /// Reads a script file. Its name is the file stem and its description
    /// the file name.
    pub fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                MigrateError::Config(format!("invalid script file name: {}", path.display()))
            })?;
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(name)
            .to_string();
        let sql = std::fs::read_to_string(path)?;
        Ok(Self {
            name: name.to_string(),
            sql,
            description: file_name,
        })
    }
}

/// Reads every `*.sql` file of `dir`, sorted by file name.
///
/// Subdirectories and other files are ignored.
pub fn load_dir(dir: &Path) -> Result<Vec<SqlScript>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_sql = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));
        if is_sql && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    paths.iter().map(|path| SqlScript::from_file(path)).collect()
}
