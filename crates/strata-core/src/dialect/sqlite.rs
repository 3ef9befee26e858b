//! SQLite dialect for migrations.

use super::{Dialect, IsolationLevel, MigrationDialect};
use crate::builder::{bind, QueryBuilder};
use crate::migration::{DdlWarning, Migration, MigrationField};
use crate::value::SqlValue;

/// SQLite dialect for migration SQL generation.
///
/// SQLite only accepts `AUTOINCREMENT` on an `INTEGER PRIMARY KEY` rowid
/// alias, so the honored auto-increment column is rendered inline as the
/// table's key when it is the only key column.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders a column without the rowid alias form.
    fn plain_column(&self, field: &MigrationField, not_null: bool) -> String {
        format!(
            "{} {}{}",
            self.quote_identifier(&field.name),
            field.data_type.to_uppercase(),
            self.null_token(field, not_null)
        )
    }

    /// Index of the field rendered as `INTEGER PRIMARY KEY AUTOINCREMENT`.
    fn rowid_alias(migration: &Migration) -> Option<usize> {
        let index = migration.auto_increment_index()?;
        let keys = migration.primary_key_columns();
        (keys.len() == 1 && keys[0] == migration.fields[index].name).then_some(index)
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn inlines_foreign_keys(&self) -> bool {
        true
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "PRIMARY KEY AUTOINCREMENT"
    }

    fn default_ledger_table(&self) -> &'static str {
        "_migrations"
    }

    fn column_definition(&self, field: &MigrationField, auto_increment: bool) -> String {
        if auto_increment {
            return format!(
                "{} INTEGER NOT NULL {}",
                self.quote_identifier(&field.name),
                self.auto_increment_keyword()
            );
        }
        self.plain_column(field, false)
    }

    fn column_definitions(&self, migration: &Migration) -> Vec<String> {
        let honored = migration.auto_increment_index();
        let alias = Self::rowid_alias(migration);
        migration
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                if Some(index) == alias {
                    self.column_definition(field, true)
                } else {
                    self.plain_column(field, Some(index) == honored)
                }
            })
            .collect()
    }

    fn primary_key_constraint(&self, migration: &Migration) -> Option<String> {
        if Self::rowid_alias(migration).is_some() {
            return None;
        }
        let columns = migration.primary_key_columns();
        if columns.is_empty() {
            return None;
        }
        let cols: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        Some(format!("PRIMARY KEY ({})", cols.join(", ")))
    }

    fn warnings(&self, migration: &Migration) -> Vec<DdlWarning> {
        let mut warnings = migration.warnings();
        if let Some(index) = migration.auto_increment_index() {
            if Self::rowid_alias(migration).is_none() {
                warnings.push(DdlWarning::AutoIncrementIgnored {
                    table: migration.table_name.clone(),
                    field: migration.fields[index].name.clone(),
                    reason: "sqlite only auto-increments a single-column integer primary key",
                });
            }
        }
        warnings
    }

    fn ledger_table_ddl(&self, table: &str, schema: Option<&str>) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    name TEXT NOT NULL UNIQUE,\n    description TEXT NULL,\n    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP\n)",
            self.qualify(table, schema)
        )
    }

    fn applied_at_text(&self, column: &str) -> String {
        format!("strftime('%Y-%m-%d %H:%M:%S', {column})")
    }

    fn begin_statements(&self, _isolation: Option<IsolationLevel>) -> Vec<String> {
        // SQLite transactions are always serializable.
        vec![String::from("BEGIN")]
    }

    fn table_exists_query(&self, table: &str, schema: Option<&str>) -> (String, Vec<SqlValue>) {
        let catalog = match schema {
            Some(schema) => format!("{}.sqlite_master", self.quote_identifier(schema)),
            None => String::from("sqlite_master"),
        };
        let mut qb = QueryBuilder::with_placeholder(self.placeholder());
        qb.select_one("COUNT(*)")
            .from(&catalog)
            .where_clause("type", "=", "'table'")
            .and("name COLLATE NOCASE", "=", bind(table))
            .build()
    }
}
