//! Dialect-specific DDL generation.
//!
//! Every supported backend has one generator implementing
//! [`MigrationDialect`]. The trait carries the shared rendering rules as
//! default methods; generators override only what their backend spells
//! differently. Callers pick a generator through the closed [`Dialect`] enum
//! and never branch on dialect names themselves: behavioral differences are
//! exposed as capability flags.

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use mssql::MssqlDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::fmt;
use std::str::FromStr;

use crate::builder::Placeholder;
use crate::migration::{DdlWarning, ForeignKey, Migration, MigrationField};
use crate::value::SqlValue;

/// The closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Microsoft SQL Server.
    Mssql,
    /// MySQL and MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
    /// PostgreSQL.
    Postgres,
}

impl Dialect {
    /// All dialects, in a stable order.
    pub const ALL: [Self; 4] = [Self::Mssql, Self::MySql, Self::Sqlite, Self::Postgres];

    /// Returns the DDL generator for this dialect.
    #[must_use]
    pub fn generator(self) -> &'static dyn MigrationDialect {
        match self {
            Self::Mssql => &MssqlDialect,
            Self::MySql => &MySqlDialect,
            Self::Sqlite => &SqliteDialect,
            Self::Postgres => &PostgresDialect,
        }
    }

    /// Canonical lowercase tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Mssql => "mssql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    /// The backend's default TCP port, if it listens on one.
    #[must_use]
    pub const fn default_port(self) -> Option<u16> {
        match self {
            Self::Mssql => Some(1433),
            Self::MySql => Some(3306),
            Self::Sqlite => None,
            Self::Postgres => Some(5432),
        }
    }

    /// Parameter placeholder syntax.
    #[must_use]
    pub fn placeholder(self) -> Placeholder {
        self.generator().placeholder()
    }

    /// Renders the idempotent `CREATE TABLE` statement for a migration.
    #[must_use]
    pub fn create_table(self, migration: &Migration, schema: Option<&str>) -> String {
        self.generator().create_table(migration, schema)
    }

    /// Renders the standalone foreign key statements for a migration.
    #[must_use]
    pub fn foreign_key_queries(self, migration: &Migration, schema: Option<&str>) -> Vec<String> {
        self.generator().foreign_key_queries(migration, schema)
    }

    /// Returns the warnings generating this migration would produce.
    #[must_use]
    pub fn warnings(self, migration: &Migration) -> Vec<DdlWarning> {
        self.generator().warnings(migration)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A dialect tag that names no supported backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedDialect(pub String);

impl fmt::Display for UnsupportedDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported database backend: '{}'", self.0)
    }
}

impl std::error::Error for UnsupportedDialect {}

impl FromStr for Dialect {
    type Err = UnsupportedDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "pgsql" => Ok(Self::Postgres),
            _ => Err(UnsupportedDialect(s.to_string())),
        }
    }
}

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// READ UNCOMMITTED.
    ReadUncommitted,
    /// READ COMMITTED.
    #[default]
    ReadCommitted,
    /// REPEATABLE READ.
    RepeatableRead,
    /// SERIALIZABLE.
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling of the level.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Trait for dialect-specific migration SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the enum tag of this generator.
    fn dialect(&self) -> Dialect;

    /// Parameter placeholder syntax.
    fn placeholder(&self) -> Placeholder {
        Placeholder::Question
    }

    /// Quotes an identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes a table name, prefixed with its schema when one is given.
    fn qualify(&self, table: &str, schema: Option<&str>) -> String {
        match schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            ),
            None => self.quote_identifier(table),
        }
    }

    /// Whether the default schema must be resolved before any DDL runs.
    fn requires_schema_resolution(&self) -> bool {
        false
    }

    /// Whether foreign keys are emitted inside `CREATE TABLE`.
    fn inlines_foreign_keys(&self) -> bool;

    /// Whether DDL participates in transactions.
    fn transactional_ddl(&self) -> bool {
        true
    }

    /// Token appended to the honored auto-increment column.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Default name of the ledger table.
    fn default_ledger_table(&self) -> &'static str;

    /// Nullability token of a column. The auto-increment column is always
    /// `NOT NULL`.
    fn null_token(&self, field: &MigrationField, auto_increment: bool) -> &'static str {
        if field.nullable && !auto_increment {
            " NULL"
        } else {
            " NOT NULL"
        }
    }

    /// Renders one column definition.
    fn column_definition(&self, field: &MigrationField, auto_increment: bool) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&field.name),
            field.data_type.to_uppercase()
        );
        sql.push_str(self.null_token(field, auto_increment));
        if auto_increment {
            let keyword = self.auto_increment_keyword();
            if !keyword.is_empty() {
                sql.push(' ');
                sql.push_str(keyword);
            }
        }
        sql
    }

    /// Renders all column definitions, honoring only the first
    /// auto-increment field.
    fn column_definitions(&self, migration: &Migration) -> Vec<String> {
        let honored = migration.auto_increment_index();
        migration
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| self.column_definition(field, Some(index) == honored))
            .collect()
    }

    /// Renders the composite primary key constraint, if any field is a key.
    fn primary_key_constraint(&self, migration: &Migration) -> Option<String> {
        let columns = migration.primary_key_columns();
        if columns.is_empty() {
            return None;
        }
        let cols: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        Some(format!("PRIMARY KEY ({})", cols.join(", ")))
    }

    /// Renders a named foreign key constraint clause.
    fn foreign_key_constraint(&self, fk: &ForeignKey, schema: Option<&str>) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(&fk.name),
            self.quote_identifier(&fk.column),
            self.qualify(&fk.reference_table, schema),
            self.quote_identifier(&fk.reference_column)
        )
    }

    /// Renders the lines between the parentheses of `CREATE TABLE`.
    fn table_body(&self, migration: &Migration, schema: Option<&str>) -> Vec<String> {
        let mut body = self.column_definitions(migration);
        if let Some(pk) = self.primary_key_constraint(migration) {
            body.push(pk);
        }
        if self.inlines_foreign_keys() {
            body.extend(
                migration
                    .foreign_keys
                    .iter()
                    .map(|fk| self.foreign_key_constraint(fk, schema)),
            );
        }
        body
    }

    /// Renders the idempotent `CREATE TABLE` statement.
    fn create_table(&self, migration: &Migration, schema: Option<&str>) -> String {
        let body: Vec<String> = self
            .table_body(migration, schema)
            .into_iter()
            .map(|line| format!("    {line}"))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.qualify(&migration.table_name, schema),
            body.join(",\n")
        )
    }

    /// Renders the foreign key statements run after `CREATE TABLE`.
    ///
    /// Empty for dialects that inline their foreign keys.
    fn foreign_key_queries(&self, migration: &Migration, schema: Option<&str>) -> Vec<String> {
        if self.inlines_foreign_keys() {
            return Vec::new();
        }
        migration
            .foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "ALTER TABLE {} ADD {}",
                    self.qualify(&migration.table_name, schema),
                    self.foreign_key_constraint(fk, schema)
                )
            })
            .collect()
    }

    /// Returns the warnings generating this migration would produce.
    fn warnings(&self, migration: &Migration) -> Vec<DdlWarning> {
        migration.warnings()
    }

    /// Renders the idempotent ledger table DDL.
    fn ledger_table_ddl(&self, table: &str, schema: Option<&str>) -> String;

    /// SQL expression for the backend's current timestamp.
    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// Expression selecting `column` as `YYYY-MM-DD HH:MM:SS` text.
    fn applied_at_text(&self, column: &str) -> String;

    /// Query returning the connection's default schema, when required.
    fn default_schema_query(&self) -> Option<&'static str> {
        None
    }

    /// Catalog query counting tables named `table`, with bound parameters.
    fn table_exists_query(&self, table: &str, schema: Option<&str>) -> (String, Vec<SqlValue>);

    /// Statements opening a transaction.
    fn begin_statements(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(level) = isolation {
            statements.push(format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()));
        }
        statements.push(String::from("BEGIN"));
        statements
    }

    /// Statement committing the open transaction.
    fn commit_statement(&self) -> &'static str {
        "COMMIT"
    }

    /// Statement rolling back the open transaction.
    fn rollback_statement(&self) -> &'static str {
        "ROLLBACK"
    }
}
