//! SQL Server dialect for migrations.
//!
//! SQL Server has no `CREATE TABLE IF NOT EXISTS`; every statement is
//! wrapped in an `IF NOT EXISTS (...)` catalog check instead.

use super::{Dialect, IsolationLevel, MigrationDialect};
use crate::builder::{bind, Placeholder, QueryBuilder};
use crate::migration::Migration;
use crate::value::SqlValue;

/// SQL Server dialect for migration SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders an `N'...'` unicode string literal.
    fn literal(value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }

    fn schema_expr(schema: Option<&str>) -> String {
        schema.map_or_else(|| String::from("SCHEMA_NAME()"), Self::literal)
    }

    fn if_table_missing(table: &str, schema: Option<&str>, statement: &str) -> String {
        format!(
            "IF NOT EXISTS (SELECT * FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {})\nBEGIN\n{statement}\nEND",
            Self::schema_expr(schema),
            Self::literal(table)
        )
    }
}

impl MigrationDialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn placeholder(&self) -> Placeholder {
        Placeholder::AtP
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn requires_schema_resolution(&self) -> bool {
        true
    }

    fn inlines_foreign_keys(&self) -> bool {
        false
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "IDENTITY(1,1)"
    }

    fn default_ledger_table(&self) -> &'static str {
        "migrations"
    }

    fn primary_key_constraint(&self, migration: &Migration) -> Option<String> {
        let columns = migration.primary_key_columns();
        if columns.is_empty() {
            return None;
        }
        let cols: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        Some(format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            self.quote_identifier(&format!("PK_{}", migration.table_name)),
            cols.join(", ")
        ))
    }

    fn create_table(&self, migration: &Migration, schema: Option<&str>) -> String {
        let body: Vec<String> = self
            .table_body(migration, schema)
            .into_iter()
            .map(|line| format!("    {line}"))
            .collect();
        let create = format!(
            "CREATE TABLE {} (\n{}\n)",
            self.qualify(&migration.table_name, schema),
            body.join(",\n")
        );
        Self::if_table_missing(&migration.table_name, schema, &create)
    }

    fn foreign_key_queries(&self, migration: &Migration, schema: Option<&str>) -> Vec<String> {
        let table = self.qualify(&migration.table_name, schema);
        migration
            .foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "IF NOT EXISTS (SELECT * FROM sys.foreign_keys WHERE name = {} AND parent_object_id = OBJECT_ID({}))\nALTER TABLE {table} WITH CHECK ADD {}",
                    Self::literal(&fk.name),
                    Self::literal(&table),
                    self.foreign_key_constraint(fk, schema)
                )
            })
            .collect()
    }

    fn ledger_table_ddl(&self, table: &str, schema: Option<&str>) -> String {
        let create = format!(
            "CREATE TABLE {} (\n    id INT IDENTITY(1,1) NOT NULL PRIMARY KEY,\n    name NVARCHAR(255) COLLATE Latin1_General_BIN2 NOT NULL UNIQUE,\n    description NVARCHAR(MAX) NULL,\n    applied_at DATETIME NOT NULL DEFAULT GETDATE()\n)",
            self.qualify(table, schema)
        );
        Self::if_table_missing(table, schema, &create)
    }

    fn current_timestamp(&self) -> &'static str {
        "GETDATE()"
    }

    fn applied_at_text(&self, column: &str) -> String {
        format!("CONVERT(VARCHAR(19), {column}, 120)")
    }

    fn default_schema_query(&self) -> Option<&'static str> {
        Some(
            "SELECT COALESCE((SELECT default_schema_name FROM sys.database_principals WHERE name = CURRENT_USER), SCHEMA_NAME())",
        )
    }

    fn table_exists_query(&self, table: &str, schema: Option<&str>) -> (String, Vec<SqlValue>) {
        let mut qb = QueryBuilder::with_placeholder(self.placeholder());
        qb.select_one("COUNT(*)").from("INFORMATION_SCHEMA.TABLES");
        match schema {
            Some(schema) => qb.where_clause("TABLE_SCHEMA", "=", bind(schema)),
            None => qb.where_clause("TABLE_SCHEMA", "=", "SCHEMA_NAME()"),
        };
        qb.and("TABLE_NAME", "=", bind(table)).build()
    }

    fn begin_statements(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(level) = isolation {
            statements.push(format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()));
        }
        statements.push(String::from("BEGIN TRANSACTION"));
        statements
    }

    fn commit_statement(&self) -> &'static str {
        "COMMIT TRANSACTION"
    }

    fn rollback_statement(&self) -> &'static str {
        "ROLLBACK TRANSACTION"
    }
}
