//! MySQL dialect for migrations.

use super::{Dialect, IsolationLevel, MigrationDialect};
use crate::builder::{bind, QueryBuilder};
use crate::value::SqlValue;

/// MySQL dialect for migration SQL generation.
///
/// MySQL commits DDL implicitly, so its statements never run inside a
/// transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn inlines_foreign_keys(&self) -> bool {
        false
    }

    fn transactional_ddl(&self) -> bool {
        false
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn default_ledger_table(&self) -> &'static str {
        "_migrations"
    }

    fn ledger_table_ddl(&self, table: &str, schema: Option<&str>) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    id INT NOT NULL AUTO_INCREMENT PRIMARY KEY,\n    name VARCHAR(255) COLLATE utf8mb4_bin NOT NULL UNIQUE,\n    description TEXT NULL,\n    applied_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            self.qualify(table, schema)
        )
    }

    fn applied_at_text(&self, column: &str) -> String {
        format!("DATE_FORMAT({column}, '%Y-%m-%d %H:%i:%s')")
    }

    fn table_exists_query(&self, table: &str, schema: Option<&str>) -> (String, Vec<SqlValue>) {
        let mut qb = QueryBuilder::with_placeholder(self.placeholder());
        qb.select_one("COUNT(*)").from("information_schema.tables");
        match schema {
            Some(schema) => qb.where_clause("table_schema", "=", bind(schema)),
            None => qb.where_clause("table_schema", "=", "DATABASE()"),
        };
        qb.and("table_name", "=", bind(table)).build()
    }

    fn begin_statements(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(level) = isolation {
            statements.push(format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()));
        }
        statements.push(String::from("START TRANSACTION"));
        statements
    }
}
