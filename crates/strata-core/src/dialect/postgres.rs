//! PostgreSQL dialect for migrations.

use super::{Dialect, IsolationLevel, MigrationDialect};
use crate::builder::{bind, Placeholder, QueryBuilder};
use crate::migration::MigrationField;
use crate::value::SqlValue;

/// PostgreSQL dialect for migration SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Maps an integer type to its SERIAL counterpart.
    fn serial_type(data_type: &str) -> &'static str {
        match data_type.trim().to_ascii_uppercase().as_str() {
            "SMALLINT" | "INT2" | "SMALLSERIAL" => "SMALLSERIAL",
            "BIGINT" | "INT8" | "BIGSERIAL" => "BIGSERIAL",
            _ => "SERIAL",
        }
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn placeholder(&self) -> Placeholder {
        Placeholder::Dollar
    }

    fn inlines_foreign_keys(&self) -> bool {
        true
    }

    fn auto_increment_keyword(&self) -> &'static str {
        // Expressed through SERIAL types instead.
        ""
    }

    fn default_ledger_table(&self) -> &'static str {
        "migrations"
    }

    fn column_definition(&self, field: &MigrationField, auto_increment: bool) -> String {
        let data_type = if auto_increment {
            Self::serial_type(&field.data_type).to_string()
        } else {
            field.data_type.to_uppercase()
        };
        format!(
            "{} {}{}",
            self.quote_identifier(&field.name),
            data_type,
            self.null_token(field, auto_increment)
        )
    }

    fn ledger_table_ddl(&self, table: &str, schema: Option<&str>) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    id SERIAL PRIMARY KEY,\n    name VARCHAR(255) NOT NULL UNIQUE,\n    description TEXT NULL,\n    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\n)",
            self.qualify(table, schema)
        )
    }

    fn current_timestamp(&self) -> &'static str {
        "NOW()"
    }

    fn applied_at_text(&self, column: &str) -> String {
        format!("to_char({column} AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS')")
    }

    fn table_exists_query(&self, table: &str, schema: Option<&str>) -> (String, Vec<SqlValue>) {
        let mut qb = QueryBuilder::with_placeholder(self.placeholder());
        qb.select_one("COUNT(*)").from("information_schema.tables");
        match schema {
            Some(schema) => qb.where_clause("table_schema", "=", bind(schema)),
            None => qb.where_clause("table_schema", "=", "current_schema()"),
        };
        qb.and("table_name", "=", bind(table)).build()
    }

    fn begin_statements(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        match isolation {
            Some(level) => vec![format!("BEGIN ISOLATION LEVEL {}", level.as_sql())],
            None => vec![String::from("BEGIN")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{ForeignKey, Migration};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serial_types() {
        assert_eq!(PostgresDialect::serial_type("smallint"), "SMALLSERIAL");
        assert_eq!(PostgresDialect::serial_type("int"), "SERIAL");
        assert_eq!(PostgresDialect::serial_type("BIGINT"), "BIGSERIAL");
    }

    #[test]
    fn test_create_table_with_inline_foreign_key() {
        let m = Migration::new("orders")
            .field(MigrationField::new("id", "bigint").primary_key().auto_increment())
            .field(MigrationField::new("customer_id", "bigint"))
            .field(MigrationField::new("note", "text").nullable())
            .foreign_key(ForeignKey::new("fk_orders_customers", "customer_id", "customers", "id"));
        assert_eq!(
            PostgresDialect.create_table(&m, Some("shop")),
            "CREATE TABLE IF NOT EXISTS \"shop\".\"orders\" (\n    \
             \"id\" BIGSERIAL NOT NULL,\n    \
             \"customer_id\" BIGINT NOT NULL,\n    \
             \"note\" TEXT NULL,\n    \
             PRIMARY KEY (\"id\"),\n    \
             CONSTRAINT \"fk_orders_customers\" FOREIGN KEY (\"customer_id\") REFERENCES \"shop\".\"customers\" (\"id\")\n\
             )"
        );
    }

    #[test]
    fn test_only_first_auto_increment_becomes_serial() {
        let m = Migration::new("t")
            .field(MigrationField::new("a", "int").auto_increment())
            .field(MigrationField::new("b", "int").auto_increment());
        let sql = PostgresDialect.create_table(&m, None);
        assert!(sql.contains("\"a\" SERIAL NOT NULL"));
        assert!(sql.contains("\"b\" INT NOT NULL"));
        assert_eq!(PostgresDialect.warnings(&m).len(), 1);
    }

    #[test]
    fn test_table_exists_query_uses_dollar_placeholders() {
        let (sql, params) = PostgresDialect.table_exists_query("migrations", Some("public"));
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_begin_with_isolation() {
        assert_eq!(
            PostgresDialect.begin_statements(Some(IsolationLevel::RepeatableRead)),
            vec!["BEGIN ISOLATION LEVEL REPEATABLE READ".to_string()]
        );
    }
}
