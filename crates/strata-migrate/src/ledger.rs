//! Migration ledger tracking.
//!
//! The ledger is a table in the target database with one row per applied
//! migration. It is created lazily and idempotently on first use.

use chrono::{DateTime, NaiveDateTime, Utc};
use strata_core::{bind, Dialect, Operand, QueryBuilder};
use tracing::{debug, info};

use crate::connection::{Executor, Row};
use crate::error::{DbError, DbResult, MigrateError, Result};

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Unique ID in the ledger table.
    pub id: i64,
    /// Migration name (its table name).
    pub name: String,
    /// Description stored at apply time.
    pub description: Option<String>,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// Where a migration stands relative to the ledger and the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    /// A ledger row exists.
    Logged,
    /// The table exists but no ledger row was written for it.
    Unlogged,
    /// Neither the table nor a ledger row exists.
    Pending,
}

impl LedgerStatus {
    /// Whether the runner should skip the migration.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Logged | Self::Unlogged)
    }
}

/// Manages the ledger table of one backend.
#[derive(Debug, Clone)]
pub struct MigrationLedger {
    dialect: Dialect,
    table: String,
    schema: Option<String>,
}

impl MigrationLedger {
    /// Creates a ledger using the dialect's default table name.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            table: dialect.generator().default_ledger_table().to_string(),
            schema: None,
        }
    }

    /// Overrides the ledger table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Pins the schema instead of resolving it from the connection.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Ledger table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Schema DDL is qualified with, once resolved.
    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Dialect of the ledger.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn qualified_table(&self) -> String {
        self.dialect
            .generator()
            .qualify(&self.table, self.schema.as_deref())
    }

    fn builder(&self) -> QueryBuilder {
        QueryBuilder::for_dialect(self.dialect)
    }

    /// Ensures the ledger table exists, resolving the default schema first
    /// when the dialect requires it.
    pub async fn setup_migration_table(&mut self, db: &mut dyn Executor) -> Result<()> {
        self.setup(db).await.map_err(MigrateError::LedgerSetup)
    }

    async fn setup(&mut self, db: &mut dyn Executor) -> DbResult<()> {
        let generator = self.dialect.generator();
        if self.schema.is_none() && generator.requires_schema_resolution() {
            if let Some(query) = generator.default_schema_query() {
                let schema = db
                    .query_row(query, &[])
                    .await?
                    .and_then(|row| row.get_str(0).map(str::to_string))
                    .ok_or_else(|| DbError::Unexpected("default schema query returned no rows".into()))?;
                debug!(schema = %schema, "Resolved default schema");
                self.schema = Some(schema);
            }
        }

        let ddl = generator.ledger_table_ddl(&self.table, self.schema.as_deref());
        db.exec(&ddl, &[]).await?;
        info!(table = %self.table, "Migration ledger ready");
        Ok(())
    }

    /// Whether a ledger row exists for `name`.
    pub async fn is_migration_applied(&self, db: &mut dyn Executor, name: &str) -> DbResult<bool> {
        let (sql, params) = self
            .builder()
            .select_one("COUNT(*)")
            .from(&self.qualified_table())
            .where_clause("name", "=", bind(name))
            .build();
        let count = count_of(db.query_row(&sql, &params).await?, "ledger count")?;
        Ok(count > 0)
    }

    /// Whether the catalog lists a table named `table`.
    pub async fn table_exists(&self, db: &mut dyn Executor, table: &str) -> DbResult<bool> {
        let (sql, params) = self
            .dialect
            .generator()
            .table_exists_query(table, self.schema.as_deref());
        let count = count_of(db.query_row(&sql, &params).await?, "catalog count")?;
        Ok(count > 0)
    }

    /// Classifies a migration by its ledger row and its table's presence.
    pub async fn status(&self, db: &mut dyn Executor, name: &str) -> DbResult<LedgerStatus> {
        if self.is_migration_applied(db, name).await? {
            return Ok(LedgerStatus::Logged);
        }
        if self.table_exists(db, name).await? {
            return Ok(LedgerStatus::Unlogged);
        }
        Ok(LedgerStatus::Pending)
    }

    /// Appends the ledger row for an applied migration.
    pub async fn log_migration(
        &self,
        db: &mut dyn Executor,
        name: &str,
        description: &str,
    ) -> DbResult<()> {
        let description = if description.is_empty() {
            bind(None::<&str>)
        } else {
            bind(description)
        };
        let (sql, params) = self
            .builder()
            .insert_into(
                &self.qualified_table(),
                &["name", "description", "applied_at"],
                [
                    bind(name),
                    description,
                    Operand::from(self.dialect.generator().current_timestamp()),
                ],
            )
            .build();
        db.exec(&sql, &params).await?;
        Ok(())
    }

    /// Every ledger entry, in apply order.
    pub async fn applied(&self, db: &mut dyn Executor) -> DbResult<Vec<LedgerEntry>> {
        let applied_at = self.dialect.generator().applied_at_text("applied_at");
        let sql = self
            .builder()
            .select_many(&["id", "name", "description", &applied_at])
            .from(&self.qualified_table())
            .order_by(&["id"])
            .get();

        let rows = db.query(&sql, &[]).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row
                .get_i64(0)
                .ok_or_else(|| DbError::Unexpected("ledger id is not an integer".into()))?;
            let name = row
                .get_str(1)
                .ok_or_else(|| DbError::Unexpected("ledger name is not text".into()))?
                .to_string();
            let description = row.get_str(2).map(str::to_string);
            let applied_at = parse_timestamp(row.get_str(3).unwrap_or_default())?;
            entries.push(LedgerEntry {
                id,
                name,
                description,
                applied_at,
            });
        }
        Ok(entries)
    }
}

/// Reads the integer a `COUNT(*)` query returned.
fn count_of(row: Option<Row>, what: &str) -> DbResult<i64> {
    let row = row.ok_or_else(|| DbError::Unexpected(format!("{what} query returned no rows")))?;
    row.get_i64(0)
        .ok_or_else(|| DbError::Unexpected(format!("{what} is not an integer: {:?}", row.get(0))))
}

fn parse_timestamp(text: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc()))
        .map_err(|e| DbError::Unexpected(format!("invalid applied_at '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SqliteBackend;
    use async_trait::async_trait;
    use strata_core::SqlValue;

    /// Answers every query with the same rows.
    struct CannedRows(Vec<Row>);

    #[async_trait]
    impl Executor for CannedRows {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        async fn exec(&mut self, _sql: &str, _args: &[SqlValue]) -> DbResult<u64> {
            Ok(0)
        }

        async fn query(&mut self, _sql: &str, _args: &[SqlValue]) -> DbResult<Vec<Row>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("2024-05-01 10:11:12").unwrap();
        let b = parse_timestamp("2024-05-01T10:11:12Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_default_tables() {
        assert_eq!(MigrationLedger::new(Dialect::Sqlite).table(), "_migrations");
        assert_eq!(MigrationLedger::new(Dialect::Mssql).table(), "migrations");
        assert_eq!(
            MigrationLedger::new(Dialect::Postgres).with_table("history").table(),
            "history"
        );
    }

    #[tokio::test]
    async fn test_setup_is_idempotent() {
        let mut db = SqliteBackend::in_memory().await.unwrap();
        let mut ledger = MigrationLedger::new(Dialect::Sqlite);
        ledger.setup_migration_table(&mut db).await.unwrap();
        ledger.setup_migration_table(&mut db).await.unwrap();
        assert!(ledger.table_exists(&mut db, "_migrations").await.unwrap());
        assert!(ledger.applied(&mut db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_and_list() {
        let mut db = SqliteBackend::in_memory().await.unwrap();
        let mut ledger = MigrationLedger::new(Dialect::Sqlite);
        ledger.setup_migration_table(&mut db).await.unwrap();

        assert!(!ledger.is_migration_applied(&mut db, "users").await.unwrap());
        ledger.log_migration(&mut db, "users", "accounts").await.unwrap();
        ledger.log_migration(&mut db, "posts", "").await.unwrap();
        assert!(ledger.is_migration_applied(&mut db, "users").await.unwrap());

        let entries = ledger.applied(&mut db).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["users", "posts"]);
        assert_eq!(entries[0].description.as_deref(), Some("accounts"));
        assert_eq!(entries[1].description, None);
    }

    #[tokio::test]
    async fn test_duplicate_log_is_rejected() {
        let mut db = SqliteBackend::in_memory().await.unwrap();
        let mut ledger = MigrationLedger::new(Dialect::Sqlite);
        ledger.setup_migration_table(&mut db).await.unwrap();
        ledger.log_migration(&mut db, "users", "").await.unwrap();
        assert!(ledger.log_migration(&mut db, "users", "").await.is_err());
    }

    #[tokio::test]
    async fn test_status_detects_unlogged_table() {
        let mut db = SqliteBackend::in_memory().await.unwrap();
        let mut ledger = MigrationLedger::new(Dialect::Sqlite);
        ledger.setup_migration_table(&mut db).await.unwrap();
        db.exec("CREATE TABLE users (id INTEGER)", &[]).await.unwrap();

        assert_eq!(ledger.status(&mut db, "users").await.unwrap(), LedgerStatus::Unlogged);
        assert_eq!(ledger.status(&mut db, "posts").await.unwrap(), LedgerStatus::Pending);
        ledger.log_migration(&mut db, "users", "").await.unwrap();
        assert_eq!(ledger.status(&mut db, "users").await.unwrap(), LedgerStatus::Logged);
    }

    #[tokio::test]
    async fn test_missing_count_is_an_error() {
        let ledger = MigrationLedger::new(Dialect::Postgres);
        let mut empty = CannedRows(Vec::new());
        assert!(matches!(
            ledger.is_migration_applied(&mut empty, "users").await,
            Err(DbError::Unexpected(_))
        ));

        let mut text = CannedRows(vec![Row::new(
            vec!["count".into()],
            vec![SqlValue::Text("many".into())],
        )]);
        assert!(matches!(
            ledger.table_exists(&mut text, "users").await,
            Err(DbError::Unexpected(_))
        ));
        assert!(ledger.status(&mut text, "users").await.is_err());
    }

    #[tokio::test]
    async fn test_sqlite_table_lookup_ignores_case() {
        let mut db = SqliteBackend::in_memory().await.unwrap();
        let mut ledger = MigrationLedger::new(Dialect::Sqlite);
        ledger.setup_migration_table(&mut db).await.unwrap();
        db.exec("CREATE TABLE users (id INTEGER)", &[]).await.unwrap();
        ledger.log_migration(&mut db, "users", "").await.unwrap();

        assert!(ledger.table_exists(&mut db, "USERS").await.unwrap());
        assert!(!ledger.is_migration_applied(&mut db, "Users").await.unwrap());
        assert_eq!(ledger.status(&mut db, "Users").await.unwrap(), LedgerStatus::Unlogged);
    }
}
