//! Live backend connections.
//!
//! Each backend owns one long-lived connection and exposes it through the
//! driver-neutral [`Executor`] trait: statements go in as SQL text plus bound
//! [`SqlValue`]s, rows come back as [`Row`]s.

use async_trait::async_trait;
use strata_core::{Dialect, IsolationLevel, SqlValue};

use crate::error::DbResult;

/// Binds `SqlValue` arguments onto a `sqlx` query.
macro_rules! bind_args {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args {
            query = match arg {
                strata_core::SqlValue::Null => query.bind(None::<String>),
                strata_core::SqlValue::Bool(b) => query.bind(*b),
                strata_core::SqlValue::Int(n) => query.bind(*n),
                strata_core::SqlValue::Float(f) => query.bind(*f),
                strata_core::SqlValue::Text(s) => query.bind(s.clone()),
                strata_core::SqlValue::Blob(b) => query.bind(b.clone()),
            };
        }
        query
    }};
}

/// Decodes a `sqlx` row into a [`Row`], trying the common column types in turn.
macro_rules! decode_row {
    ($row:expr) => {{
        use sqlx::{Column as _, Row as _, ValueRef as _};
        let row = $row;
        let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
        let mut values = Vec::with_capacity(columns.len());
        for (index, name) in columns.iter().enumerate() {
            let value = if row.try_get_raw(index)?.is_null() {
                strata_core::SqlValue::Null
            } else if let Ok(v) = row.try_get::<i64, _>(index) {
                strata_core::SqlValue::Int(v)
            } else if let Ok(v) = row.try_get::<i32, _>(index) {
                strata_core::SqlValue::Int(i64::from(v))
            } else if let Ok(v) = row.try_get::<i16, _>(index) {
                strata_core::SqlValue::Int(i64::from(v))
            } else if let Ok(v) = row.try_get::<bool, _>(index) {
                strata_core::SqlValue::Bool(v)
            } else if let Ok(v) = row.try_get::<f64, _>(index) {
                strata_core::SqlValue::Float(v)
            } else if let Ok(v) = row.try_get::<String, _>(index) {
                strata_core::SqlValue::Text(v)
            } else if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
                strata_core::SqlValue::Blob(v)
            } else {
                return Err($crate::error::DbError::Unexpected(format!(
                    "column '{name}' has an unsupported type"
                )));
            };
            values.push(value);
        }
        $crate::connection::Row::new(columns, values)
    }};
}

/// Implements [`Executor`] for a backend wrapping a `sqlx` connection in
/// its `conn` field.
macro_rules! sqlx_executor {
    ($backend:ty, $db:ty, $dialect:expr) => {
        #[async_trait::async_trait]
        impl $crate::connection::Executor for $backend {
            fn dialect(&self) -> strata_core::Dialect {
                $dialect
            }

            async fn exec(
                &mut self,
                sql: &str,
                args: &[strata_core::SqlValue],
            ) -> $crate::error::DbResult<u64> {
                tracing::debug!(sql = %sql, params = args.len(), "Executing SQL");
                let done = if args.is_empty() {
                    sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql)).await?
                } else {
                    bind_args!(sqlx::query::<$db>(sql), args)
                        .execute(&mut self.conn)
                        .await?
                };
                Ok(done.rows_affected())
            }

            async fn query(
                &mut self,
                sql: &str,
                args: &[strata_core::SqlValue],
            ) -> $crate::error::DbResult<Vec<$crate::connection::Row>> {
                tracing::debug!(sql = %sql, params = args.len(), "Querying");
                let rows = bind_args!(sqlx::query::<$db>(sql), args)
                    .fetch_all(&mut self.conn)
                    .await?;
                let mut out = Vec::with_capacity(rows.len());
                for row in &rows {
                    out.push(decode_row!(row));
                }
                Ok(out)
            }
        }
    };
}

pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mssql::MssqlBackend;
pub use mysql::MySqlBackend;
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

/// A result row with driver-neutral values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row from column names and values of equal length.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Column names in select order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in select order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Value of the column named `name`, compared case-insensitively.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&SqlValue> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))?;
        self.values.get(index)
    }

    /// Integer at `index`.
    #[must_use]
    pub fn get_i64(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(SqlValue::as_i64)
    }

    /// Text at `index`.
    #[must_use]
    pub fn get_str(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(SqlValue::as_str)
    }
}

/// Options for [`Executor::begin_tx`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Isolation level; the backend default when absent.
    pub isolation: Option<IsolationLevel>,
}

/// A connection that can run statements.
///
/// Transactions are plain statements on the one connection, spelled by the
/// dialect's generator.
#[async_trait]
pub trait Executor: Send {
    /// Dialect of the connected backend.
    fn dialect(&self) -> Dialect;

    /// Runs a statement and returns the number of affected rows.
    ///
    /// Statements without arguments may contain several batched statements.
    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<u64>;

    /// Runs a query and returns every row.
    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Vec<Row>>;

    /// Runs a query and returns its first row.
    async fn query_row(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Option<Row>> {
        Ok(self.query(sql, args).await?.into_iter().next())
    }

    /// Opens a transaction.
    async fn begin_tx(&mut self, options: TxOptions) -> DbResult<()> {
        for statement in self.dialect().generator().begin_statements(options.isolation) {
            self.exec(&statement, &[]).await?;
        }
        Ok(())
    }

    /// Commits the open transaction.
    async fn commit(&mut self) -> DbResult<()> {
        let statement = self.dialect().generator().commit_statement();
        self.exec(statement, &[]).await?;
        Ok(())
    }

    /// Rolls back the open transaction.
    async fn rollback(&mut self) -> DbResult<()> {
        let statement = self.dialect().generator().rollback_statement();
        self.exec(statement, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row::new(
            vec!["COUNT".into(), "name".into()],
            vec![SqlValue::Int(2), SqlValue::Text("users".into())],
        );
        assert_eq!(row.get_i64(0), Some(2));
        assert_eq!(row.get_str(1), Some("users"));
        assert_eq!(row.get_by_name("NAME"), Some(&SqlValue::Text("users".into())));
        assert_eq!(row.get(2), None);
    }
}
