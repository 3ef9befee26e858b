//! SQL Server backend over `tiberius`.

use async_trait::async_trait;
use strata_core::{Dialect, SqlValue};
use tiberius::{AuthMethod, Client, ColumnData, Config, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use super::{Executor, Row, TxOptions};
use crate::error::{DbError, DbResult};
use crate::options::ConnectionOptions;

/// A SQL Server instance on one connection.
pub struct MssqlBackend {
    client: Client<Compat<TcpStream>>,
}

impl MssqlBackend {
    /// Connects with SQL Server authentication, trusting the server
    /// certificate.
    pub async fn connect(options: &ConnectionOptions) -> DbResult<Self> {
        info!(
            dsn = %options.redacted_dsn(Dialect::Mssql),
            "establishing connection with mssql database"
        );
        let config = Self::build_config(options);
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        let client = Client::connect(config, tcp.compat_write()).await?;
        Ok(Self { client })
    }

    fn build_config(options: &ConnectionOptions) -> Config {
        let mut config = Config::new();
        config.host(&options.server);
        config.port(options.port_for(Dialect::Mssql).unwrap_or(1433));
        config.database(&options.database);
        config.authentication(AuthMethod::sql_server(&options.user, &options.password));
        config.trust_cert();
        config
    }

    /// Closes the connection.
    pub async fn close(self) -> DbResult<()> {
        self.client.close().await?;
        Ok(())
    }

    /// Sends a plain SQL batch. Transaction control goes through here:
    /// `sp_executesql` would reject a call that leaves `@@TRANCOUNT`
    /// changed.
    async fn batch(&mut self, sql: &str) -> DbResult<()> {
        debug!(sql = %sql, "Executing batch");
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    fn prepare<'a>(sql: &'a str, args: &[SqlValue]) -> Query<'a> {
        let mut query = Query::new(sql);
        for arg in args {
            match arg {
                SqlValue::Null => query.bind(Option::<String>::None),
                SqlValue::Bool(b) => query.bind(*b),
                SqlValue::Int(n) => query.bind(*n),
                SqlValue::Float(f) => query.bind(*f),
                SqlValue::Text(s) => query.bind(s.clone()),
                SqlValue::Blob(b) => query.bind(b.clone()),
            }
        }
        query
    }
}

impl std::fmt::Debug for MssqlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlBackend").finish_non_exhaustive()
    }
}

fn column_value(data: ColumnData<'static>) -> DbResult<SqlValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(|n| SqlValue::Int(i64::from(n))),
        ColumnData::I16(v) => v.map(|n| SqlValue::Int(i64::from(n))),
        ColumnData::I32(v) => v.map(|n| SqlValue::Int(i64::from(n))),
        ColumnData::I64(v) => v.map(SqlValue::Int),
        ColumnData::F32(v) => v.map(|n| SqlValue::Float(f64::from(n))),
        ColumnData::F64(v) => v.map(SqlValue::Float),
        ColumnData::Bit(v) => v.map(SqlValue::Bool),
        ColumnData::String(v) => v.map(|s| SqlValue::Text(s.into_owned())),
        ColumnData::Binary(v) => v.map(|b| SqlValue::Blob(b.into_owned())),
        ColumnData::Guid(v) => v.map(|g| SqlValue::Text(g.to_string())),
        ColumnData::Numeric(v) => v.map(|n| SqlValue::Float(f64::from(n))),
        other => {
            return Err(DbError::Unexpected(format!(
                "unsupported SQL Server column value: {other:?}"
            )))
        }
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn convert_row(row: tiberius::Row) -> DbResult<Row> {
    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = row
        .into_iter()
        .map(column_value)
        .collect::<DbResult<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}

#[async_trait]
impl Executor for MssqlBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<u64> {
        debug!(sql = %sql, params = args.len(), "Executing SQL");
        let result = Self::prepare(sql, args).execute(&mut self.client).await?;
        Ok(result.total())
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Vec<Row>> {
        debug!(sql = %sql, params = args.len(), "Querying");
        let stream = if args.is_empty() {
            self.client.simple_query(sql).await?
        } else {
            Self::prepare(sql, args).query(&mut self.client).await?
        };
        stream
            .into_first_result()
            .await?
            .into_iter()
            .map(convert_row)
            .collect()
    }

    async fn begin_tx(&mut self, options: TxOptions) -> DbResult<()> {
        let statements = Dialect::Mssql.generator().begin_statements(options.isolation);
        self.batch(&transaction_batch(&statements)).await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.batch(Dialect::Mssql.generator().commit_statement()).await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.batch(Dialect::Mssql.generator().rollback_statement()).await
    }
}

/// Joins transaction control statements into one batch.
fn transaction_batch(statements: &[String]) -> String {
    statements.join(";\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_value_conversions() {
        assert_eq!(column_value(ColumnData::I32(Some(7))).unwrap(), SqlValue::Int(7));
        assert_eq!(column_value(ColumnData::I64(None)).unwrap(), SqlValue::Null);
        assert_eq!(
            column_value(ColumnData::String(Some("dbo".into()))).unwrap(),
            SqlValue::Text("dbo".into())
        );
        assert_eq!(column_value(ColumnData::Bit(Some(true))).unwrap(), SqlValue::Bool(true));
    }

    #[test]
    fn test_transaction_batch_keeps_isolation_with_begin() {
        let statements = Dialect::Mssql
            .generator()
            .begin_statements(Some(strata_core::IsolationLevel::Serializable));
        assert_eq!(
            transaction_batch(&statements),
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE;\nBEGIN TRANSACTION"
        );
    }

    #[test]
    fn test_build_config_uses_default_port() {
        let options = ConnectionOptions::new("sql.local", "app").credentials("sa", "pw");
        let config = MssqlBackend::build_config(&options);
        assert_eq!(config.get_addr(), "sql.local:1433");
    }
}
