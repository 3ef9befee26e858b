//! Clause-per-method SQL statement builder.
//!
//! [`QueryBuilder`] accumulates statement text one clause at a time and hands
//! it back from [`QueryBuilder::get`] or [`QueryBuilder::build`], resetting
//! itself for the next statement.
//!
//! Operands come in two kinds. A `&str` or `String` is a trusted SQL fragment
//! (a column, a literal, a function call) and is written as-is. A value passed
//! through [`bind`] is never written into the text: the builder emits the
//! dialect's placeholder and collects the value into the parameter list.
//!
//! ```rust
//! use strata_core::{QueryBuilder, bind};
//!
//! let mut qb = QueryBuilder::new();
//! let sql = qb.select_many(&["a", "b"]).from("t").where_clause("a", "=", "1").get();
//! assert_eq!(sql, "SELECT a, b FROM t WHERE a = 1");
//!
//! let (sql, params) = qb
//!     .select_all()
//!     .from("users")
//!     .where_clause("email", "=", bind("x'; DROP TABLE users; --"))
//!     .build();
//! assert_eq!(sql, "SELECT * FROM users WHERE email = ?");
//! assert_eq!(params.len(), 1);
//! ```

use crate::dialect::Dialect;
use crate::value::{SqlValue, ToSqlValue};

/// Parameter placeholder syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placeholder {
    /// `?` (MySQL, SQLite).
    #[default]
    Question,
    /// `$1, $2, ...` (PostgreSQL).
    Dollar,
    /// `@P1, @P2, ...` (SQL Server).
    AtP,
}

impl Placeholder {
    /// Renders the placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn render(self, index: usize) -> String {
        match self {
            Self::Question => String::from("?"),
            Self::Dollar => format!("${index}"),
            Self::AtP => format!("@P{index}"),
        }
    }
}

/// The right-hand side of a comparison, an assignment or an inserted value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Trusted SQL text, written verbatim.
    Expr(String),
    /// A value bound through a placeholder.
    Param(SqlValue),
}

impl From<&str> for Operand {
    fn from(expr: &str) -> Self {
        Self::Expr(String::from(expr))
    }
}

impl From<String> for Operand {
    fn from(expr: String) -> Self {
        Self::Expr(expr)
    }
}

impl From<SqlValue> for Operand {
    fn from(value: SqlValue) -> Self {
        Self::Param(value)
    }
}

/// Wraps a value so the builder binds it as a parameter.
pub fn bind(value: impl ToSqlValue) -> Operand {
    Operand::Param(value.to_sql_value())
}

/// A mutable SQL statement accumulator.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: String,
    params: Vec<SqlValue>,
    placeholder: Placeholder,
}

impl QueryBuilder {
    /// Creates a builder that emits `?` placeholders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder using the dialect's placeholder syntax.
    #[must_use]
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self::with_placeholder(dialect.placeholder())
    }

    /// Creates a builder using the given placeholder syntax.
    #[must_use]
    pub fn with_placeholder(placeholder: Placeholder) -> Self {
        Self {
            query: String::new(),
            params: Vec::new(),
            placeholder,
        }
    }

    fn push(&mut self, clause: &str) -> &mut Self {
        self.query.push_str(clause);
        self.query.push(' ');
        self
    }

    fn operand(&mut self, operand: Operand) -> String {
        match operand {
            Operand::Expr(expr) => expr,
            Operand::Param(value) => {
                self.params.push(value);
                self.placeholder.render(self.params.len())
            }
        }
    }

    /// Appends `SELECT <expr>`.
    pub fn select_one(&mut self, expr: &str) -> &mut Self {
        self.push(&format!("SELECT {expr}"))
    }

    /// Appends `SELECT a, b, ...`.
    pub fn select_many(&mut self, columns: &[&str]) -> &mut Self {
        self.push(&format!("SELECT {}", columns.join(", ")))
    }

    /// Appends `SELECT *`.
    pub fn select_all(&mut self) -> &mut Self {
        self.push("SELECT *")
    }

    /// Appends `FROM <table>`.
    pub fn from(&mut self, table: &str) -> &mut Self {
        self.push(&format!("FROM {table}"))
    }

    fn condition(&mut self, keyword: &str, column: &str, op: &str, value: Operand) -> &mut Self {
        let rhs = self.operand(value);
        self.push(&format!("{keyword} {column} {op} {rhs}"))
    }

    /// Appends `WHERE <column> <op> <value>`.
    pub fn where_clause(&mut self, column: &str, op: &str, value: impl Into<Operand>) -> &mut Self {
        self.condition("WHERE", column, op, value.into())
    }

    /// Appends `AND <column> <op> <value>`.
    pub fn and(&mut self, column: &str, op: &str, value: impl Into<Operand>) -> &mut Self {
        self.condition("AND", column, op, value.into())
    }

    /// Appends `OR <column> <op> <value>`.
    pub fn or(&mut self, column: &str, op: &str, value: impl Into<Operand>) -> &mut Self {
        self.condition("OR", column, op, value.into())
    }

    /// Appends `ORDER BY a, b, ...`.
    pub fn order_by(&mut self, columns: &[&str]) -> &mut Self {
        self.push(&format!("ORDER BY {}", columns.join(", ")))
    }

    /// Appends `GROUP BY a, b, ...`.
    pub fn group_by(&mut self, columns: &[&str]) -> &mut Self {
        self.push(&format!("GROUP BY {}", columns.join(", ")))
    }

    /// Appends `INNER JOIN <table>`.
    pub fn inner_join(&mut self, table: &str) -> &mut Self {
        self.push(&format!("INNER JOIN {table}"))
    }

    /// Alias of [`Self::inner_join`].
    pub fn join(&mut self, table: &str) -> &mut Self {
        self.inner_join(table)
    }

    /// Appends `LEFT JOIN <table>`.
    pub fn left_join(&mut self, table: &str) -> &mut Self {
        self.push(&format!("LEFT JOIN {table}"))
    }

    /// Appends `ON <left> = <right>`.
    pub fn on(&mut self, left: &str, right: &str) -> &mut Self {
        self.push(&format!("ON {left} = {right}"))
    }

    /// Appends `AS <alias>`.
    pub fn alias(&mut self, alias: &str) -> &mut Self {
        self.push(&format!("AS {alias}"))
    }

    /// Appends `UPDATE <table>`.
    pub fn update(&mut self, table: &str) -> &mut Self {
        self.push(&format!("UPDATE {table}"))
    }

    /// Appends `SET a = x, b = y, ...`.
    pub fn set<'a, I, V>(&mut self, assignments: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<Operand>,
    {
        let parts: Vec<String> = assignments
            .into_iter()
            .map(|(column, value)| {
                let rhs = self.operand(value.into());
                format!("{column} = {rhs}")
            })
            .collect();
        self.push(&format!("SET {}", parts.join(", ")))
    }

    /// Appends `INSERT INTO <table> (cols) VALUES (values)`.
    pub fn insert_into<I, V>(&mut self, table: &str, columns: &[&str], values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(|v| self.operand(v.into()))
            .collect();
        self.push(&format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            values.join(", ")
        ))
    }

    /// Appends `DELETE FROM <table>`.
    pub fn delete(&mut self, table: &str) -> &mut Self {
        self.push(&format!("DELETE FROM {table}"))
    }

    /// Returns the accumulated statement, trimmed, and resets the builder.
    ///
    /// Bound parameters are discarded; use [`Self::build`] when binding.
    pub fn get(&mut self) -> String {
        self.build().0
    }

    /// Returns the statement and its bound parameters, and resets the builder.
    pub fn build(&mut self) -> (String, Vec<SqlValue>) {
        let sql = self.query.trim().to_string();
        self.query.clear();
        (sql, std::mem::take(&mut self.params))
    }
}
