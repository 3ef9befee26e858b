//! # strata-core
//!
//! Dialect-aware DDL generation and query building for versioned schema
//! migrations.
//!
//! This crate is pure: nothing in it performs I/O. It provides:
//! - A dialect-agnostic description of a migration ([`Migration`],
//!   [`MigrationField`], [`ForeignKey`])
//! - A closed set of backend dialects ([`Dialect`]) with one DDL generator
//!   each, behind the [`MigrationDialect`] trait
//! - A clause-per-method [`QueryBuilder`] that binds values through the
//!   dialect's parameter placeholders
//! - Model struct generation from a migration ([`generate_model`])
//!
//! ## Generating DDL
//!
//! ```rust
//! use strata_core::{Dialect, Migration, MigrationField};
//!
//! let users = Migration::new("users")
//!     .description("application accounts")
//!     .field(MigrationField::new("id", "int").primary_key().auto_increment())
//!     .field(MigrationField::new("email", "varchar(255)"));
//!
//! let sql = Dialect::MySql.create_table(&users, None);
//! assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `users`"));
//! assert!(sql.contains("`id` INT NOT NULL AUTO_INCREMENT"));
//! assert!(sql.contains("PRIMARY KEY (`id`)"));
//! ```
//!
//! ## Building queries
//!
//! ```rust
//! use strata_core::{Dialect, QueryBuilder, SqlValue, bind};
//!
//! let mut qb = QueryBuilder::for_dialect(Dialect::Postgres);
//! let (sql, params) = qb
//!     .select_one("COUNT(*)")
//!     .from("migrations")
//!     .where_clause("name", "=", bind("users"))
//!     .build();
//!
//! assert_eq!(sql, "SELECT COUNT(*) FROM migrations WHERE name = $1");
//! assert_eq!(params, vec![SqlValue::Text("users".into())]);
//! ```

pub mod builder;
pub mod codegen;
pub mod dialect;
pub mod migration;
pub mod value;

pub use builder::{bind, Operand, Placeholder, QueryBuilder};
pub use codegen::{generate_model, ModelOptions};
pub use dialect::{
    Dialect, IsolationLevel, MigrationDialect, MssqlDialect, MySqlDialect, PostgresDialect,
    SqliteDialect, UnsupportedDialect,
};
pub use migration::{
    validate_batch, DdlWarning, ForeignKey, InvalidMigration, Migration, MigrationField,
};
pub use value::{SqlValue, ToSqlValue};
