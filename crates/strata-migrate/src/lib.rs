//! Versioned, idempotent schema migrations.
//!
//! `strata-migrate` applies batches of [`Migration`]s to SQL Server, MySQL,
//! SQLite or PostgreSQL and records each applied migration in a ledger table,
//! so re-running a batch only creates what is missing.
//!
//! # Architecture
//!
//! - **Connection** - One live connection per backend behind the
//!   [`Executor`](connection::Executor) trait
//! - **Ledger** - The table of applied migrations
//! - **Runner** - Applies a batch in order, skipping logged migrations
//! - **Scripts** - Directories of raw `.sql` migrations, applied in file-name
//!   order
//! - **Dispatcher** - The closed [`Backend`](dispatcher::Backend) enum and a
//!   registry of labelled connections
//!
//! DDL generation, query building and model generation live in `strata-core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_migrate::prelude::*;
//!
//! let mut db = Backend::connect("sqlite", &ConnectionOptions::sqlite("app.db")).await?;
//!
//! let mut runner = MigrationRunner::new();
//! runner.add_migration(
//!     Migration::new("users")
//!         .field(MigrationField::new("id", "integer").primary_key().auto_increment())
//!         .field(MigrationField::new("email", "varchar(255)")),
//! );
//! let report = runner.run(&mut db).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create the ledger table
//! strata-migrate --dialect postgres --server localhost --database app init
//!
//! # Apply a batch
//! strata-migrate --config strata.json migrate --batch migrations.json
//!
//! # Show applied migrations
//! strata-migrate --config strata.json show-migrations
//!
//! # Print the SQL of a batch
//! strata-migrate --dialect mssql sql-migrate --batch migrations.json
//!
//! # Apply a directory of .sql files
//! strata-migrate --config strata.json apply-dir --dir migrations/
//!
//! # Generate a Rust model for one table of a batch
//! strata-migrate make-model --batch migrations.json --table users --serde
//! ```

pub mod config;
pub mod connection;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod options;
pub mod runner;
pub mod script;

pub use strata_core::{Dialect, ForeignKey, Migration, MigrationField};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{load_batch, MigrateConfig};
    pub use crate::connection::{Executor, Row, TxOptions};
    pub use crate::console::{ConsolePrinter, Printer, Tone, TracingPrinter};
    pub use crate::dispatcher::{Backend, ConnectionRegistry, Migrator};
    pub use crate::error::{DbError, DdlPhase, MigrateError, Result};
    pub use crate::ledger::{LedgerEntry, LedgerStatus, MigrationLedger};
    pub use crate::options::ConnectionOptions;
    pub use crate::runner::{MigrationRunner, RunOptions, RunReport};
    pub use crate::script::{load_dir, SqlScript};
    pub use strata_core::{generate_model, ModelOptions};
    pub use strata_core::{Dialect, ForeignKey, Migration, MigrationField};
}
