//! Migration runner.
//!
//! Applies an ordered batch of migrations against one backend. Each
//! migration is checked against the ledger first, so re-running a batch only
//! applies what is missing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use strata_core::{validate_batch, DdlWarning, Dialect, Migration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{Executor, TxOptions};
use crate::console::{Printer, Tone, TracingPrinter};
use crate::error::{DbError, DdlPhase, MigrateError, Result};
use crate::ledger::{LedgerStatus, MigrationLedger};
use crate::script::SqlScript;

/// Options for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Print the SQL instead of executing it. The ledger is not touched.
    pub dry_run: bool,
    /// Upper bound for the whole run.
    pub timeout: Option<Duration>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Migrations applied and logged by this run.
    pub applied: Vec<String>,
    /// Migrations skipped because they were already applied.
    pub skipped: Vec<String>,
    /// Generation warnings of the applied migrations.
    pub warnings: Vec<DdlWarning>,
}

/// What a run applies.
#[derive(Clone, Copy)]
enum Work<'a> {
    Tables,
    Scripts(&'a [SqlScript]),
}

/// Applies a batch of migrations.
pub struct MigrationRunner {
    migrations: Vec<Migration>,
    options: RunOptions,
    ledger_table: Option<String>,
    printer: Arc<dyn Printer>,
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    /// Creates a runner with no migrations that reports through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            migrations: Vec::new(),
            options: RunOptions::default(),
            ledger_table: None,
            printer: Arc::new(TracingPrinter),
        }
    }

    /// Sets the run options.
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides the ledger table name.
    #[must_use]
    pub fn with_ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger_table = Some(table.into());
        self
    }

    /// Sets the progress printer.
    #[must_use]
    pub fn with_printer(mut self, printer: Arc<dyn Printer>) -> Self {
        self.printer = printer;
        self
    }

    /// Appends a migration to the batch.
    pub fn add_migration(&mut self, migration: Migration) {
        self.migrations.push(migration);
    }

    /// Appends several migrations to the batch.
    pub fn add_migrations(&mut self, migrations: impl IntoIterator<Item = Migration>) {
        self.migrations.extend(migrations);
    }

    /// The batch, in run order.
    #[must_use]
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Statements a migration executes: `CREATE TABLE`, then any standalone
    /// foreign keys.
    #[must_use]
    pub fn sql_for(dialect: Dialect, migration: &Migration, schema: Option<&str>) -> Vec<String> {
        let mut statements = vec![dialect.create_table(migration, schema)];
        statements.extend(dialect.foreign_key_queries(migration, schema));
        statements
    }

    fn ledger(&self, dialect: Dialect) -> MigrationLedger {
        let ledger = MigrationLedger::new(dialect);
        match &self.ledger_table {
            Some(table) => ledger.with_table(table.clone()),
            None => ledger,
        }
    }

    /// Runs the batch, bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// Stops at the first failing migration and returns an error naming it
    /// and the failed step. Migrations before it stay applied.
    pub async fn run(&self, db: &mut dyn Executor) -> Result<RunReport> {
        self.guarded(db, Work::Tables, None).await
    }

    /// Runs the batch until it completes or `token` is cancelled.
    ///
    /// A transaction left open by the interrupted migration is rolled back.
    /// On MySQL, whose DDL commits implicitly, the interrupted migration may
    /// be left unlogged.
    pub async fn run_until_cancelled(
        &self,
        db: &mut dyn Executor,
        token: CancellationToken,
    ) -> Result<RunReport> {
        self.guarded(db, Work::Tables, Some(token)).await
    }

    /// Applies SQL file migrations in order, each in its own transaction
    /// together with its ledger row.
    pub async fn run_scripts(
        &self,
        db: &mut dyn Executor,
        scripts: &[SqlScript],
    ) -> Result<RunReport> {
        self.guarded(db, Work::Scripts(scripts), None).await
    }

    /// [`run_scripts`](Self::run_scripts) until `token` is cancelled.
    pub async fn run_scripts_until_cancelled(
        &self,
        db: &mut dyn Executor,
        scripts: &[SqlScript],
        token: CancellationToken,
    ) -> Result<RunReport> {
        self.guarded(db, Work::Scripts(scripts), Some(token)).await
    }

    /// Runs `work` under the timeout and cancellation token, and rolls back
    /// the transaction an interrupted migration left open.
    async fn guarded(
        &self,
        db: &mut dyn Executor,
        work: Work<'_>,
        token: Option<CancellationToken>,
    ) -> Result<RunReport> {
        let in_tx = AtomicBool::new(false);
        let outcome = {
            let batch = self.run_work(db, work, &in_tx);
            let bounded = async {
                match self.options.timeout {
                    Some(limit) => tokio::time::timeout(limit, batch)
                        .await
                        .unwrap_or_else(|_| Err(MigrateError::Timeout(limit))),
                    None => batch.await,
                }
            };
            match token {
                Some(token) => tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        warn!("Migration run cancelled");
                        Err(MigrateError::Cancelled)
                    }
                    report = bounded => report,
                },
                None => bounded.await,
            }
        };

        let interrupted = matches!(outcome, Err(MigrateError::Timeout(_) | MigrateError::Cancelled));
        if interrupted && in_tx.load(Ordering::SeqCst) {
            warn!("Rolling back the interrupted migration");
            if let Err(err) = db.rollback().await {
                warn!(error = %err, "Rollback failed");
            }
        }
        outcome
    }

    async fn run_work(
        &self,
        db: &mut dyn Executor,
        work: Work<'_>,
        in_tx: &AtomicBool,
    ) -> Result<RunReport> {
        match work {
            Work::Tables => self.run_batch(db, in_tx).await,
            Work::Scripts(scripts) => self.run_script_batch(db, scripts, in_tx).await,
        }
    }

    async fn setup_ledger(&self, db: &mut dyn Executor) -> Result<MigrationLedger> {
        let mut ledger = self.ledger(db.dialect());
        self.printer
            .print_with_time(Tone::Info, "ensuring migrations table exists...");
        if let Err(err) = ledger.setup_migration_table(db).await {
            self.printer.print_with_time(
                Tone::Error,
                &format!("error creating/checking migrations table: {err}"),
            );
            return Err(err);
        }
        Ok(ledger)
    }

    async fn run_batch(&self, db: &mut dyn Executor, in_tx: &AtomicBool) -> Result<RunReport> {
        validate_batch(&self.migrations)?;
        let dialect = db.dialect();

        if self.options.dry_run {
            return Ok(self.dry_run(dialect));
        }

        let mut report = RunReport::default();
        let ledger = self.setup_ledger(db).await?;

        if self.migrations.is_empty() {
            self.printer
                .print_with_time(Tone::Info, "no migrations to apply");
            return Ok(report);
        }

        for (index, migration) in self.migrations.iter().enumerate() {
            let name = migration.table_name.as_str();
            let label = format!("migration {index} - {name}");
            self.printer
                .print_with_time(Tone::Info, &format!("attempting to apply {label}"));

            let status = match ledger.status(db, name).await {
                Ok(status) => status,
                Err(source) => return Err(self.catalog_error(name, source)),
            };

            match status {
                LedgerStatus::Logged => {
                    self.printer.print_with_time(
                        Tone::Warning,
                        &format!("{label} already applied. Skipping..."),
                    );
                    report.skipped.push(name.to_string());
                    continue;
                }
                LedgerStatus::Unlogged => {
                    warn!(migration = %name, "Table exists without a ledger entry");
                    self.printer.print_with_time(
                        Tone::Warning,
                        &format!("{label}: table exists but was never logged. Skipping..."),
                    );
                    report.skipped.push(name.to_string());
                    continue;
                }
                LedgerStatus::Pending => {}
            }

            for warning in dialect.warnings(migration) {
                warn!(migration = %name, "{warning}");
                self.printer.print_with_time(Tone::Warning, &warning.to_string());
                report.warnings.push(warning);
            }

            if let Err(err) = self.apply(db, migration, ledger.schema(), in_tx).await {
                self.printer
                    .print_with_time(Tone::Error, &format!("error executing {label}: {err}"));
                return Err(err);
            }

            if let Err(source) = ledger
                .log_migration(db, name, &migration.description)
                .await
            {
                self.printer
                    .print_with_time(Tone::Error, &format!("error logging {label}: {source}"));
                return Err(MigrateError::LedgerWrite {
                    migration: name.to_string(),
                    source,
                });
            }

            info!(migration = %name, "Migration applied");
            self.printer.print_with_time(
                Tone::Success,
                &format!("{label} successfully applied and logged"),
            );
            report.applied.push(name.to_string());
        }

        self.printer
            .print_with_time(Tone::Success, "all migrations processed");
        Ok(report)
    }

    fn catalog_error(&self, name: &str, source: DbError) -> MigrateError {
        self.printer.print_with_time(
            Tone::Error,
            &format!("error checking whether migration '{name}' is applied: {source}"),
        );
        MigrateError::CatalogQuery {
            migration: name.to_string(),
            source,
        }
    }

    fn dry_run(&self, dialect: Dialect) -> RunReport {
        info!("Dry run mode - SQL will be printed but not executed");
        let mut report = RunReport::default();
        for migration in &self.migrations {
            for sql in Self::sql_for(dialect, migration, None) {
                self.printer.print(Tone::Info, &format!("{sql};"));
            }
            report.warnings.extend(dialect.warnings(migration));
        }
        report
    }

    /// Runs the DDL of one migration, inside a transaction when the dialect
    /// supports transactional DDL.
    async fn apply(
        &self,
        db: &mut dyn Executor,
        migration: &Migration,
        schema: Option<&str>,
        in_tx: &AtomicBool,
    ) -> Result<()> {
        let name = &migration.table_name;
        let transactional = db.dialect().generator().transactional_ddl();

        if transactional {
            begin(db, name, in_tx).await?;
        }

        match Self::execute_ddl(db, migration, schema).await {
            Ok(()) if transactional => commit(db, name, in_tx).await,
            Ok(()) => Ok(()),
            Err(err) => {
                if transactional {
                    rollback(db, name, in_tx).await;
                }
                Err(err)
            }
        }
    }

    async fn execute_ddl(
        db: &mut dyn Executor,
        migration: &Migration,
        schema: Option<&str>,
    ) -> Result<()> {
        let dialect = db.dialect();
        let name = &migration.table_name;

        let create = dialect.create_table(migration, schema);
        debug!(sql = %create, "Creating table");
        db.exec(&create, &[])
            .await
            .map_err(|source| ddl_error(name, DdlPhase::CreateTable, source))?;

        let queries = dialect.foreign_key_queries(migration, schema);
        for (fk, sql) in migration.foreign_keys.iter().zip(queries) {
            debug!(sql = %sql, constraint = %fk.name, "Adding foreign key");
            db.exec(&sql, &[])
                .await
                .map_err(|source| ddl_error(name, DdlPhase::ForeignKey(fk.name.clone()), source))?;
        }
        Ok(())
    }

    async fn run_script_batch(
        &self,
        db: &mut dyn Executor,
        scripts: &[SqlScript],
        in_tx: &AtomicBool,
    ) -> Result<RunReport> {
        let mut report = RunReport::default();

        if self.options.dry_run {
            info!("Dry run mode - SQL will be printed but not executed");
            for script in scripts {
                self.printer
                    .print(Tone::Info, &format!("-- {}\n{}", script.name, script.sql.trim()));
            }
            return Ok(report);
        }

        let ledger = self.setup_ledger(db).await?;

        if scripts.is_empty() {
            self.printer
                .print_with_time(Tone::Info, "no migrations to apply");
            return Ok(report);
        }

        for script in scripts {
            let name = script.name.as_str();
            self.printer
                .print_with_time(Tone::Info, &format!("executing migration {name}"));

            match ledger.is_migration_applied(db, name).await {
                Ok(true) => {
                    self.printer.print_with_time(
                        Tone::Warning,
                        &format!("migration {name} already applied. Skipping..."),
                    );
                    report.skipped.push(name.to_string());
                    continue;
                }
                Ok(false) => {}
                Err(source) => return Err(self.catalog_error(name, source)),
            }

            if let Err(err) = self.apply_script(db, &ledger, script, in_tx).await {
                self.printer
                    .print_with_time(Tone::Error, &format!("error executing migration {name}: {err}"));
                return Err(err);
            }

            info!(migration = %name, "Script applied");
            self.printer.print_with_time(
                Tone::Success,
                &format!("migration {name} executed successfully"),
            );
            report.applied.push(name.to_string());
        }

        self.printer
            .print_with_time(Tone::Success, "all migrations processed");
        Ok(report)
    }

    /// Runs one script and writes its ledger row in the same transaction.
    async fn apply_script(
        &self,
        db: &mut dyn Executor,
        ledger: &MigrationLedger,
        script: &SqlScript,
        in_tx: &AtomicBool,
    ) -> Result<()> {
        let name = &script.name;
        begin(db, name, in_tx).await?;

        debug!(migration = %name, "Running script");
        if let Err(source) = db.exec(&script.sql, &[]).await {
            rollback(db, name, in_tx).await;
            return Err(ddl_error(name, DdlPhase::Script, source));
        }

        if let Err(source) = ledger.log_migration(db, name, &script.description).await {
            rollback(db, name, in_tx).await;
            return Err(MigrateError::LedgerWrite {
                migration: name.clone(),
                source,
            });
        }

        commit(db, name, in_tx).await
    }
}

async fn begin(db: &mut dyn Executor, migration: &str, in_tx: &AtomicBool) -> Result<()> {
    db.begin_tx(TxOptions::default())
        .await
        .map_err(|source| ddl_error(migration, DdlPhase::Begin, source))?;
    in_tx.store(true, Ordering::SeqCst);
    Ok(())
}

async fn commit(db: &mut dyn Executor, migration: &str, in_tx: &AtomicBool) -> Result<()> {
    let committed = db.commit().await;
    in_tx.store(false, Ordering::SeqCst);
    committed.map_err(|source| ddl_error(migration, DdlPhase::Commit, source))
}

async fn rollback(db: &mut dyn Executor, migration: &str, in_tx: &AtomicBool) {
    if let Err(err) = db.rollback().await {
        warn!(migration = %migration, error = %err, "Rollback failed");
    }
    in_tx.store(false, Ordering::SeqCst);
}

fn ddl_error(migration: &str, phase: DdlPhase, source: DbError) -> MigrateError {
    MigrateError::DdlExecution {
        migration: migration.to_string(),
        phase,
        source,
    }
}
