//! strata-migrate CLI
//!
//! Command-line tool for applying migration batches.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use strata_migrate::prelude::*;

/// Versioned schema migrations for SQL Server, MySQL, SQLite and PostgreSQL.
#[derive(Parser, Debug)]
#[command(name = "strata-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend dialect (mssql, mysql, sqlite, postgres).
    #[arg(long, env = "STRATA_DIALECT")]
    dialect: Option<String>,

    /// Server host, or the socket path for MySQL over unix.
    #[arg(long, env = "STRATA_SERVER")]
    server: Option<String>,

    /// Server port.
    #[arg(long, env = "STRATA_PORT")]
    port: Option<u16>,

    /// Database name, or the file path for SQLite.
    #[arg(long, env = "STRATA_DATABASE")]
    database: Option<String>,

    /// Login name.
    #[arg(long, env = "STRATA_USER")]
    user: Option<String>,

    /// Login password.
    #[arg(long, env = "STRATA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// MySQL transport (tcp or unix).
    #[arg(long, env = "STRATA_PROTOCOL")]
    protocol: Option<String>,

    /// Ledger table name.
    #[arg(long, env = "STRATA_LEDGER_TABLE")]
    ledger_table: Option<String>,

    /// JSON config file.
    #[arg(short, long, env = "STRATA_CONFIG")]
    config: Option<PathBuf>,

    /// File of environment variables to load before reading settings.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the ledger table.
    Init,

    /// Apply a batch of migrations.
    Migrate {
        /// JSON file holding an array of migrations.
        #[arg(short, long)]
        batch: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,

        /// Abort the run after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show applied migrations.
    ShowMigrations,

    /// Show the SQL of a batch without connecting.
    SqlMigrate {
        /// JSON file holding an array of migrations.
        #[arg(short, long)]
        batch: PathBuf,
    },

    /// Apply every .sql file of a directory, in file-name order.
    ApplyDir {
        /// Directory holding the .sql files.
        #[arg(short, long)]
        dir: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,

        /// Abort the run after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Generate a Rust struct for one table of a batch.
    MakeModel {
        /// JSON file holding an array of migrations.
        #[arg(short, long)]
        batch: PathBuf,

        /// Table to generate the struct for.
        #[arg(short, long)]
        table: String,

        /// Derive serde traits.
        #[arg(long)]
        serde: bool,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Settings merged from the config file and the command line.
struct Settings {
    dialect: Dialect,
    connection: ConnectionOptions,
    ledger_table: Option<String>,
    timeout: Option<Duration>,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut config = match &self.config {
            Some(path) => MigrateConfig::load(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => MigrateConfig::default(),
        };

        if let Some(dialect) = &self.dialect {
            config.dialect = Some(dialect.clone());
        }
        let connection = &mut config.connection;
        if let Some(server) = &self.server {
            connection.server.clone_from(server);
        }
        if let Some(port) = self.port {
            connection.port = Some(port);
        }
        if let Some(database) = &self.database {
            connection.database.clone_from(database);
        }
        if let Some(user) = &self.user {
            connection.user.clone_from(user);
        }
        if let Some(password) = &self.password {
            connection.password.clone_from(password);
        }
        if let Some(protocol) = &self.protocol {
            connection.protocol = Some(protocol.clone());
        }
        if let Some(table) = &self.ledger_table {
            config.ledger_table = Some(table.clone());
        }

        Ok(Settings {
            dialect: config.dialect()?,
            timeout: config.timeout(),
            connection: config.connection,
            ledger_table: config.ledger_table,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    if let Some(path) = &cli.env_file {
        dotenvy::from_path(path).with_context(|| format!("loading {}", path.display()))?;
        // Re-read so flags fall back to the freshly loaded variables.
        cli = Cli::parse();
    }

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let printer = ConsolePrinter;
    if let Commands::MakeModel {
        batch,
        table,
        serde,
        out,
    } = &cli.command
    {
        if let Err(err) = make_model(batch, table, *serde, out.as_deref()) {
            printer.print_with_time(Tone::Error, &err.format_detailed());
            return Err(err.into());
        }
        return Ok(());
    }

    let settings = cli.settings()?;

    if let Err(err) = run(cli.command, settings, printer).await {
        printer.print_with_time(Tone::Error, &err.format_detailed());
        return Err(err.into());
    }
    Ok(())
}

/// Writes the model of `table` to `out`, or prints it.
fn make_model(
    batch: &std::path::Path,
    table: &str,
    serde: bool,
    out: Option<&std::path::Path>,
) -> Result<()> {
    let migrations = load_batch(batch)?;
    let migration = migrations
        .iter()
        .find(|m| m.table_name == table)
        .ok_or_else(|| {
            MigrateError::Config(format!("table '{table}' is not in {}", batch.display()))
        })?;
    let code = generate_model(migration, ModelOptions { serde });
    match out {
        Some(path) => {
            std::fs::write(path, code)?;
            info!(path = %path.display(), "Model written");
        }
        None => print!("{code}"),
    }
    Ok(())
}

fn runner_for(settings: &Settings, options: RunOptions, printer: ConsolePrinter) -> MigrationRunner {
    let runner = MigrationRunner::new()
        .with_options(options)
        .with_printer(Arc::new(printer));
    match &settings.ledger_table {
        Some(table) => runner.with_ledger_table(table.clone()),
        None => runner,
    }
}

/// A token cancelled on Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let on_ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });
    token
}

async fn run(command: Commands, settings: Settings, printer: ConsolePrinter) -> Result<()> {
    let dialect = settings.dialect;

    if let Commands::SqlMigrate { batch } = &command {
        for migration in load_batch(batch)? {
            for sql in MigrationRunner::sql_for(dialect, &migration, None) {
                println!("{sql};\n");
            }
        }
        return Ok(());
    }

    printer.print_with_time(
        Tone::Success,
        &format!(
            "establishing connection with database {}",
            settings.connection.redacted_dsn(dialect)
        ),
    );
    let mut db = Backend::connect_dialect(dialect, &settings.connection).await?;
    let outcome = execute(command, settings, &mut db, printer).await;
    db.close().await?;
    outcome
}

async fn execute(
    command: Commands,
    settings: Settings,
    db: &mut Backend,
    printer: ConsolePrinter,
) -> Result<()> {
    let mut ledger = MigrationLedger::new(settings.dialect);
    if let Some(table) = &settings.ledger_table {
        ledger = ledger.with_table(table.clone());
    }

    match command {
        Commands::Init => {
            info!("Initializing migrations system...");
            ledger.setup_migration_table(db).await?;
            printer.print_with_time(Tone::Success, "migrations table created successfully");
            Ok(())
        }

        Commands::ShowMigrations => {
            ledger.setup_migration_table(db).await?;
            let applied = ledger.applied(db).await?;
            if applied.is_empty() {
                info!("No migrations have been applied yet.");
            } else {
                println!("\nApplied migrations:");
                println!("{:-<60}", "");
                for entry in &applied {
                    println!(
                        " [X] {} ({}){}",
                        entry.name,
                        entry.applied_at.format("%Y-%m-%d %H:%M:%S"),
                        entry
                            .description
                            .as_deref()
                            .map(|d| format!(" - {d}"))
                            .unwrap_or_default()
                    );
                }
                println!();
            }
            Ok(())
        }

        Commands::Migrate {
            batch,
            dry_run,
            timeout,
        } => {
            let migrations = load_batch(&batch)?;
            let options = RunOptions {
                dry_run,
                timeout: timeout.map(Duration::from_secs).or(settings.timeout),
            };
            let mut runner = runner_for(&settings, options, printer);
            runner.add_migrations(migrations);

            runner
                .run_until_cancelled(db, ctrl_c_token())
                .await
                .map(|report| {
                    info!(
                        applied = report.applied.len(),
                        skipped = report.skipped.len(),
                        "Migration run finished"
                    );
                })
        }

        Commands::ApplyDir {
            dir,
            dry_run,
            timeout,
        } => {
            let scripts = load_dir(&dir)?;
            let options = RunOptions {
                dry_run,
                timeout: timeout.map(Duration::from_secs).or(settings.timeout),
            };
            runner_for(&settings, options, printer)
                .run_scripts_until_cancelled(db, &scripts, ctrl_c_token())
                .await
                .map(|report| {
                    info!(
                        applied = report.applied.len(),
                        skipped = report.skipped.len(),
                        "Script run finished"
                    );
                })
        }

        Commands::SqlMigrate { .. } | Commands::MakeModel { .. } => Ok(()),
    }
}
