//! skep CLI - command-line front end for the reconciliation layer
//!
//! Provides `skep repo`, `skep bundle`, and `skep archive` commands.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use skep_core::storage::Database;
use skep_core::BorgRunner;

use commands::archive::ArchiveCommands;
use commands::bundle::BundleCommands;
use commands::repo::RepoCommands;

#[derive(Parser)]
#[command(name = "skep")]
#[command(about = "skep - backup orchestration for borg repositories")]
#[command(version)]
struct Cli {
    /// Database file (defaults to skep.db in the platform data directory)
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    /// The borg binary to invoke
    #[arg(long, global = true, default_value = "borg", value_name = "PATH")]
    borg: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage repositories
    Repo {
        #[command(subcommand)]
        action: RepoCommands,
    },
    /// Manage backup bundles
    Bundle {
        #[command(subcommand)]
        action: BundleCommands,
    },
    /// Manage archives
    Archive {
        #[command(subcommand)]
        action: ArchiveCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("cannot create data directory {}", data_dir.display()))?;
    let _log_guard = init_logging(&data_dir)?;

    let db_path = cli
        .database
        .unwrap_or_else(|| data_dir.join("skep.db"));
    let db = Database::open(&db_path)
        .with_context(|| format!("cannot open database {}", db_path.display()))?;
    let runner = BorgRunner::new(cli.borg);

    match cli.command {
        Commands::Repo { action } => commands::repo::execute(&db, &runner, action),
        Commands::Bundle { action } => commands::bundle::execute(&db, &runner, action),
        Commands::Archive { action } => commands::archive::execute(&db, &runner, action),
    }
}

fn get_data_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_local_dir().context("no data directory for this platform")?;
    Ok(base.join("skep"))
}

/// `RUST_LOG` controls verbosity (default `info`, which includes
/// relayed backup progress lines). Events go to stderr and to a
/// daily-rotated file under the data dir.
fn init_logging(data_dir: &std::path::Path) -> anyhow::Result<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let file_appender = tracing_appender::rolling::daily(data_dir.join("logs"), "skep.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}
