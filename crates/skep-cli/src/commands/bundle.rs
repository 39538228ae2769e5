//! Bundle CLI commands
//!
//! Handles: skep bundle create/list/show/update/delete/run

use clap::{Args, Subcommand};

use skep_core::storage::{ArchiveStore, BundleStore, Database, RepositoryStore};
use skep_core::sync::BundleSpec;
use skep_core::{BorgRunner, Reconciler, RunMode};

use super::repo::find_repository;

/// Bundle commands
#[derive(Subcommand)]
pub enum BundleCommands {
    /// Define a new backup bundle for a repository
    Create(BundleArgs),
    /// List bundles, optionally for one repository
    List {
        /// Repository path or numeric id
        #[arg(short, long)]
        repo: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one bundle's directories and schedule
    Show {
        /// Bundle id
        id: i64,
    },
    /// Replace a bundle's directories and schedule
    Update {
        /// Bundle id
        id: i64,
        #[command(flatten)]
        args: BundleArgs,
    },
    /// Delete a bundle and its locally stored archives
    Delete {
        /// Bundle id
        id: i64,
    },
    /// Execute a bundle's backup command now
    Run {
        /// Bundle id
        id: i64,
        /// Wait silently instead of relaying progress lines
        #[arg(long)]
        quiet: bool,
    },
}

/// Arguments shared by `bundle create` and `bundle update`
#[derive(Args)]
pub struct BundleArgs {
    /// Repository path or numeric id
    #[arg(short, long)]
    pub repo: String,

    /// Directory to back up (can specify multiple times)
    #[arg(long = "include", value_name = "DIR")]
    pub include: Vec<String>,

    /// Directory to exclude (can specify multiple times)
    #[arg(long = "exclude", value_name = "DIR")]
    pub exclude: Vec<String>,

    /// Cron schedule, five fields (default: every minute)
    #[arg(long, value_name = "SCHEDULE")]
    pub cron: Option<String>,

    /// Free-form comment
    #[arg(short, long)]
    pub comment: Option<String>,
}

impl BundleArgs {
    fn to_spec(&self, db: &Database) -> anyhow::Result<BundleSpec> {
        let store = RepositoryStore::new(db.connection());
        let repo = find_repository(&store, &self.repo)?;

        let mut spec = BundleSpec::new(repo.id);
        spec.include_paths.clone_from(&self.include);
        spec.exclude_paths.clone_from(&self.exclude);
        spec.comment.clone_from(&self.comment);
        if let Some(cron) = &self.cron {
            let fields: Vec<&str> = cron.split_whitespace().collect();
            let [minute, hour, day, month, weekday] = fields.as_slice() else {
                anyhow::bail!("Cron schedule must have exactly five fields: {cron}");
            };
            spec.cron_minute = (*minute).to_string();
            spec.cron_hour = (*hour).to_string();
            spec.cron_day = (*day).to_string();
            spec.cron_month = (*month).to_string();
            spec.cron_weekday = (*weekday).to_string();
        }
        Ok(spec)
    }
}

pub fn execute(db: &Database, runner: &BorgRunner, action: BundleCommands) -> anyhow::Result<()> {
    let conn = db.connection();
    let reconciler = Reconciler::new(conn, runner.clone());
    let store = BundleStore::new(conn);

    match action {
        BundleCommands::Create(args) => {
            let spec = args.to_spec(db)?;
            let bundle = reconciler.create_bundle(&spec)?;
            println!("Created bundle {}", bundle.id);
            if let Some(command_line) = bundle.command_line {
                println!("Command: {command_line}");
            }
        }
        BundleCommands::List { repo, json } => {
            let repo_id = match repo {
                Some(identifier) => {
                    let repos = RepositoryStore::new(conn);
                    Some(find_repository(&repos, &identifier)?.id)
                }
                None => None,
            };
            let bundles = store.list(repo_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&bundles)?);
            } else if bundles.is_empty() {
                println!("No bundles found.");
            } else {
                println!("Bundles:");
                for b in bundles {
                    let comment = b.comment.as_deref().unwrap_or("no comment");
                    println!("  {} - repo {} ({})", b.id, b.repo_id, comment);
                }
            }
        }
        BundleCommands::Show { id } => {
            let bundle = store
                .get(id)?
                .ok_or_else(|| anyhow::anyhow!("Bundle not found: {id}"))?;
            println!("Bundle: {}", bundle.id);
            println!(
                "Schedule: {} {} {} {} {}",
                bundle.cron_minute,
                bundle.cron_hour,
                bundle.cron_day,
                bundle.cron_month,
                bundle.cron_weekday
            );
            if let Some(comment) = &bundle.comment {
                println!("Comment: {comment}");
            }
            if let Some(command_line) = &bundle.command_line {
                println!("Command: {command_line}");
            }
            println!("Directories:");
            for dir in store.directories(bundle.id)? {
                let role = if dir.exclude { "exclude" } else { "include" };
                println!("  [{role}] {}", dir.path);
            }
            let archives = ArchiveStore::new(conn).list_for_bundle(bundle.id)?;
            println!("Archives: {}", archives.len());
        }
        BundleCommands::Update { id, args } => {
            let spec = args.to_spec(db)?;
            let bundle = reconciler.update_bundle(id, &spec)?;
            println!("Updated bundle {}", bundle.id);
        }
        BundleCommands::Delete { id } => {
            reconciler.delete_bundle(id)?;
            println!("Deleted bundle {id}");
        }
        BundleCommands::Run { id, quiet } => {
            let mode = if quiet {
                RunMode::Blocking
            } else {
                RunMode::Streamed
            };
            let archive = reconciler.create_backup(id, mode)?;
            println!("Created archive: {}", archive.name);
            println!(
                "Original {} bytes, deduplicated {} bytes, {} files",
                archive.original_size, archive.deduplicated_size, archive.nfiles
            );
        }
    }

    Ok(())
}
