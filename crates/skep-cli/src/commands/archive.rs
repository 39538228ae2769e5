//! Archive CLI commands
//!
//! Handles: skep archive list/import/show/refresh/delete

use clap::Subcommand;

use skep_core::storage::{ArchiveStore, Database, RepositoryStore};
use skep_core::{BorgRunner, Reconciler};

use super::repo::find_repository;

/// Archive commands
#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// List locally known archives for a repository
    List {
        /// Repository path or numeric id
        repo: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pull every archive borg reports into the database
    Import {
        /// Repository path or numeric id
        repo: String,
    },
    /// Show one archive's stored details
    Show {
        /// Archive name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-fetch one archive's statistics from borg
    Refresh {
        /// Archive name
        name: String,
    },
    /// Delete an archive remotely and drop the local record
    Delete {
        /// Archive name
        name: String,
    },
}

pub fn execute(db: &Database, runner: &BorgRunner, action: ArchiveCommands) -> anyhow::Result<()> {
    let conn = db.connection();
    let reconciler = Reconciler::new(conn, runner.clone());
    let store = ArchiveStore::new(conn);

    match action {
        ArchiveCommands::List { repo, json } => {
            let repos = RepositoryStore::new(conn);
            let r = find_repository(&repos, &repo)?;
            let archives = store.list_for_repo(r.id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&archives)?);
            } else if archives.is_empty() {
                println!("No archives found.");
            } else {
                println!("Archives in {}:", r.path);
                for a in archives {
                    let start = a
                        .start
                        .map_or_else(|| "unknown start".to_string(), |t| t.to_string());
                    println!("  {} - {} ({} files)", a.name, start, a.nfiles);
                }
            }
        }
        ArchiveCommands::Import { repo } => {
            let repos = RepositoryStore::new(conn);
            let r = find_repository(&repos, &repo)?;
            let report = reconciler.import_archives(&r)?;
            println!(
                "Imported {} archives ({} already known, {} failed)",
                report.imported, report.skipped, report.failed
            );
        }
        ArchiveCommands::Show { name, json } => {
            let archive = store
                .get_by_name(&name)?
                .ok_or_else(|| anyhow::anyhow!("Archive not found: {name}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&archive)?);
            } else {
                println!("Archive: {}", archive.name);
                println!("ID: {}", archive.archive_id);
                println!("Bundle: {}", archive.bundle_id);
                if let Some(start) = archive.start {
                    println!("Start: {start}");
                }
                if let Some(end) = archive.end {
                    println!("End: {end}");
                }
                println!("Duration: {}s", archive.duration);
                println!("Host: {}@{}", archive.username, archive.hostname);
                println!("Original size: {}", archive.original_size);
                println!("Deduplicated size: {}", archive.deduplicated_size);
                println!("Files: {}", archive.nfiles);
            }
        }
        ArchiveCommands::Refresh { name } => {
            let archive = reconciler.refresh_archive(&name)?;
            println!(
                "Refreshed {}: {} bytes original, {} files",
                archive.name, archive.original_size, archive.nfiles
            );
        }
        ArchiveCommands::Delete { name } => {
            reconciler.delete_archive(&name)?;
            println!("Deleted archive: {name}");
        }
    }

    Ok(())
}
