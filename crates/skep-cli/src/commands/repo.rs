//! Repository CLI commands
//!
//! Handles: skep repo create/import/list/info/update/check/delete

use clap::Subcommand;

use skep_core::storage::{Database, RepositoryStore};
use skep_core::{BorgRunner, Reconciler, Repository};

/// Repository commands
#[derive(Subcommand)]
pub enum RepoCommands {
    /// Initialize a new borg repository and register it
    Create {
        /// Repository path or SSH URL
        path: String,
        /// Encryption mode (e.g. repokey, keyfile, none)
        #[arg(short, long, default_value = "repokey")]
        encryption: String,
    },
    /// Register an existing borg repository without initializing it
    Import {
        /// Repository path or SSH URL
        path: String,
    },
    /// List registered repositories
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one repository's stored details
    Info {
        /// Repository path or numeric id
        repo: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-fetch cache statistics from borg
    Update {
        /// Repository path or numeric id
        repo: String,
    },
    /// Run `borg check` against a repository
    Check {
        /// Repository path or numeric id
        repo: String,
        /// Skip the archives check
        #[arg(long)]
        repository_only: bool,
    },
    /// Destroy a repository remotely and drop the local record
    Delete {
        /// Repository path or numeric id
        repo: String,
    },
}

/// Look up a repository by path or numeric id.
pub fn find_repository(store: &RepositoryStore<'_>, identifier: &str) -> anyhow::Result<Repository> {
    let found = if let Ok(id) = identifier.parse::<i64>() {
        store.get(id)?
    } else {
        store.get_by_path(identifier)?
    };
    found.ok_or_else(|| anyhow::anyhow!("Repository not found: {identifier}"))
}

pub fn execute(db: &Database, runner: &BorgRunner, action: RepoCommands) -> anyhow::Result<()> {
    let conn = db.connection();
    let reconciler = Reconciler::new(conn, runner.clone());
    let store = RepositoryStore::new(conn);

    match action {
        RepoCommands::Create { path, encryption } => {
            let repo = reconciler.create_repo(&path, &encryption, 1)?;
            println!("Created repository {} at {}", repo.repo_id, repo.path);
        }
        RepoCommands::Import { path } => {
            let repo = reconciler.import_repo(&path, 1)?;
            println!("Imported repository {} at {}", repo.repo_id, repo.path);
        }
        RepoCommands::List { json } => {
            let repos = store.list(None)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&repos)?);
            } else if repos.is_empty() {
                println!("No repositories registered.");
            } else {
                println!("Repositories:");
                for r in repos {
                    println!("  {} - {} ({})", r.id, r.path, r.encryption_mode);
                }
            }
        }
        RepoCommands::Info { repo, json } => {
            let r = find_repository(&store, &repo)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&r)?);
            } else {
                println!("Repository: {}", r.path);
                println!("ID: {}", r.repo_id);
                println!("Encryption: {}", r.encryption_mode);
                if let Some(modified) = r.last_modified {
                    println!("Last modified: {modified}");
                }
                println!("Total size: {}", r.total_size);
                println!("Deduplicated size: {}", r.unique_csize);
            }
        }
        RepoCommands::Update { repo } => {
            let r = find_repository(&store, &repo)?;
            let updated = reconciler.update_repository_info(r.id)?;
            println!(
                "Updated {}: {} chunks, {} bytes deduplicated",
                updated.path, updated.total_chunks, updated.unique_csize
            );
        }
        RepoCommands::Check {
            repo,
            repository_only,
        } => {
            let r = find_repository(&store, &repo)?;
            reconciler.check_repo(r.id, repository_only)?;
            println!("Check passed: {}", r.path);
        }
        RepoCommands::Delete { repo } => {
            let r = find_repository(&store, &repo)?;
            reconciler.delete_repo(r.id)?;
            println!("Deleted repository: {}", r.path);
        }
    }

    Ok(())
}
