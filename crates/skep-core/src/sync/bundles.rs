//! Bundle lifecycle and backup execution

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{Reconciler, RunMode};
use crate::borg::output;
use crate::command::BackupCommand;
use crate::error::{Error, Result};
use crate::exec::{LineSink, StreamOptions, StreamSource};
use crate::model::{Archive, BackupDirectory, Bundle};
use crate::storage::{ArchiveStore, BundleStore, RepositoryStore};

/// Input for creating or updating a bundle.
#[derive(Debug, Clone)]
pub struct BundleSpec {
    pub repo_id: i64,
    pub cron_minute: String,
    pub cron_hour: String,
    pub cron_day: String,
    pub cron_month: String,
    pub cron_weekday: String,
    pub comment: Option<String>,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
}

impl BundleSpec {
    /// A spec with every schedule field at its `*` default.
    #[must_use]
    pub fn new(repo_id: i64) -> Self {
        Self {
            repo_id,
            cron_minute: "*".to_string(),
            cron_hour: "*".to_string(),
            cron_day: "*".to_string(),
            cron_month: "*".to_string(),
            cron_weekday: "*".to_string(),
            comment: None,
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
        }
    }
}

/// Capture a directory's permissions and ownership at check time.
///
/// # Errors
/// [`Error::NotFound`] when the path is not an existing directory.
pub fn check_dir(path: &str, exclude: bool) -> Result<BackupDirectory> {
    if !Path::new(path).is_dir() {
        return Err(Error::NotFound("directory"));
    }
    let metadata = fs::metadata(path)?;
    Ok(BackupDirectory {
        id: 0,
        path: path.to_string(),
        permissions: format!("{:o}", metadata.mode() & 0o7777),
        owner: metadata.uid().to_string(),
        group: metadata.gid().to_string(),
        exclude,
    })
}

impl Reconciler<'_> {
    /// Create a bundle from form input: capture directory metadata,
    /// share directory rows across bundles, and derive the canonical
    /// command line.
    ///
    /// # Errors
    /// [`Error::NoIncludeDirectories`] when the spec has no include
    /// paths; the half-created bundle row is rolled back on any
    /// failure.
    pub fn create_bundle(&self, spec: &BundleSpec) -> Result<Bundle> {
        let store = BundleStore::new(self.conn());
        let mut bundle = bundle_from_spec(spec);
        bundle.id = store.create(&bundle)?;

        if let Err(err) = self.apply_directories(&mut bundle, spec) {
            let _ = store.delete(bundle.id);
            return Err(err);
        }
        Ok(bundle)
    }

    /// Replace a bundle's schedule, comment, and directory set, then
    /// rebuild its command line.
    ///
    /// # Errors
    /// [`Error::NotFound`] when the bundle is unknown.
    pub fn update_bundle(&self, bundle_id: i64, spec: &BundleSpec) -> Result<Bundle> {
        let store = BundleStore::new(self.conn());
        let mut bundle = store.get(bundle_id)?.ok_or(Error::NotFound("bundle"))?;

        bundle.cron_minute = spec.cron_minute.clone();
        bundle.cron_hour = spec.cron_hour.clone();
        bundle.cron_day = spec.cron_day.clone();
        bundle.cron_month = spec.cron_month.clone();
        bundle.cron_weekday = spec.cron_weekday.clone();
        bundle.comment = spec.comment.clone();

        store.clear_directories(bundle.id)?;
        self.apply_directories(&mut bundle, spec)?;
        Ok(bundle)
    }

    /// Delete a bundle. Directories still referenced by other bundles
    /// survive; their command lines are untouched.
    ///
    /// # Errors
    /// [`Error::NotFound`] when the bundle is unknown.
    pub fn delete_bundle(&self, bundle_id: i64) -> Result<()> {
        let store = BundleStore::new(self.conn());
        if !store.delete(bundle_id)? {
            return Err(Error::NotFound("bundle"));
        }
        Ok(())
    }

    /// Execute a bundle's stored backup command, then persist the
    /// archive borg reports as most recent.
    ///
    /// The archiver invocation completes (or fails) before the stats
    /// fetch begins, in both modes; `Streamed` differs only in relaying
    /// progress lines while the run is live.
    ///
    /// # Errors
    /// [`Error::NoCommandLine`] for a bundle that was never given a
    /// directory set; borg failures are classified from its output.
    pub fn create_backup(&self, bundle_id: i64, mode: RunMode) -> Result<Archive> {
        let bundles = BundleStore::new(self.conn());
        let bundle = bundles.get(bundle_id)?.ok_or(Error::NotFound("bundle"))?;
        let command_line = bundle.command_line.as_deref().ok_or(Error::NoCommandLine)?;
        let command = BackupCommand::parse(command_line)
            .ok_or_else(|| Error::UnexpectedOutput("stored command line does not parse".into()))?;
        let repo = RepositoryStore::new(self.conn())
            .get(bundle.repo_id)?
            .ok_or(Error::NotFound("repository"))?;

        match mode {
            RunMode::Blocking => self.runner().create_blocking(&command)?,
            RunMode::Streamed => self.run_streamed_create(&command)?,
        }

        let info = self.runner().latest_archive(&repo.path)?;
        let mut archive = Archive::from_info(&info, bundle.id, command_line);
        archive.id = ArchiveStore::new(self.conn()).create(&archive)?;
        tracing::info!(bundle = bundle.id, archive = %archive.name, "backup completed");
        Ok(archive)
    }

    /// Spawn the create streamed, relay lines through tracing, and keep
    /// stderr for classification when the run fails.
    fn run_streamed_create(&self, command: &BackupCommand) -> Result<()> {
        let stderr_lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let collected = Arc::clone(&stderr_lines);
        let sink: LineSink = Arc::new(move |source, line| {
            match source {
                StreamSource::Stdout => tracing::info!(target: "skep::backup", "{line}"),
                StreamSource::Stderr => {
                    tracing::info!(target: "skep::backup", "{line}");
                    if let Ok(mut lines) = collected.lock() {
                        lines.push(line.to_string());
                    }
                }
            };
        });

        let run = self
            .runner()
            .create_streamed(command, sink, StreamOptions::default())?;
        let status = run.wait()?;
        if status.success() {
            return Ok(());
        }

        let stderr = match stderr_lines.lock() {
            Ok(lines) => lines.join("\n"),
            Err(_) => String::new(),
        };
        Err(output::classify_failure(&stderr))
    }

    fn apply_directories(&self, bundle: &mut Bundle, spec: &BundleSpec) -> Result<()> {
        if spec.include_paths.is_empty() {
            return Err(Error::NoIncludeDirectories);
        }

        let repo = RepositoryStore::new(self.conn())
            .get(spec.repo_id)?
            .ok_or(Error::NotFound("repository"))?;
        let store = BundleStore::new(self.conn());

        let mut command = BackupCommand::new(&repo.path, &repo.name_format);
        for path in &spec.exclude_paths {
            let directory = check_dir(path, true)?;
            let directory_id = store.find_or_create_directory(&directory)?;
            store.attach_directory(bundle.id, directory_id)?;
            command.exclude_paths.push(path.clone());
        }
        for path in &spec.include_paths {
            let directory = check_dir(path, false)?;
            let directory_id = store.find_or_create_directory(&directory)?;
            store.attach_directory(bundle.id, directory_id)?;
            command.include_paths.push(path.clone());
        }

        bundle.command_line = Some(command.to_command_line());
        store.update(bundle)?;
        Ok(())
    }
}

fn bundle_from_spec(spec: &BundleSpec) -> Bundle {
    let mut bundle = Bundle::new(spec.repo_id);
    bundle.cron_minute = spec.cron_minute.clone();
    bundle.cron_hour = spec.cron_hour.clone();
    bundle.cron_day = spec.cron_day.clone();
    bundle.cron_month = spec.cron_month.clone();
    bundle.cron_weekday = spec.cron_weekday.clone();
    bundle.comment = spec.comment.clone();
    bundle
}
