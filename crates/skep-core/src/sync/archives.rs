//! Archive reconciliation: bulk import, refresh, delete

use super::Reconciler;
use crate::borg::Limit;
use crate::command::BackupCommand;
use crate::error::{Error, Result};
use crate::model::{Archive, BackupDirectory, Bundle, Repository};
use crate::storage::{ArchiveStore, BundleStore, RepositoryStore};
use crate::sync::bundles::check_dir;

/// Outcome of a bulk import pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Archives newly persisted.
    pub imported: usize,
    /// Archives already known locally.
    pub skipped: usize,
    /// Archives that could not be imported (bad command line or failed
    /// stats fetch).
    pub failed: usize,
}

impl Reconciler<'_> {
    /// Pull every archive borg knows about into the database, creating
    /// bundles for command lines seen for the first time.
    ///
    /// Matching is always on the canonical re-derivation of the
    /// tool-reported command line, never on the raw string. Per-archive
    /// failures are counted and skipped; only the initial enumeration
    /// failing aborts the pass.
    ///
    /// # Errors
    /// Fails when borg cannot list the repository at all.
    pub fn import_archives(&self, repo: &Repository) -> Result<ImportReport> {
        let entries = self.runner().list_archives(&repo.path, Limit::None)?;

        let bundles = BundleStore::new(self.conn());
        let archives = ArchiveStore::new(self.conn());
        let mut report = ImportReport::default();

        for entry in entries {
            if archives.get_by_archive_id(&entry.id)?.is_some() {
                report.skipped += 1;
                continue;
            }

            let raw = entry.command_line.join(" ");
            let Some(parsed) = BackupCommand::parse(&raw) else {
                tracing::warn!(archive = %entry.name, "unparseable command line, skipping");
                report.failed += 1;
                continue;
            };
            let canonical = parsed.to_command_line();

            let bundle_id = match bundles.get_by_command_line(&canonical)? {
                Some(bundle) => bundle.id,
                None => self.bundle_from_command(repo, &parsed, &canonical)?,
            };

            let info = match self
                .runner()
                .archive_info(&repo.path, Some(&entry.name), Limit::None)
            {
                Ok(mut response) => match response.archives.pop() {
                    Some(info) => info,
                    None => {
                        tracing::warn!(archive = %entry.name, "info returned no archive");
                        report.failed += 1;
                        continue;
                    }
                },
                Err(err) => {
                    tracing::warn!(archive = %entry.name, error = %err, "stats fetch failed");
                    report.failed += 1;
                    continue;
                }
            };

            archives.create(&Archive::from_info(&info, bundle_id, &canonical))?;
            report.imported += 1;
        }

        tracing::info!(
            imported = report.imported,
            skipped = report.skipped,
            failed = report.failed,
            path = %repo.path,
            "archive import finished"
        );
        Ok(report)
    }

    /// Re-fetch one archive's statistics and overwrite the stored copy.
    ///
    /// # Errors
    /// [`Error::NotFound`] when the archive is unknown locally; a
    /// borg failure when the tool no longer finds it remotely. Either
    /// way the divergence is surfaced, not ignored.
    pub fn refresh_archive(&self, name: &str) -> Result<Archive> {
        let archives = ArchiveStore::new(self.conn());
        let mut record = archives
            .get_by_name(name)?
            .ok_or(Error::NotFound("archive"))?;
        let repo = self.repo_for_bundle(record.bundle_id)?;

        let mut response = self
            .runner()
            .archive_info(&repo.path, Some(name), Limit::None)?;
        let info = response.archives.pop().ok_or(Error::NoArchives)?;

        record.apply_info(&info);
        archives.update_stats(&record)?;
        Ok(record)
    }

    /// Delete an archive remotely, then locally. The local row is only
    /// removed once borg confirms the remote delete.
    ///
    /// # Errors
    /// [`Error::NotFound`] when the archive is unknown locally; a borg
    /// failure when the remote delete is refused.
    pub fn delete_archive(&self, name: &str) -> Result<()> {
        let archives = ArchiveStore::new(self.conn());
        let record = archives
            .get_by_name(name)?
            .ok_or(Error::NotFound("archive"))?;
        let repo = self.repo_for_bundle(record.bundle_id)?;

        self.runner().delete_archive(&repo.path, name)?;
        archives.delete(record.id)?;
        tracing::info!(archive = %name, "archive deleted");
        Ok(())
    }

    /// Reverse-engineer a bundle from an imported archive's command
    /// line. Directory metadata is captured when the paths still exist.
    fn bundle_from_command(
        &self,
        repo: &Repository,
        command: &BackupCommand,
        canonical: &str,
    ) -> Result<i64> {
        let store = BundleStore::new(self.conn());

        let mut bundle = Bundle::new(repo.id);
        bundle.command_line = Some(canonical.to_string());
        bundle.id = store.create(&bundle)?;

        for path in &command.exclude_paths {
            let directory_id = store.find_or_create_directory(&recorded_dir(path, true))?;
            store.attach_directory(bundle.id, directory_id)?;
        }
        for path in &command.include_paths {
            let directory_id = store.find_or_create_directory(&recorded_dir(path, false))?;
            store.attach_directory(bundle.id, directory_id)?;
        }

        tracing::info!(bundle = bundle.id, "bundle created from imported command line");
        Ok(bundle.id)
    }

    fn repo_for_bundle(&self, bundle_id: i64) -> Result<Repository> {
        let bundle = BundleStore::new(self.conn())
            .get(bundle_id)?
            .ok_or(Error::NotFound("bundle"))?;
        RepositoryStore::new(self.conn())
            .get(bundle.repo_id)?
            .ok_or(Error::NotFound("repository"))
    }
}

/// An imported path may no longer exist on this host; fall back to
/// empty metadata so the row still dedups on the tuple.
fn recorded_dir(path: &str, exclude: bool) -> BackupDirectory {
    check_dir(path, exclude).unwrap_or(BackupDirectory {
        id: 0,
        path: path.to_string(),
        permissions: String::new(),
        owner: String::new(),
        group: String::new(),
        exclude,
    })
}
