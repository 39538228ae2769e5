//! Repository lifecycle: create, import, refresh, check, delete

use super::Reconciler;
use crate::error::{Error, Result};
use crate::model::Repository;
use crate::storage::RepositoryStore;

impl Reconciler<'_> {
    /// Initialize a new borg repository and persist its info.
    ///
    /// # Errors
    /// Surfaces `Borg.Repository.AlreadyExists` and
    /// `Borg.Repository.ParentPathDoesNotExist` unchanged.
    pub fn create_repo(&self, path: &str, encryption: &str, user_id: i64) -> Result<Repository> {
        self.runner().init_repository(path, encryption)?;
        self.fetch_and_store(path, user_id)
    }

    /// Register a pre-existing external repository without initializing
    /// it. Only the info fetch runs.
    ///
    /// # Errors
    /// [`Error::AlreadyImported`] when the path is already tracked;
    /// `Borg.Repository.DoesNotExist` when borg finds nothing there.
    pub fn import_repo(&self, path: &str, user_id: i64) -> Result<Repository> {
        let store = RepositoryStore::new(self.conn());
        if store.get_by_path(path)?.is_some() {
            return Err(Error::AlreadyImported);
        }
        self.fetch_and_store(path, user_id)
    }

    /// Re-fetch a repository's cache statistics and overwrite the
    /// stored copy.
    ///
    /// # Errors
    /// Fails when the repository is unknown locally or unreadable
    /// remotely.
    pub fn update_repository_info(&self, id: i64) -> Result<Repository> {
        let store = RepositoryStore::new(self.conn());
        let mut repo = store.get(id)?.ok_or(Error::NotFound("repository"))?;

        let info = self.runner().repository_info(&repo.path)?;
        repo.apply_info(&info);
        store.update_stats(&repo)?;
        Ok(repo)
    }

    /// Destroy the external repository, then drop the local record.
    /// The local row survives when the remote delete fails, so the
    /// database never claims a deletion borg did not perform.
    ///
    /// # Errors
    /// Fails when the repository is unknown locally or borg refuses the
    /// delete.
    pub fn delete_repo(&self, id: i64) -> Result<()> {
        let store = RepositoryStore::new(self.conn());
        let repo = store.get(id)?.ok_or(Error::NotFound("repository"))?;

        self.runner().delete_repository(&repo.path)?;
        store.delete(repo.id)?;
        tracing::info!(path = %repo.path, "repository deleted");
        Ok(())
    }

    /// Verify repository integrity via `borg check`.
    ///
    /// # Errors
    /// Fails when the repository is unknown locally or the check finds
    /// problems.
    pub fn check_repo(&self, id: i64, repository_only: bool) -> Result<()> {
        let store = RepositoryStore::new(self.conn());
        let repo = store.get(id)?.ok_or(Error::NotFound("repository"))?;
        self.runner().check_repository(&repo.path, repository_only)
    }

    fn fetch_and_store(&self, path: &str, user_id: i64) -> Result<Repository> {
        let info = self.runner().repository_info(path)?;
        let mut repo = Repository::from_info(&info, user_id);
        repo.id = RepositoryStore::new(self.conn()).create(&repo)?;
        tracing::info!(path = %repo.path, repo_id = %repo.repo_id, "repository registered");
        Ok(repo)
    }
}
