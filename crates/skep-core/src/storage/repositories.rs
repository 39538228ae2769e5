//! Repository storage operations (CRUD)

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::DatabaseError;
use crate::model::{format_timestamp, parse_timestamp, Repository};

/// Repository storage operations
pub struct RepositoryStore<'a> {
    conn: &'a Connection,
}

impl<'a> RepositoryStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a repository and return its local id.
    ///
    /// # Errors
    /// Fails on a duplicate path or borg repository id.
    pub fn create(&self, repo: &Repository) -> Result<i64, DatabaseError> {
        self.conn.execute(
            r"
            INSERT INTO repositories (
                repo_id, path, name_format, last_modified,
                encryption_mode, encryption_keyfile, cache_path, security_dir,
                total_chunks, total_unique_chunks,
                total_size, total_csize, unique_size, unique_csize,
                user_id
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ",
            params![
                repo.repo_id,
                repo.path,
                repo.name_format,
                repo.last_modified.map(format_timestamp),
                repo.encryption_mode,
                repo.encryption_keyfile,
                repo.cache_path,
                repo.security_dir,
                repo.total_chunks,
                repo.total_unique_chunks,
                repo.total_size,
                repo.total_csize,
                repo.unique_size,
                repo.unique_csize,
                repo.user_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a repository by local id
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn get(&self, id: i64) -> Result<Option<Repository>, DatabaseError> {
        self.get_by("id = ?1", params![id])
    }

    /// Get a repository by borg-assigned id
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn get_by_repo_id(&self, repo_id: &str) -> Result<Option<Repository>, DatabaseError> {
        self.get_by("repo_id = ?1", params![repo_id])
    }

    /// Get a repository by filesystem path
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn get_by_path(&self, path: &str) -> Result<Option<Repository>, DatabaseError> {
        self.get_by("path = ?1", params![path])
    }

    /// The most recently created repository, if any.
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn latest(&self) -> Result<Option<Repository>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT} ORDER BY id DESC LIMIT 1"))?;
        Ok(stmt.query_row([], row_to_repository).optional()?)
    }

    /// List repositories, optionally restricted to one user.
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn list(&self, user_id: Option<i64>) -> Result<Vec<Repository>, DatabaseError> {
        let (sql, filter) = match user_id {
            Some(id) => (format!("{SELECT} WHERE user_id = ?1 ORDER BY id"), Some(id)),
            None => (format!("{SELECT} ORDER BY id"), None),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match filter {
            Some(id) => stmt.query_map(params![id], row_to_repository)?,
            None => stmt.query_map([], row_to_repository)?,
        };
        let mut repositories = Vec::new();
        for row in rows {
            repositories.push(row?);
        }
        Ok(repositories)
    }

    /// Overwrite the borg-reported metadata and cache statistics.
    ///
    /// # Errors
    /// Fails when the repository is unknown.
    pub fn update_stats(&self, repo: &Repository) -> Result<(), DatabaseError> {
        let updated = self.conn.execute(
            r"
            UPDATE repositories
            SET last_modified = ?1, encryption_mode = ?2, encryption_keyfile = ?3,
                cache_path = ?4, security_dir = ?5,
                total_chunks = ?6, total_unique_chunks = ?7,
                total_size = ?8, total_csize = ?9,
                unique_size = ?10, unique_csize = ?11
            WHERE id = ?12
            ",
            params![
                repo.last_modified.map(format_timestamp),
                repo.encryption_mode,
                repo.encryption_keyfile,
                repo.cache_path,
                repo.security_dir,
                repo.total_chunks,
                repo.total_unique_chunks,
                repo.total_size,
                repo.total_csize,
                repo.unique_size,
                repo.unique_csize,
                repo.id,
            ],
        )?;

        if updated == 0 {
            return Err(DatabaseError::NotFound(format!(
                "repository {}",
                repo.id
            )));
        }
        Ok(())
    }

    /// Delete a repository (bundles and archives cascade).
    ///
    /// # Errors
    /// Returns an error if the delete fails
    pub fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let deleted = self
            .conn
            .execute("DELETE FROM repositories WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn get_by(
        &self,
        predicate: &str,
        filter: impl rusqlite::Params,
    ) -> Result<Option<Repository>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!("{SELECT} WHERE {predicate}"))?;
        Ok(stmt.query_row(filter, row_to_repository).optional()?)
    }
}

const SELECT: &str = r"
    SELECT id, repo_id, path, name_format, last_modified,
           encryption_mode, encryption_keyfile, cache_path, security_dir,
           total_chunks, total_unique_chunks,
           total_size, total_csize, unique_size, unique_csize,
           user_id
    FROM repositories
";

fn row_to_repository(row: &Row<'_>) -> rusqlite::Result<Repository> {
    let last_modified: Option<String> = row.get(4)?;
    Ok(Repository {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        path: row.get(2)?,
        name_format: row.get(3)?,
        last_modified: last_modified.as_deref().and_then(parse_timestamp),
        encryption_mode: row.get(5)?,
        encryption_keyfile: row.get(6)?,
        cache_path: row.get(7)?,
        security_dir: row.get(8)?,
        total_chunks: row.get(9)?,
        total_unique_chunks: row.get(10)?,
        total_size: row.get(11)?,
        total_csize: row.get(12)?,
        unique_size: row.get(13)?,
        unique_csize: row.get(14)?,
        user_id: row.get(15)?,
    })
}
