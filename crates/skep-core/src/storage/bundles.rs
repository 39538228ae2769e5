//! Bundle and backup-directory storage operations
//!
//! Directories are shared rows: a bundle links to them through the
//! `bundle_directories` association, and a row only goes away when the
//! last referencing bundle does.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::DatabaseError;
use crate::model::{BackupDirectory, Bundle};

/// Bundle storage operations
pub struct BundleStore<'a> {
    conn: &'a Connection,
}

impl<'a> BundleStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a bundle and return its id.
    ///
    /// # Errors
    /// Returns an error if the insert fails
    pub fn create(&self, bundle: &Bundle) -> Result<i64, DatabaseError> {
        self.conn.execute(
            r"
            INSERT INTO bundles (
                repo_id, cron_minute, cron_hour, cron_day, cron_month,
                cron_weekday, comment, command_line
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                bundle.repo_id,
                bundle.cron_minute,
                bundle.cron_hour,
                bundle.cron_day,
                bundle.cron_month,
                bundle.cron_weekday,
                bundle.comment,
                bundle.command_line,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a bundle by id
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn get(&self, id: i64) -> Result<Option<Bundle>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!("{SELECT} WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id], row_to_bundle).optional()?)
    }

    /// Find the bundle whose stored canonical command line matches
    /// exactly.
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn get_by_command_line(&self, command_line: &str) -> Result<Option<Bundle>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT} WHERE command_line = ?1"))?;
        Ok(stmt
            .query_row(params![command_line], row_to_bundle)
            .optional()?)
    }

    /// List bundles, optionally restricted to one repository.
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn list(&self, repo_id: Option<i64>) -> Result<Vec<Bundle>, DatabaseError> {
        let (sql, filter) = match repo_id {
            Some(id) => (format!("{SELECT} WHERE repo_id = ?1 ORDER BY id"), Some(id)),
            None => (format!("{SELECT} ORDER BY id"), None),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match filter {
            Some(id) => stmt.query_map(params![id], row_to_bundle)?,
            None => stmt.query_map([], row_to_bundle)?,
        };
        let mut bundles = Vec::new();
        for row in rows {
            bundles.push(row?);
        }
        Ok(bundles)
    }

    /// Update a bundle's schedule, comment, and command line.
    ///
    /// # Errors
    /// Fails when the bundle is unknown.
    pub fn update(&self, bundle: &Bundle) -> Result<(), DatabaseError> {
        let updated = self.conn.execute(
            r"
            UPDATE bundles
            SET cron_minute = ?1, cron_hour = ?2, cron_day = ?3,
                cron_month = ?4, cron_weekday = ?5,
                comment = ?6, command_line = ?7
            WHERE id = ?8
            ",
            params![
                bundle.cron_minute,
                bundle.cron_hour,
                bundle.cron_day,
                bundle.cron_month,
                bundle.cron_weekday,
                bundle.comment,
                bundle.command_line,
                bundle.id,
            ],
        )?;

        if updated == 0 {
            return Err(DatabaseError::NotFound(format!("bundle {}", bundle.id)));
        }
        Ok(())
    }

    /// Delete a bundle; its archives cascade, and directories no other
    /// bundle references are pruned.
    ///
    /// # Errors
    /// Returns an error if the delete fails
    pub fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let deleted = self
            .conn
            .execute("DELETE FROM bundles WHERE id = ?1", params![id])?;
        if deleted > 0 {
            self.prune_orphan_directories()?;
        }
        Ok(deleted > 0)
    }

    /// Find a directory row matching the full attribute tuple, creating
    /// it when absent. Identical tuples never duplicate.
    ///
    /// # Errors
    /// Returns an error if the lookup or insert fails
    pub fn find_or_create_directory(
        &self,
        directory: &BackupDirectory,
    ) -> Result<i64, DatabaseError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                r"
                SELECT id FROM backup_directories
                WHERE path = ?1 AND permissions = ?2 AND owner = ?3
                  AND grp = ?4 AND exclude = ?5
                ",
                params![
                    directory.path,
                    directory.permissions,
                    directory.owner,
                    directory.group,
                    directory.exclude,
                ],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn.execute(
            r"
            INSERT INTO backup_directories (path, permissions, owner, grp, exclude)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                directory.path,
                directory.permissions,
                directory.owner,
                directory.group,
                directory.exclude,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Associate a directory with a bundle. Repeating an existing pair
    /// is a no-op.
    ///
    /// # Errors
    /// Returns an error if the insert fails
    pub fn attach_directory(&self, bundle_id: i64, directory_id: i64) -> Result<(), DatabaseError> {
        self.conn.execute(
            r"
            INSERT OR IGNORE INTO bundle_directories (bundle_id, directory_id)
            VALUES (?1, ?2)
            ",
            params![bundle_id, directory_id],
        )?;
        Ok(())
    }

    /// Drop all of a bundle's directory associations, pruning rows that
    /// become orphaned.
    ///
    /// # Errors
    /// Returns an error if the delete fails
    pub fn clear_directories(&self, bundle_id: i64) -> Result<(), DatabaseError> {
        self.conn.execute(
            "DELETE FROM bundle_directories WHERE bundle_id = ?1",
            params![bundle_id],
        )?;
        self.prune_orphan_directories()
    }

    /// A bundle's directories in association order (the order they were
    /// attached, which is the command line's input order).
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn directories(&self, bundle_id: i64) -> Result<Vec<BackupDirectory>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT d.id, d.path, d.permissions, d.owner, d.grp, d.exclude
            FROM backup_directories d
            JOIN bundle_directories bd ON bd.directory_id = d.id
            WHERE bd.bundle_id = ?1
            ORDER BY bd.rowid
            ",
        )?;
        let rows = stmt.query_map(params![bundle_id], row_to_directory)?;
        let mut directories = Vec::new();
        for row in rows {
            directories.push(row?);
        }
        Ok(directories)
    }

    /// Total directory rows; dedup assertions in tests use this.
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn directory_count(&self) -> Result<i64, DatabaseError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM backup_directories", [], |row| {
                row.get(0)
            })?)
    }

    fn prune_orphan_directories(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            r"
            DELETE FROM backup_directories
            WHERE NOT EXISTS (
                SELECT 1 FROM bundle_directories
                WHERE directory_id = backup_directories.id
            )
            ",
            [],
        )?;
        Ok(())
    }
}

const SELECT: &str = r"
    SELECT id, repo_id, cron_minute, cron_hour, cron_day, cron_month,
           cron_weekday, comment, command_line
    FROM bundles
";

fn row_to_bundle(row: &Row<'_>) -> rusqlite::Result<Bundle> {
    Ok(Bundle {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        cron_minute: row.get(2)?,
        cron_hour: row.get(3)?,
        cron_day: row.get(4)?,
        cron_month: row.get(5)?,
        cron_weekday: row.get(6)?,
        comment: row.get(7)?,
        command_line: row.get(8)?,
    })
}

fn row_to_directory(row: &Row<'_>) -> rusqlite::Result<BackupDirectory> {
    Ok(BackupDirectory {
        id: row.get(0)?,
        path: row.get(1)?,
        permissions: row.get(2)?,
        owner: row.get(3)?,
        group: row.get(4)?,
        exclude: row.get(5)?,
    })
}
