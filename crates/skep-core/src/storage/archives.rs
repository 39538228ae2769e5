//! Archive storage operations (CRUD)

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::DatabaseError;
use crate::model::{format_timestamp, parse_timestamp, Archive};

/// Archive storage operations
pub struct ArchiveStore<'a> {
    conn: &'a Connection,
}

impl<'a> ArchiveStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert an archive and return its local id.
    ///
    /// # Errors
    /// Fails on a duplicate borg archive id.
    pub fn create(&self, archive: &Archive) -> Result<i64, DatabaseError> {
        self.conn.execute(
            r"
            INSERT INTO archives (
                archive_id, bundle_id, name, start_time, end_time, duration,
                hostname, username, comment, tam, command_line,
                original_size, compressed_size, deduplicated_size, nfiles
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ",
            params![
                archive.archive_id,
                archive.bundle_id,
                archive.name,
                archive.start.map(format_timestamp),
                archive.end.map(format_timestamp),
                archive.duration,
                archive.hostname,
                archive.username,
                archive.comment,
                archive.tam,
                archive.command_line,
                archive.original_size,
                archive.compressed_size,
                archive.deduplicated_size,
                archive.nfiles,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get an archive by local id
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn get(&self, id: i64) -> Result<Option<Archive>, DatabaseError> {
        self.get_by("id = ?1", params![id])
    }

    /// Get an archive by borg-assigned content hash
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn get_by_archive_id(&self, archive_id: &str) -> Result<Option<Archive>, DatabaseError> {
        self.get_by("archive_id = ?1", params![archive_id])
    }

    /// Get an archive by its expanded name
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn get_by_name(&self, name: &str) -> Result<Option<Archive>, DatabaseError> {
        self.get_by("name = ?1", params![name])
    }

    /// Archives belonging to one bundle.
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn list_for_bundle(&self, bundle_id: i64) -> Result<Vec<Archive>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT} WHERE bundle_id = ?1 ORDER BY id"))?;
        let rows = stmt.query_map(params![bundle_id], row_to_archive)?;
        let mut archives = Vec::new();
        for row in rows {
            archives.push(row?);
        }
        Ok(archives)
    }

    /// Archives belonging to any bundle of one repository.
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn list_for_repo(&self, repo_id: i64) -> Result<Vec<Archive>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT a.id, a.archive_id, a.bundle_id, a.name, a.start_time,
                   a.end_time, a.duration, a.hostname, a.username, a.comment,
                   a.tam, a.command_line,
                   a.original_size, a.compressed_size, a.deduplicated_size, a.nfiles
            FROM archives a
            JOIN bundles b ON b.id = a.bundle_id
            WHERE b.repo_id = ?1
            ORDER BY a.id
            ",
        )?;
        let rows = stmt.query_map(params![repo_id], row_to_archive)?;
        let mut archives = Vec::new();
        for row in rows {
            archives.push(row?);
        }
        Ok(archives)
    }

    /// Overwrite an archive's borg-reported fields.
    ///
    /// # Errors
    /// Fails when the archive is unknown.
    pub fn update_stats(&self, archive: &Archive) -> Result<(), DatabaseError> {
        let updated = self.conn.execute(
            r"
            UPDATE archives
            SET name = ?1, start_time = ?2, end_time = ?3, duration = ?4,
                hostname = ?5, username = ?6, comment = ?7, tam = ?8,
                original_size = ?9, compressed_size = ?10,
                deduplicated_size = ?11, nfiles = ?12
            WHERE id = ?13
            ",
            params![
                archive.name,
                archive.start.map(format_timestamp),
                archive.end.map(format_timestamp),
                archive.duration,
                archive.hostname,
                archive.username,
                archive.comment,
                archive.tam,
                archive.original_size,
                archive.compressed_size,
                archive.deduplicated_size,
                archive.nfiles,
                archive.id,
            ],
        )?;

        if updated == 0 {
            return Err(DatabaseError::NotFound(format!("archive {}", archive.id)));
        }
        Ok(())
    }

    /// Delete an archive row.
    ///
    /// # Errors
    /// Returns an error if the delete fails
    pub fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let deleted = self
            .conn
            .execute("DELETE FROM archives WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn get_by(
        &self,
        predicate: &str,
        filter: impl rusqlite::Params,
    ) -> Result<Option<Archive>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!("{SELECT} WHERE {predicate}"))?;
        Ok(stmt.query_row(filter, row_to_archive).optional()?)
    }
}

const SELECT: &str = r"
    SELECT id, archive_id, bundle_id, name, start_time, end_time, duration,
           hostname, username, comment, tam, command_line,
           original_size, compressed_size, deduplicated_size, nfiles
    FROM archives
";

fn row_to_archive(row: &Row<'_>) -> rusqlite::Result<Archive> {
    let start: Option<String> = row.get(4)?;
    let end: Option<String> = row.get(5)?;
    Ok(Archive {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        bundle_id: row.get(2)?,
        name: row.get(3)?,
        start: start.as_deref().and_then(parse_timestamp),
        end: end.as_deref().and_then(parse_timestamp),
        duration: row.get(6)?,
        hostname: row.get(7)?,
        username: row.get(8)?,
        comment: row.get(9)?,
        tam: row.get(10)?,
        command_line: row.get(11)?,
        original_size: row.get(12)?,
        compressed_size: row.get(13)?,
        deduplicated_size: row.get(14)?,
        nfiles: row.get(15)?,
    })
}
