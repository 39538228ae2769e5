//! Database migrations

use rusqlite::Connection;

use super::db::DatabaseError;

const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
///
/// # Errors
/// Returns an error if migrations fail
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    conn.pragma_update(None, "user_version", CURRENT_VERSION)?;
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        r#"
        -- Borg storage targets; identity is the borg-assigned id plus
        -- a locally unique filesystem path
        CREATE TABLE IF NOT EXISTS repositories (
            id INTEGER PRIMARY KEY,
            repo_id TEXT NOT NULL UNIQUE,
            path TEXT NOT NULL UNIQUE,
            name_format TEXT NOT NULL,
            last_modified TEXT,
            encryption_mode TEXT NOT NULL,
            encryption_keyfile TEXT,
            cache_path TEXT,
            security_dir TEXT,
            total_chunks INTEGER NOT NULL DEFAULT 0,
            total_unique_chunks INTEGER NOT NULL DEFAULT 0,
            total_size INTEGER NOT NULL DEFAULT 0,
            total_csize INTEGER NOT NULL DEFAULT 0,
            unique_size INTEGER NOT NULL DEFAULT 0,
            unique_csize INTEGER NOT NULL DEFAULT 0,
            user_id INTEGER NOT NULL DEFAULT 1
        );

        -- Named backup jobs; command_line holds the canonical create
        -- invocation derived from the directory set
        CREATE TABLE IF NOT EXISTS bundles (
            id INTEGER PRIMARY KEY,
            repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
            cron_minute TEXT NOT NULL DEFAULT '*',
            cron_hour TEXT NOT NULL DEFAULT '*',
            cron_day TEXT NOT NULL DEFAULT '*',
            cron_month TEXT NOT NULL DEFAULT '*',
            cron_weekday TEXT NOT NULL DEFAULT '*',
            comment TEXT,
            command_line TEXT
        );

        -- Include/exclude paths, shared across bundles and unique on
        -- the full attribute tuple
        CREATE TABLE IF NOT EXISTS backup_directories (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL,
            permissions TEXT NOT NULL,
            owner TEXT NOT NULL,
            grp TEXT NOT NULL,
            exclude INTEGER NOT NULL DEFAULT 0,
            UNIQUE(path, permissions, owner, grp, exclude)
        );

        CREATE TABLE IF NOT EXISTS bundle_directories (
            bundle_id INTEGER NOT NULL REFERENCES bundles(id) ON DELETE CASCADE,
            directory_id INTEGER NOT NULL REFERENCES backup_directories(id) ON DELETE CASCADE,
            PRIMARY KEY (bundle_id, directory_id)
        );

        -- Completed backups; archive_id is borg's content hash
        CREATE TABLE IF NOT EXISTS archives (
            id INTEGER PRIMARY KEY,
            archive_id TEXT NOT NULL UNIQUE,
            bundle_id INTEGER NOT NULL REFERENCES bundles(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            duration REAL NOT NULL DEFAULT 0,
            hostname TEXT NOT NULL DEFAULT '',
            username TEXT NOT NULL DEFAULT '',
            comment TEXT NOT NULL DEFAULT '',
            tam TEXT,
            command_line TEXT NOT NULL,
            original_size INTEGER NOT NULL DEFAULT 0,
            compressed_size INTEGER NOT NULL DEFAULT 0,
            deduplicated_size INTEGER NOT NULL DEFAULT 0,
            nfiles INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_bundles_repo ON bundles(repo_id);
        CREATE INDEX IF NOT EXISTS idx_bundles_command_line ON bundles(command_line);
        CREATE INDEX IF NOT EXISTS idx_archives_bundle ON archives(bundle_id);
        CREATE INDEX IF NOT EXISTS idx_archives_name ON archives(name);
        "#,
    )?;

    Ok(())
}
