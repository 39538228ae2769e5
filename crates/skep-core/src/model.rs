//! Persisted domain records
//!
//! Each record maps explicitly, field by field, from the typed borg
//! payloads in [`crate::borg::types`]. Nothing is populated
//! dynamically; a renamed borg field fails in the schema layer instead
//! of producing a sparse row.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::borg::types::{ArchiveInfo, RepoInfoResponse};

/// Archive name template applied when a repository does not set its own.
pub const DEFAULT_NAME_FORMAT: &str = "{hostname}-{now:%Y-%m-%dT%H:%M:%S.%f}";

/// Timestamp layout borg uses in its JSON payloads.
const BORG_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse a borg-reported timestamp; `None` when the layout is foreign.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, BORG_TIMESTAMP_FORMAT).ok()
}

/// Serialize a timestamp in the same layout borg reports.
#[must_use]
pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(BORG_TIMESTAMP_FORMAT).to_string()
}

/// A borg storage target known to skep. Owned by exactly one user.
#[derive(Debug, Clone, Serialize)]
pub struct Repository {
    /// Local surrogate key.
    pub id: i64,
    /// Borg-assigned repository id (opaque hash).
    pub repo_id: String,
    /// Filesystem location; unique locally.
    pub path: String,
    /// Archive name template used by every bundle of this repository.
    pub name_format: String,
    pub last_modified: Option<NaiveDateTime>,
    pub encryption_mode: String,
    pub encryption_keyfile: Option<String>,
    pub cache_path: Option<String>,
    pub security_dir: Option<String>,
    // cache statistics at last info fetch
    pub total_chunks: i64,
    pub total_unique_chunks: i64,
    pub total_size: i64,
    pub total_csize: i64,
    pub unique_size: i64,
    pub unique_csize: i64,
    pub user_id: i64,
}

impl Repository {
    /// Build a record from `borg info --json`.
    #[must_use]
    pub fn from_info(info: &RepoInfoResponse, user_id: i64) -> Self {
        let mut repo = Self {
            id: 0,
            repo_id: info.repository.id.clone(),
            path: info.repository.location.clone(),
            name_format: DEFAULT_NAME_FORMAT.to_string(),
            last_modified: None,
            encryption_mode: String::new(),
            encryption_keyfile: None,
            cache_path: None,
            security_dir: None,
            total_chunks: 0,
            total_unique_chunks: 0,
            total_size: 0,
            total_csize: 0,
            unique_size: 0,
            unique_csize: 0,
            user_id,
        };
        repo.apply_info(info);
        repo
    }

    /// Overwrite the statistics and metadata borg reports, leaving
    /// local identity and settings untouched.
    pub fn apply_info(&mut self, info: &RepoInfoResponse) {
        self.last_modified = parse_timestamp(&info.repository.last_modified);
        self.encryption_mode = info.encryption.mode.clone();
        self.encryption_keyfile = info.encryption.keyfile.clone();
        self.cache_path = info.cache.path.clone();
        self.security_dir = info.security_dir.clone();
        self.total_chunks = info.cache.stats.total_chunks;
        self.total_unique_chunks = info.cache.stats.total_unique_chunks;
        self.total_size = info.cache.stats.total_size;
        self.total_csize = info.cache.stats.total_csize;
        self.unique_size = info.cache.stats.unique_size;
        self.unique_csize = info.cache.stats.unique_csize;
    }
}

/// A named, schedulable backup job definition.
#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    pub id: i64,
    /// Owning repository (local surrogate key).
    pub repo_id: i64,
    // five cron-style schedule fields; execution is external to skep
    pub cron_minute: String,
    pub cron_hour: String,
    pub cron_day: String,
    pub cron_month: String,
    pub cron_weekday: String,
    pub comment: Option<String>,
    /// Canonical `create` invocation; re-derivable from the directory
    /// set and used as the exact-match key for archive linking.
    pub command_line: Option<String>,
}

impl Bundle {
    /// A bundle with every schedule field at its `*` default.
    #[must_use]
    pub fn new(repo_id: i64) -> Self {
        Self {
            id: 0,
            repo_id,
            cron_minute: "*".to_string(),
            cron_hour: "*".to_string(),
            cron_day: "*".to_string(),
            cron_month: "*".to_string(),
            cron_weekday: "*".to_string(),
            comment: None,
            command_line: None,
        }
    }
}

/// An include or exclude path with its metadata captured at check time.
///
/// Rows are shared across bundles and unique on the full
/// (path, permissions, owner, group, exclude) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupDirectory {
    pub id: i64,
    pub path: String,
    /// Octal permission bits, e.g. `755`.
    pub permissions: String,
    pub owner: String,
    pub group: String,
    pub exclude: bool,
}

/// One completed backup snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Archive {
    /// Local surrogate key.
    pub id: i64,
    /// Borg-assigned archive id (content hash).
    pub archive_id: String,
    /// The bundle whose command line produced this archive.
    pub bundle_id: i64,
    pub name: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Seconds.
    pub duration: f64,
    pub hostname: String,
    pub username: String,
    pub comment: String,
    /// Verification tag, when borg reports one.
    pub tam: Option<String>,
    /// Canonical form of the invocation that produced the archive.
    pub command_line: String,
    pub original_size: i64,
    pub compressed_size: i64,
    pub deduplicated_size: i64,
    pub nfiles: i64,
}

impl Archive {
    /// Build a record from a `borg info` archive entry, linked to the
    /// bundle whose canonical command line matched.
    #[must_use]
    pub fn from_info(info: &ArchiveInfo, bundle_id: i64, canonical_command: &str) -> Self {
        let mut archive = Self {
            id: 0,
            archive_id: info.id.clone(),
            bundle_id,
            name: info.name.clone(),
            start: None,
            end: None,
            duration: 0.0,
            hostname: String::new(),
            username: String::new(),
            comment: String::new(),
            tam: None,
            command_line: canonical_command.to_string(),
            original_size: 0,
            compressed_size: 0,
            deduplicated_size: 0,
            nfiles: 0,
        };
        archive.apply_info(info);
        archive
    }

    /// Overwrite the fields borg reports, keeping local identity and
    /// the bundle link.
    pub fn apply_info(&mut self, info: &ArchiveInfo) {
        self.name = info.name.clone();
        self.start = parse_timestamp(&info.start);
        self.end = parse_timestamp(&info.end);
        self.duration = info.duration;
        self.hostname = info.hostname.clone();
        self.username = info.username.clone();
        self.comment = info.comment.clone();
        self.tam = info.tam.clone();
        if let Some(stats) = info.stats {
            self.original_size = stats.original_size;
            self.compressed_size = stats.compressed_size;
            self.deduplicated_size = stats.deduplicated_size;
            self.nfiles = stats.nfiles;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_borg_timestamps_with_microseconds() {
        let parsed = parse_timestamp("2024-05-01T09:30:00.123456").unwrap();
        assert_eq!(format_timestamp(parsed), "2024-05-01T09:30:00.123456");
    }

    #[test]
    fn foreign_timestamp_layout_is_none() {
        assert!(parse_timestamp("May 1st 2024").is_none());
    }

    #[test]
    fn new_bundle_defaults_schedule_to_star() {
        let bundle = Bundle::new(7);
        assert_eq!(bundle.cron_minute, "*");
        assert_eq!(bundle.cron_weekday, "*");
        assert!(bundle.command_line.is_none());
    }
}
