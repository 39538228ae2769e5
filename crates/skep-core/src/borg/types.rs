//! Typed schemas for borg's JSON output
//!
//! One struct per payload shape the gateway consumes. Field names track
//! borg's documented JSON; drift between borg versions shows up here as
//! a decode failure instead of a silently sparse record.

use serde::Deserialize;

/// `borg info --json` for a repository (no archive selector).
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfoResponse {
    pub repository: RepositorySection,
    pub encryption: EncryptionSection,
    pub cache: CacheSection,
    #[serde(default)]
    pub security_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySection {
    pub id: String,
    pub location: String,
    pub last_modified: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionSection {
    pub mode: String,
    #[serde(default)]
    pub keyfile: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default)]
    pub path: Option<String>,
    pub stats: CacheStats,
}

/// Point-in-time chunk statistics from the repository cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheStats {
    pub total_chunks: i64,
    pub total_unique_chunks: i64,
    pub total_size: i64,
    pub total_csize: i64,
    pub unique_size: i64,
    pub unique_csize: i64,
}

/// `borg info --json` with an archive selector or `--first`/`--last`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveInfoResponse {
    pub archives: Vec<ArchiveInfo>,
    pub repository: RepositorySection,
}

/// One archive's detail record, including stats.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub command_line: Vec<String>,
    #[serde(default)]
    pub tam: Option<String>,
    #[serde(default)]
    pub stats: Option<ArchiveStats>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ArchiveStats {
    pub original_size: i64,
    pub compressed_size: i64,
    pub deduplicated_size: i64,
    pub nfiles: i64,
}

/// `borg list --json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    pub archives: Vec<ListEntry>,
}

/// One archive's enumeration record. Everything beyond identity and
/// start time is optional; detail comes from a follow-up `info` call.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub start: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub command_line: Vec<String>,
    #[serde(default)]
    pub tam: Option<String>,
}

/// The failure shape borg emits with `--log-json`: one JSON object
/// carrying a human message and a stable message identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msgid: Option<String>,
}
