//! Error types shared across the skep core

use thiserror::Error;

use crate::storage::db::DatabaseError;

/// Namespace prefixed to borg message identifiers to form machine codes,
/// e.g. `Borg.Repository.AlreadyExists`.
pub const BORG_CODE_PREFIX: &str = "Borg";

/// Machine code used when borg output matched no known failure shape.
pub const UNKNOWN_ERROR_CODE: &str = "Skep.Unknown.Error";

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by gateway and reconciliation operations.
///
/// Borg-reported failures carry both a human message and a stable
/// machine code; reconciliation-local failures carry a message only.
#[derive(Error, Debug)]
pub enum Error {
    /// borg rejected the invocation itself (usage banner on stderr)
    #[error("{message}")]
    Usage { message: String },

    /// Structured borg failure with a message identifier
    #[error("{message}")]
    Borg { message: String, code: String },

    /// stderr matched neither the usage banner nor the JSON error shape
    #[error("borg produced unrecognized output")]
    UnknownOutput { raw: String },

    /// Process exited successfully but stdout was missing expected structure
    #[error("unexpected borg output: {0}")]
    UnexpectedOutput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("bundle has no command line set")]
    NoCommandLine,

    #[error("no archives found")]
    NoArchives,

    #[error("repository exists in the database already, cannot import")]
    AlreadyImported,

    #[error("at least one include directory is required")]
    NoIncludeDirectories,

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine code for programmatic branching, when one exists.
    ///
    /// Human messages may change between borg versions; these codes do not.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Borg { code, .. } => Some(code),
            Error::UnknownOutput { .. } => Some(UNKNOWN_ERROR_CODE),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(DatabaseError::from(err))
    }
}
