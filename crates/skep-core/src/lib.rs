//! skep core - orchestration layer for BorgBackup
//!
//! This crate wraps the external `borg` binary: it builds canonical
//! `create` command lines from structured directory sets, runs borg
//! blocking or streamed, classifies its JSON and banner output, and
//! reconciles the repository's actual archive state into SQLite.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod borg;
pub mod command;
pub mod error;
pub mod exec;
pub mod model;
pub mod storage;
pub mod sync;

pub use borg::BorgRunner;
pub use command::BackupCommand;
pub use error::{Error, Result};
pub use model::{Archive, BackupDirectory, Bundle, Repository};
pub use sync::{ImportReport, Reconciler, RunMode};
