//! Reconciliation between borg's actual state and the local database
//!
//! Borg is the sole source of truth for what happened; the database is
//! a derived cache. Every operation here reads borg first and only then
//! touches local rows, so the two cannot drift optimistically.

mod archives;
mod bundles;
mod repos;

pub use archives::ImportReport;
pub use bundles::BundleSpec;

use rusqlite::Connection;

use crate::borg::BorgRunner;

/// How backup execution runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Spawn the create in the background and relay its progress lines;
    /// production behavior.
    #[default]
    Streamed,
    /// Run the create to completion inline; deterministic for tests.
    Blocking,
}

/// Shared context for reconciliation operations.
pub struct Reconciler<'a> {
    conn: &'a Connection,
    runner: BorgRunner,
}

impl<'a> Reconciler<'a> {
    pub fn new(conn: &'a Connection, runner: BorgRunner) -> Self {
        Self { conn, runner }
    }

    #[must_use]
    pub fn runner(&self) -> &BorgRunner {
        &self.runner
    }

    pub(crate) fn conn(&self) -> &Connection {
        self.conn
    }
}
