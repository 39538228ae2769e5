//! SQLite persistence for skep's domain records

pub mod archives;
pub mod bundles;
pub mod db;
mod migrations;
pub mod repositories;

pub use archives::ArchiveStore;
pub use bundles::BundleStore;
pub use db::{Database, DatabaseError};
pub use repositories::RepositoryStore;
