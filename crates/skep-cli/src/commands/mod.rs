//! CLI command handlers
//!
//! One module per noun: repositories, bundles, archives.

pub mod archive;
pub mod bundle;
pub mod repo;
