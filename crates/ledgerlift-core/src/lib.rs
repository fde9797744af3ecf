//! ledgerlift-core - Core library for ledgerlift
//!
//! Replays encrypted, hash-chained PIM journals from a legacy sync server and
//! migrates them, chunk by chunk, into revisioned collections of a destination
//! store. The CLI and any other front end share everything in here.

pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod journal;
pub mod migrate;
pub mod models;
pub mod pim;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use migrate::{MigrationOptions, MigrationReport, Migrator};
pub use models::{CollectionType, Journal, LegacyExport, SyncAction, SyncEntry};
