//! VersionDB SQLite backend.
//!
//! [`SqliteStore`] runs every migration in a `BEGIN IMMEDIATE` transaction
//! by default, so the write lock is held from the version read to the
//! commit and concurrent migrators on one database serialize. Callbacks get
//! a [`SqliteTx`] that derefs to [`rusqlite::Connection`]; DDL and DML run
//! on it directly and roll back with the version write.
//!
//! Two version backends are provided:
//!
//! - [`SideTableBackend`] (`"side_table"`): a `(scope, version)` table.
//! - [`UserVersionBackend`] (`"user_version"`): `PRAGMA user_version`.

pub mod backend;
pub mod config;
pub mod error;
pub mod store;

use std::sync::Arc;

use versiondb_core::Registry;

pub use backend::{SideTableBackend, UserVersionBackend, DEFAULT_SCOPE, DEFAULT_TABLE};
pub use config::{JournalMode, SqliteConfig, TransactionMode};
pub use error::SqliteError;
pub use store::{SqliteStore, SqliteTx};

/// Strategy name for [`SideTableBackend`].
pub const SIDE_TABLE: &str = "side_table";

/// Strategy name for [`UserVersionBackend`].
pub const USER_VERSION: &str = "user_version";

/// Register both backends under their conventional names, with default
/// settings.
///
/// Panics if either name is already registered.
pub fn register_defaults(registry: &Registry<SqliteStore>) {
    registry.register(SIDE_TABLE, Arc::new(SideTableBackend::default()));
    registry.register(USER_VERSION, Arc::new(UserVersionBackend));
}
