//! VersionDB sled backend.
//!
//! [`SledStore`] wraps one sled tree. Its transactions buffer writes and
//! remember every key they read; commit applies the writes in a single sled
//! transaction and fails with [`SledError::Conflict`] if a read key changed
//! underneath. Two processes racing to create the same schema therefore
//! cannot both record a version: the loser's commit fails and its changes
//! are discarded.
//!
//! [`SledKeyBackend`] keeps the schema version as a 4-byte big-endian
//! integer under a reserved key of the same tree.

pub mod backend;
pub mod config;
pub mod error;
pub mod store;

pub use backend::{SledKeyBackend, DEFAULT_VERSION_KEY};
pub use config::{SledConfig, DEFAULT_TREE};
pub use error::SledError;
pub use store::{SledStore, SledTx};

/// Strategy name [`SledKeyBackend`] is conventionally registered under.
pub const STRATEGY: &str = "sled_key";
