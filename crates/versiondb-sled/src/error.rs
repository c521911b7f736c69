//! sled backend error types.

use thiserror::Error;

/// Errors raised by the sled store and version backend.
#[derive(Debug, Error)]
pub enum SledError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// A key read in the transaction changed before it committed.
    #[error("transaction conflict on key {key}")]
    Conflict {
        /// Hex-encoded key.
        key: String,
    },

    /// The stored version is not a 4-byte big-endian integer.
    #[error("corrupt version under key {key}: expected 4 bytes, found {len}")]
    CorruptVersion {
        /// Hex-encoded version key.
        key: String,
        /// Length of the stored value.
        len: usize,
    },
}
