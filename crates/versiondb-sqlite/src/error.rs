//! SQLite backend error types.

use thiserror::Error;

/// Errors raised by the SQLite store and version backends.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Error from SQLite.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A table name that is not a plain SQL identifier.
    #[error("invalid table name {name:?}")]
    InvalidIdentifier {
        /// The rejected name.
        name: String,
    },

    /// A version that does not fit the storage column or pragma.
    #[error("schema version {value} out of range")]
    VersionOutOfRange {
        /// The offending value.
        value: i64,
    },
}
