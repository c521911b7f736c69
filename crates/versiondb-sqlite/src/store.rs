//! SQLite store.

use std::ops::Deref;
use std::path::Path;

use rusqlite::Connection;
use tracing::debug;
use versiondb_core::{BoxError, Store, Transaction};

use crate::config::{SqliteConfig, TransactionMode};
use crate::error::SqliteError;

/// A store over one SQLite connection.
pub struct SqliteStore {
    conn: Connection,
    mode: TransactionMode,
}

impl SqliteStore {
    /// Open or create a database file with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqliteError> {
        Self::open_with_config(path, SqliteConfig::default())
    }

    /// Open or create a database file.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: SqliteConfig,
    ) -> Result<Self, SqliteError> {
        let conn = Connection::open(path)?;
        config.apply(&conn)?;
        Ok(Self {
            conn,
            mode: config.transaction_mode,
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, SqliteError> {
        let config = SqliteConfig::default();
        let conn = Connection::open_in_memory()?;
        config.apply(&conn)?;
        Ok(Self {
            conn,
            mode: config.transaction_mode,
        })
    }

    /// Wrap an existing connection. Its settings are left untouched.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            mode: TransactionMode::default(),
        }
    }

    /// Set the locking mode of future transactions.
    pub fn with_transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.mode = mode;
        self
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Unwrap the store into its connection.
    pub fn into_inner(self) -> Connection {
        self.conn
    }
}

impl Store for SqliteStore {
    type Tx<'a> = SqliteTx<'a>;

    fn begin(&mut self) -> Result<SqliteTx<'_>, BoxError> {
        let behavior = self.mode.behavior();
        let inner = self
            .conn
            .transaction_with_behavior(behavior)
            .map_err(SqliteError::from)?;
        debug!(mode = ?self.mode, "sqlite transaction started");
        Ok(SqliteTx { inner })
    }
}

/// A transaction over a [`SqliteStore`].
///
/// Derefs to [`Connection`], so callbacks run SQL on it directly. Dropping
/// it without committing rolls back.
pub struct SqliteTx<'a> {
    inner: rusqlite::Transaction<'a>,
}

impl Deref for SqliteTx<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.inner
    }
}

impl Transaction for SqliteTx<'_> {
    fn commit(self) -> Result<(), BoxError> {
        self.inner.commit().map_err(SqliteError::from)?;
        debug!("sqlite transaction committed");
        Ok(())
    }

    fn rollback(self) -> Result<(), BoxError> {
        self.inner.rollback().map_err(SqliteError::from)?;
        debug!("sqlite transaction rolled back");
        Ok(())
    }
}
