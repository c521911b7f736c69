//! SQLite connection configuration.

use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};

use crate::error::SqliteError;

/// Journal mode applied when a database is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    /// Write-ahead log.
    #[default]
    Wal,
    /// Rollback journal, deleted after each transaction.
    Delete,
    /// Journal kept in memory.
    Memory,
}

impl JournalMode {
    fn as_str(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Memory => "MEMORY",
        }
    }
}

/// How a store transaction takes its locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// `BEGIN DEFERRED`: locks are taken on first access.
    Deferred,
    /// `BEGIN IMMEDIATE`: the write lock is taken up front, so two
    /// migrators never interleave on one database.
    #[default]
    Immediate,
    /// `BEGIN EXCLUSIVE`.
    Exclusive,
}

impl TransactionMode {
    pub(crate) fn behavior(&self) -> TransactionBehavior {
        match self {
            TransactionMode::Deferred => TransactionBehavior::Deferred,
            TransactionMode::Immediate => TransactionBehavior::Immediate,
            TransactionMode::Exclusive => TransactionBehavior::Exclusive,
        }
    }
}

/// Configuration for [`SqliteStore`](crate::SqliteStore).
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Journal mode.
    pub journal_mode: JournalMode,

    /// How long to wait on a locked database before failing.
    pub busy_timeout: Duration,

    /// Enforce foreign key constraints.
    pub foreign_keys: bool,

    /// Locking mode for store transactions.
    pub transaction_mode: TransactionMode,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::default(),
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
            transaction_mode: TransactionMode::default(),
        }
    }
}

impl SqliteConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the journal mode.
    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enable or disable foreign key enforcement.
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the transaction locking mode.
    pub fn with_transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.transaction_mode = mode;
        self
    }

    /// Apply the connection-level settings.
    pub(crate) fn apply(&self, conn: &Connection) -> Result<(), SqliteError> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", self.foreign_keys)?;
        // journal_mode answers with the resulting mode; in-memory databases
        // stay in "memory" whatever is requested.
        let _mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            self.journal_mode.as_str(),
            |row| row.get(0),
        )?;
        Ok(())
    }
}
