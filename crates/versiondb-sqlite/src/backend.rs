//! Version backends for SQLite.

use rusqlite::{params, OptionalExtension};
use tracing::debug;
use versiondb_core::{BoxError, VersionBackend};

use crate::error::SqliteError;
use crate::store::{SqliteStore, SqliteTx};

/// Default side table name.
pub const DEFAULT_TABLE: &str = "schema_version";

/// Default scope within the side table.
pub const DEFAULT_SCOPE: &str = "default";

/// Keeps the version in a side table with one row per scope.
///
/// Reads never write: a missing table reads as version 0. The table is
/// created by the first version write, inside the migration transaction, so
/// a failed first migration leaves no table behind. Scopes let several
/// independently versioned schemes share one database.
#[derive(Debug, Clone)]
pub struct SideTableBackend {
    table: String,
    scope: String,
}

impl SideTableBackend {
    /// Create a backend over the given table, using the default scope.
    pub fn new(table: impl Into<String>) -> Result<Self, SqliteError> {
        let table = table.into();
        if !is_identifier(&table) {
            return Err(SqliteError::InvalidIdentifier { name: table });
        }
        Ok(Self {
            table,
            scope: DEFAULT_SCOPE.to_string(),
        })
    }

    /// Use a different scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// The side table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The scope this backend reads and writes.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn ensure_table(&self, tx: &SqliteTx<'_>) -> Result<(), SqliteError> {
        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (scope TEXT PRIMARY KEY, version INTEGER NOT NULL)",
            self.table
        ))?;
        Ok(())
    }

    fn table_exists(&self, tx: &SqliteTx<'_>) -> Result<bool, SqliteError> {
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![self.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn read(&self, tx: &SqliteTx<'_>) -> Result<u32, SqliteError> {
        if !self.table_exists(tx)? {
            return Ok(0);
        }

        let stored: Option<i64> = tx
            .query_row(
                &format!("SELECT version FROM {} WHERE scope = ?1", self.table),
                params![self.scope],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(value) => to_version(value),
            None => Ok(0),
        }
    }

    fn write(&self, tx: &SqliteTx<'_>, version: u32) -> Result<(), SqliteError> {
        self.ensure_table(tx)?;
        tx.execute(
            &format!(
                "INSERT INTO {} (scope, version) VALUES (?1, ?2) \
                 ON CONFLICT(scope) DO UPDATE SET version = excluded.version",
                self.table
            ),
            params![self.scope, i64::from(version)],
        )?;
        Ok(())
    }
}

impl Default for SideTableBackend {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

impl VersionBackend<SqliteStore> for SideTableBackend {
    fn read_version(&self, tx: &mut SqliteTx<'_>) -> Result<u32, BoxError> {
        let version = self.read(tx)?;
        debug!(table = %self.table, scope = %self.scope, version, "read side table version");
        Ok(version)
    }

    fn write_version(&self, tx: &mut SqliteTx<'_>, version: u32) -> Result<(), BoxError> {
        self.write(tx, version)?;
        Ok(())
    }
}

/// Keeps the version in the database header via `PRAGMA user_version`.
///
/// The pragma is a signed 32-bit value, so versions above `i32::MAX` are
/// rejected on write.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserVersionBackend;

impl UserVersionBackend {
    fn read(tx: &SqliteTx<'_>) -> Result<u32, SqliteError> {
        let value: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
        to_version(value)
    }

    fn write(tx: &SqliteTx<'_>, version: u32) -> Result<(), SqliteError> {
        let value = i32::try_from(version).map_err(|_| SqliteError::VersionOutOfRange {
            value: i64::from(version),
        })?;
        tx.pragma_update(None, "user_version", value)?;
        Ok(())
    }
}

impl VersionBackend<SqliteStore> for UserVersionBackend {
    fn read_version(&self, tx: &mut SqliteTx<'_>) -> Result<u32, BoxError> {
        let version = Self::read(tx)?;
        debug!(version, "read user_version");
        Ok(version)
    }

    fn write_version(&self, tx: &mut SqliteTx<'_>, version: u32) -> Result<(), BoxError> {
        Self::write(tx, version)?;
        Ok(())
    }
}

fn to_version(value: i64) -> Result<u32, SqliteError> {
    u32::try_from(value).map_err(|_| SqliteError::VersionOutOfRange { value })
}

/// Plain SQL identifier: a letter or underscore, then letters, digits or
/// underscores.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
