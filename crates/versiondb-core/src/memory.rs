//! In-memory store.
//!
//! An ordered key-value map with snapshot transactions. Useful for tests and
//! for embedding the migrator in tools that keep their state in memory.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::scheme::VersionBackend;
use crate::store::{BoxError, Store, Transaction};

/// Default key the [`MemoryKeyBackend`] stores the version under.
pub const DEFAULT_VERSION_KEY: &str = "__versiondb/schema_version";

/// In-memory store errors.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The value under the version key is not a decimal `u32`.
    #[error("corrupt version under key {key:?}: {value:?}")]
    CorruptVersion {
        /// The version key.
        key: String,
        /// The raw value, lossily decoded.
        value: String,
    },
}

/// Ordered in-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: BTreeMap<String, Vec<u8>>,
    commits: u64,
    rollbacks: u64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a committed value.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Write a value directly, outside any transaction.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data.insert(key.into(), value.into());
    }

    /// Committed keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the store holds no committed keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of transactions committed so far.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    /// Number of transactions rolled back so far, explicitly or on drop.
    pub fn rollback_count(&self) -> u64 {
        self.rollbacks
    }
}

impl Store for MemoryStore {
    type Tx<'a> = MemoryTx<'a>;

    fn begin(&mut self) -> Result<MemoryTx<'_>, BoxError> {
        Ok(MemoryTx {
            store: self,
            staged: BTreeMap::new(),
            finished: false,
        })
    }
}

/// A transaction over a [`MemoryStore`].
///
/// Writes are staged and only reach the store on commit. Reads see staged
/// writes first.
#[derive(Debug)]
pub struct MemoryTx<'a> {
    store: &'a mut MemoryStore,
    /// Staged writes; `None` marks a removal.
    staged: BTreeMap<String, Option<Vec<u8>>>,
    finished: bool,
}

impl MemoryTx<'_> {
    /// Read a value, including uncommitted writes from this transaction.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        match self.staged.get(key) {
            Some(staged) => staged.as_deref(),
            None => self.store.get(key),
        }
    }

    /// Check if a key exists, including uncommitted writes.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Stage a write.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.staged.insert(key.into(), Some(value.into()));
        self
    }

    /// Stage a removal.
    pub fn remove(&mut self, key: impl Into<String>) -> &mut Self {
        self.staged.insert(key.into(), None);
        self
    }

    /// Number of staged writes and removals.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }
}

impl Transaction for MemoryTx<'_> {
    fn commit(mut self) -> Result<(), BoxError> {
        for (key, value) in std::mem::take(&mut self.staged) {
            match value {
                Some(value) => {
                    self.store.data.insert(key, value);
                }
                None => {
                    self.store.data.remove(&key);
                }
            }
        }
        self.store.commits += 1;
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self) -> Result<(), BoxError> {
        self.store.rollbacks += 1;
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.store.rollbacks += 1;
        }
    }
}

/// Version backend storing the version as a decimal string under one key.
#[derive(Debug, Clone)]
pub struct MemoryKeyBackend {
    key: String,
}

impl MemoryKeyBackend {
    /// Store the version under `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// The key the version is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Default for MemoryKeyBackend {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION_KEY)
    }
}

impl VersionBackend<MemoryStore> for MemoryKeyBackend {
    fn read_version(&self, tx: &mut MemoryTx<'_>) -> Result<u32, BoxError> {
        let Some(raw) = tx.get(&self.key) else {
            return Ok(0);
        };

        std::str::from_utf8(raw)
            .ok()
            .and_then(|text| text.parse::<u32>().ok())
            .ok_or_else(|| {
                MemoryError::CorruptVersion {
                    key: self.key.clone(),
                    value: String::from_utf8_lossy(raw).into_owned(),
                }
                .into()
            })
    }

    fn write_version(&self, tx: &mut MemoryTx<'_>, version: u32) -> Result<(), BoxError> {
        tx.insert(self.key.as_str(), version.to_string());
        Ok(())
    }
}
