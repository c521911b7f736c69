//! sled store with buffered, conflict-checked transactions.

use std::collections::HashMap;

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Tree};
use tracing::{debug, warn};
use versiondb_core::{BoxError, Store, Transaction};

use crate::config::SledConfig;
use crate::error::SledError;

/// A store backed by one sled tree.
///
/// Cloning is cheap and yields another handle to the same database.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
    flush_on_commit: bool,
}

impl SledStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: SledConfig) -> Result<Self, SledError> {
        let db = config.to_sled_config().open()?;
        let tree = db.open_tree(&config.tree)?;

        Ok(Self {
            db,
            tree,
            flush_on_commit: config.flush_on_commit,
        })
    }

    /// Open a temporary store, deleted on drop.
    pub fn temporary() -> Result<Self, SledError> {
        Self::open(SledConfig::temporary())
    }

    /// The underlying database.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// The tree transactions operate on.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Read a committed value.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>, SledError> {
        Ok(self.tree.get(key)?.map(|value| value.to_vec()))
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }
}

impl Store for SledStore {
    type Tx<'a> = SledTx<'a>;

    fn begin(&mut self) -> Result<SledTx<'_>, BoxError> {
        debug!(tree = %String::from_utf8_lossy(&self.tree.name()), "sled transaction started");
        Ok(SledTx::new(self))
    }
}

/// A pending operation in a transaction.
#[derive(Debug, Clone)]
enum TxOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Remove { key: Vec<u8> },
}

/// A transaction over a [`SledStore`].
///
/// Operations are collected and executed atomically on commit. Every key
/// read is remembered with the value seen; commit fails with
/// [`SledError::Conflict`] if any of them changed in the meantime.
pub struct SledTx<'a> {
    store: &'a SledStore,
    ops: Vec<TxOp>,
    /// Keys read from the tree with the value observed.
    read_set: HashMap<Vec<u8>, Option<IVec>>,
    /// Uncommitted writes; `None` marks a removal.
    write_cache: HashMap<Vec<u8>, Option<Vec<u8>>>,
    finished: bool,
}

impl<'a> SledTx<'a> {
    fn new(store: &'a SledStore) -> Self {
        Self {
            store,
            ops: Vec::new(),
            read_set: HashMap::new(),
            write_cache: HashMap::new(),
            finished: false,
        }
    }

    /// Read a value, including uncommitted writes from this transaction.
    pub fn get(&mut self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>, SledError> {
        let key = key.as_ref();
        if let Some(cached) = self.write_cache.get(key) {
            return Ok(cached.clone());
        }

        let value = self.store.tree.get(key)?;
        self.read_set
            .entry(key.to_vec())
            .or_insert_with(|| value.clone());

        Ok(value.map(|value| value.to_vec()))
    }

    /// Queue a write.
    pub fn insert(&mut self, key: impl AsRef<[u8]>, value: impl Into<Vec<u8>>) -> &mut Self {
        let key = key.as_ref().to_vec();
        let value = value.into();
        self.write_cache.insert(key.clone(), Some(value.clone()));
        self.ops.push(TxOp::Insert { key, value });
        self
    }

    /// Queue a removal.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        let key = key.as_ref().to_vec();
        self.write_cache.insert(key.clone(), None);
        self.ops.push(TxOp::Remove { key });
        self
    }

    /// Get the number of pending operations.
    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Validate the read set and apply all operations in one sled
    /// transaction.
    fn apply(&self) -> Result<(), SledError> {
        let result: Result<(), TransactionError<SledError>> =
            self.store.tree.transaction(|tx_tree| {
                for (key, seen) in &self.read_set {
                    if tx_tree.get(key)? != *seen {
                        return Err(ConflictableTransactionError::Abort(SledError::Conflict {
                            key: hex::encode(key),
                        }));
                    }
                }

                for op in &self.ops {
                    match op {
                        TxOp::Insert { key, value } => {
                            tx_tree.insert(key.as_slice(), value.as_slice())?;
                        }
                        TxOp::Remove { key } => {
                            tx_tree.remove(key.as_slice())?;
                        }
                    }
                }
                Ok(())
            });

        match result {
            Ok(()) => {}
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(SledError::Storage(e)),
        }

        if self.store.flush_on_commit {
            log_flush(self.store.tree.flush());
        }

        Ok(())
    }
}

/// Report the outcome of a post-commit flush. The transaction is already
/// applied at this point, so a failure only leaves it waiting for the next
/// background flush and must not fail the commit. Returns whether the flush
/// succeeded.
fn log_flush(result: sled::Result<usize>) -> bool {
    match result {
        Ok(bytes) => {
            debug!(bytes, "flushed after commit");
            true
        }
        Err(e) => {
            warn!(error = %e, "flush after commit failed, changes are applied but not yet durable");
            false
        }
    }
}

impl Transaction for SledTx<'_> {
    fn commit(mut self) -> Result<(), BoxError> {
        self.finished = true;
        self.apply()?;
        debug!(operations = self.ops.len(), "sled transaction committed");
        Ok(())
    }

    fn rollback(mut self) -> Result<(), BoxError> {
        self.finished = true;
        debug!(operations = self.ops.len(), "sled transaction rolled back");
        Ok(())
    }
}

impl Drop for SledTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(operations = self.ops.len(), "sled transaction dropped, discarding");
        }
    }
}
