//! Store and transaction abstractions.
//!
//! The orchestrator never touches schema contents. All it needs from a
//! persistent store is a way to open a unit of work that can later be
//! committed or rolled back.

/// Boxed error type used by every collaborator trait.
///
/// Backends and scheme callbacks return their own error types boxed, so the
/// orchestrator can hand them back to the caller unchanged.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A persistent store that can open transactions.
pub trait Store {
    /// The transaction handle. Version backends and scheme callbacks operate
    /// on this handle for the whole duration of one `apply` call.
    type Tx<'a>: Transaction
    where
        Self: 'a;

    /// Begin a new transaction.
    fn begin(&mut self) -> Result<Self::Tx<'_>, BoxError>;
}

/// A transaction-scoped unit of work.
///
/// Implementations must roll back when dropped without an explicit
/// [`commit`](Transaction::commit) or [`rollback`](Transaction::rollback).
pub trait Transaction {
    /// Commit all changes made in this transaction.
    fn commit(self) -> Result<(), BoxError>;

    /// Discard all changes made in this transaction.
    fn rollback(self) -> Result<(), BoxError>;
}
