//! Version backend and scheme traits.

use crate::store::{BoxError, Store};

/// Reads and writes the schema version of a store.
///
/// A backend decides how the version is encoded (a side table, a pragma, a
/// reserved key...). Both operations run on the transaction opened by the
/// orchestrator, so the version write commits or rolls back together with
/// the scheme's own changes.
///
/// A stored version of `0` means no version has been recorded yet.
pub trait VersionBackend<S: Store>: Send + Sync {
    /// Read the currently stored version.
    fn read_version(&self, tx: &mut S::Tx<'_>) -> Result<u32, BoxError>;

    /// Record `version` as the stored version.
    fn write_version(&self, tx: &mut S::Tx<'_>, version: u32) -> Result<(), BoxError>;
}

/// A caller-defined migratable unit.
///
/// # Example
///
/// ```
/// use versiondb_core::memory::{MemoryStore, MemoryTx};
/// use versiondb_core::{BoxError, Scheme};
///
/// struct Accounts;
///
/// impl Scheme<MemoryStore> for Accounts {
///     fn version(&self) -> u32 {
///         2
///     }
///
///     fn strategy(&self) -> &str {
///         "memory"
///     }
///
///     fn on_create(&self, tx: &mut MemoryTx<'_>) -> Result<(), BoxError> {
///         tx.insert("accounts/layout", "v2");
///         Ok(())
///     }
///
///     fn on_update(&self, tx: &mut MemoryTx<'_>, _old_version: u32) -> Result<(), BoxError> {
///         tx.insert("accounts/layout", "v2");
///         Ok(())
///     }
/// }
/// ```
pub trait Scheme<S: Store> {
    /// Target version. Must be at least 1.
    fn version(&self) -> u32;

    /// Name of the registered version backend to use.
    fn strategy(&self) -> &str;

    /// Build the schema from scratch. Called when no version is recorded.
    fn on_create(&self, tx: &mut S::Tx<'_>) -> Result<(), BoxError>;

    /// Upgrade the schema from `old_version` to [`version`](Scheme::version).
    fn on_update(&self, tx: &mut S::Tx<'_>, old_version: u32) -> Result<(), BoxError>;
}
