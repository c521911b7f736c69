//! VersionDB - versioned schema create/update for embedded stores.
//!
//! A [`Scheme`] names a target version, a version strategy, and two
//! callbacks. [`Migrator::apply`] reads the version the store currently
//! holds and, inside one transaction, either creates the schema, updates it
//! from the stored version, or leaves it alone:
//!
//! ```
//! use std::sync::Arc;
//! use versiondb::memory::{MemoryKeyBackend, MemoryStore, MemoryTx};
//! use versiondb::prelude::*;
//!
//! struct Catalog;
//!
//! impl Scheme<MemoryStore> for Catalog {
//!     fn version(&self) -> u32 { 2 }
//!     fn strategy(&self) -> &str { "memory" }
//!     fn on_create(&self, tx: &mut MemoryTx<'_>) -> Result<(), BoxError> {
//!         tx.insert("catalog/items", "id,title,price");
//!         Ok(())
//!     }
//!     fn on_update(&self, tx: &mut MemoryTx<'_>, old: u32) -> Result<(), BoxError> {
//!         if old < 2 {
//!             tx.insert("catalog/items", "id,title,price");
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let registry = Arc::new(Registry::<MemoryStore>::new());
//! registry.register("memory", Arc::new(MemoryKeyBackend::default()));
//! let migrator = Migrator::new(registry);
//!
//! let mut store = MemoryStore::new();
//! let plan = migrator.plan(&mut store, &Catalog).unwrap();
//! assert_eq!(plan.action, Action::Create);
//!
//! let outcome = migrator.apply(&mut store, &Catalog).unwrap();
//! assert_eq!(outcome, Outcome::Created { version: 2 });
//! ```
//!
//! # Features
//!
//! - `sled`: the sled store, as `versiondb::sled_store`.
//! - `sqlite`: the SQLite store, as `versiondb::sqlite`.
//! - `serde`: `Serialize`/`Deserialize` for configs, plans and outcomes.

pub use versiondb_core::{
    config, error, memory, migrator, registry, scheme, store, Action, ApplyError, BoxError,
    DowngradePolicy, MigrationPlan, Migrator, MigratorConfig, Outcome, Phase, Registry, Scheme,
    Store, Transaction, VersionBackend,
};

#[cfg(feature = "sled")]
pub use versiondb_sled as sled_store;

#[cfg(feature = "sqlite")]
pub use versiondb_sqlite as sqlite;

/// Everything needed to define and apply a scheme.
pub mod prelude {
    pub use versiondb_core::{
        Action, ApplyError, BoxError, Migrator, MigratorConfig, Outcome, Registry, Scheme, Store,
        Transaction, VersionBackend,
    };
}
