//! VersionDB Core - schema version registry and migrator.
//!
//! Given a store at some stored schema version and a [`Scheme`] describing a
//! target version plus create/update callbacks, the [`Migrator`] decides,
//! once and atomically, whether to create, update, or do nothing:
//!
//! | Stored version | Action | Callback |
//! |----------------|--------|----------|
//! | `0` | create | [`Scheme::on_create`] |
//! | `1..target` | update | [`Scheme::on_update`] |
//! | `>= target` | none | - |
//!
//! The version is read, the callback runs, and the new version is written
//! inside a single store transaction. The version changes only if all of
//! them succeed and the transaction commits.
//!
//! Version backends are looked up by name in a [`Registry`], so a scheme
//! only names the strategy it wants (`"side_table"`, `"user_version"`, ...).

pub mod config;
pub mod error;
pub mod memory;
pub mod migrator;
pub mod registry;
pub mod scheme;
pub mod store;

pub use config::{DowngradePolicy, MigratorConfig};
pub use error::{ApplyError, Phase};
pub use migrator::{Action, MigrationPlan, Migrator, Outcome};
pub use registry::Registry;
pub use scheme::{Scheme, VersionBackend};
pub use store::{BoxError, Store, Transaction};
