//! Migrator - decides between create, update and no-op, and owns the
//! transaction boundary around the chosen action.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::{DowngradePolicy, MigratorConfig};
use crate::error::ApplyError;
use crate::registry::Registry;
use crate::scheme::{Scheme, VersionBackend};
use crate::store::{Store, Transaction};

/// The action selected for a stored/target version pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    /// No version recorded: build the schema from scratch.
    Create,
    /// Stored version is behind the target.
    Update {
        /// The stored version passed to the update callback.
        from: u32,
    },
    /// Stored version meets or exceeds the target.
    None,
}

impl Action {
    /// Select the action for a stored version and a target version.
    pub fn decide(stored: u32, target: u32) -> Self {
        if stored == 0 {
            Action::Create
        } else if stored < target {
            Action::Update { from: stored }
        } else {
            Action::None
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update { from } => write!(f, "update from v{from}"),
            Action::None => write!(f, "none"),
        }
    }
}

/// Result of a successful [`Migrator::apply`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    /// The create callback ran and `version` was recorded.
    Created {
        /// The recorded version.
        version: u32,
    },
    /// The update callback ran and `to` was recorded.
    Updated {
        /// The previously stored version.
        from: u32,
        /// The recorded version.
        to: u32,
    },
    /// Nothing ran; the stored version already meets the target.
    AlreadyCurrent {
        /// The stored version.
        stored: u32,
        /// The scheme's target version.
        target: u32,
    },
}

impl Outcome {
    /// Whether a callback ran and a version was recorded.
    pub fn changed(&self) -> bool {
        !matches!(self, Outcome::AlreadyCurrent { .. })
    }

    /// The version stored after the call.
    pub fn version(&self) -> u32 {
        match self {
            Outcome::Created { version } => *version,
            Outcome::Updated { to, .. } => *to,
            Outcome::AlreadyCurrent { stored, .. } => *stored,
        }
    }
}

/// Result of [`Migrator::plan`]: what `apply` would do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MigrationPlan {
    /// Strategy the scheme resolved to.
    pub strategy: String,
    /// Currently stored version (0 if none).
    pub stored_version: u32,
    /// The scheme's target version.
    pub target_version: u32,
    /// The action `apply` would take.
    pub action: Action,
}

impl MigrationPlan {
    /// Whether the stored version is newer than the target.
    pub fn is_downgrade(&self) -> bool {
        self.stored_version > self.target_version
    }

    /// Whether `apply` would run a callback.
    pub fn needs_migration(&self) -> bool {
        self.action != Action::None
    }
}

/// Applies schemes to stores, one create-or-update transition per call.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use versiondb_core::memory::{MemoryKeyBackend, MemoryStore, MemoryTx};
/// use versiondb_core::{BoxError, Migrator, Outcome, Registry, Scheme};
///
/// struct Settings;
///
/// impl Scheme<MemoryStore> for Settings {
///     fn version(&self) -> u32 { 1 }
///     fn strategy(&self) -> &str { "memory" }
///     fn on_create(&self, tx: &mut MemoryTx<'_>) -> Result<(), BoxError> {
///         tx.insert("settings/theme", "dark");
///         Ok(())
///     }
///     fn on_update(&self, _tx: &mut MemoryTx<'_>, _old: u32) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
///
/// let registry = Arc::new(Registry::<MemoryStore>::new());
/// registry.register("memory", Arc::new(MemoryKeyBackend::default()));
///
/// let migrator = Migrator::new(registry);
/// let mut store = MemoryStore::new();
///
/// assert_eq!(migrator.apply(&mut store, &Settings).unwrap(), Outcome::Created { version: 1 });
/// assert!(!migrator.apply(&mut store, &Settings).unwrap().changed());
/// ```
pub struct Migrator<S: Store> {
    registry: Arc<Registry<S>>,
    config: MigratorConfig,
}

impl<S: Store> Migrator<S> {
    /// Create a migrator with the default configuration.
    pub fn new(registry: Arc<Registry<S>>) -> Self {
        Self::with_config(registry, MigratorConfig::default())
    }

    /// Create a migrator with a custom configuration.
    pub fn with_config(registry: Arc<Registry<S>>, config: MigratorConfig) -> Self {
        Self { registry, config }
    }

    /// The registry backends are resolved from.
    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    /// The active configuration.
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Bring `store` to the scheme's target version.
    ///
    /// Reads the stored version, runs at most one callback, records the
    /// target version and commits, all inside one transaction. Any failure
    /// rolls the transaction back, so the stored version is left as it was.
    #[instrument(skip_all, fields(strategy = scheme.strategy(), target = scheme.version()))]
    pub fn apply<C>(&self, store: &mut S, scheme: &C) -> Result<Outcome, ApplyError>
    where
        C: Scheme<S> + ?Sized,
    {
        let (backend, target) = self.resolve(scheme)?;

        let mut tx = store.begin().map_err(ApplyError::Begin)?;

        let stored = match backend.read_version(&mut tx) {
            Ok(version) => version,
            Err(source) => {
                let err = ApplyError::ReadVersion {
                    strategy: scheme.strategy().to_string(),
                    source,
                };
                return Err(Self::abort(tx, err));
            }
        };
        debug!(stored, "read stored version");

        let (outcome, result) = match Action::decide(stored, target) {
            Action::None => {
                if let Err(err) = self.check_downgrade(stored, target) {
                    return Err(Self::abort(tx, err));
                }
                Self::release(tx);
                debug!(stored, "schema already current");
                return Ok(Outcome::AlreadyCurrent { stored, target });
            }
            Action::Create => (
                Outcome::Created { version: target },
                scheme
                    .on_create(&mut tx)
                    .map_err(|source| ApplyError::Create {
                        version: target,
                        source,
                    }),
            ),
            Action::Update { from } => (
                Outcome::Updated { from, to: target },
                scheme
                    .on_update(&mut tx, from)
                    .map_err(|source| ApplyError::Update {
                        from,
                        to: target,
                        source,
                    }),
            ),
        };

        if let Err(err) = result {
            return Err(Self::abort(tx, err));
        }

        if let Err(source) = backend.write_version(&mut tx, target) {
            let err = ApplyError::WriteVersion {
                version: target,
                source,
            };
            return Err(Self::abort(tx, err));
        }

        if self.config.dry_run {
            Self::release(tx);
            info!(?outcome, "dry run complete, changes rolled back");
            return Ok(outcome);
        }

        tx.commit().map_err(ApplyError::Commit)?;
        info!(?outcome, "schema version committed");

        Ok(outcome)
    }

    /// Report what [`apply`](Self::apply) would do, without running any
    /// callback. The transaction used to read the version is always rolled
    /// back.
    #[instrument(skip_all, fields(strategy = scheme.strategy(), target = scheme.version()))]
    pub fn plan<C>(&self, store: &mut S, scheme: &C) -> Result<MigrationPlan, ApplyError>
    where
        C: Scheme<S> + ?Sized,
    {
        let (backend, target) = self.resolve(scheme)?;

        let mut tx = store.begin().map_err(ApplyError::Begin)?;

        let stored = match backend.read_version(&mut tx) {
            Ok(version) => version,
            Err(source) => {
                let err = ApplyError::ReadVersion {
                    strategy: scheme.strategy().to_string(),
                    source,
                };
                return Err(Self::abort(tx, err));
            }
        };
        Self::release(tx);

        let plan = MigrationPlan {
            strategy: scheme.strategy().to_string(),
            stored_version: stored,
            target_version: target,
            action: Action::decide(stored, target),
        };
        debug!(stored, action = %plan.action, "planned migration");

        Ok(plan)
    }

    /// Validate the scheme and resolve its backend. Opens nothing.
    fn resolve<C>(&self, scheme: &C) -> Result<(Arc<dyn VersionBackend<S>>, u32), ApplyError>
    where
        C: Scheme<S> + ?Sized,
    {
        let target = scheme.version();
        if target < 1 {
            return Err(ApplyError::InvalidVersion { version: target });
        }

        let name = scheme.strategy();
        let backend = self
            .registry
            .lookup(name)
            .ok_or_else(|| ApplyError::UnknownStrategy {
                name: name.to_string(),
            })?;

        Ok((backend, target))
    }

    fn check_downgrade(&self, stored: u32, target: u32) -> Result<(), ApplyError> {
        if stored <= target {
            return Ok(());
        }

        match self.config.downgrade {
            DowngradePolicy::Ignore => Ok(()),
            DowngradePolicy::Warn => {
                warn!(stored, target, "stored version is newer than target, leaving it as is");
                Ok(())
            }
            DowngradePolicy::Reject => Err(ApplyError::Downgrade { stored, target }),
        }
    }

    /// Roll back after a failure. A rollback error is logged; the original
    /// error is what the caller gets.
    fn abort<'a>(tx: S::Tx<'a>, err: ApplyError) -> ApplyError
    where
        S: 'a,
    {
        if let Err(rollback_err) = tx.rollback() {
            warn!(
                phase = %err.phase(),
                error = %rollback_err,
                "rollback failed after migration error"
            );
        }
        err
    }

    /// Roll back a transaction that made no changes worth keeping.
    fn release<'a>(tx: S::Tx<'a>)
    where
        S: 'a,
    {
        if let Err(err) = tx.rollback() {
            warn!(error = %err, "failed to roll back transaction");
        }
    }
}

impl<S: Store> Clone for Migrator<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}
