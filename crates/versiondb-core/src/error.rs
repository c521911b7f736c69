//! Orchestrator error types.

use thiserror::Error;

use crate::store::BoxError;

/// The phase of an `apply` call an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Input validation, before any transaction is opened.
    Validate,
    /// Opening the transaction.
    Begin,
    /// Reading the stored version.
    ReadVersion,
    /// Choosing between create, update and no-op.
    Decide,
    /// Running the scheme's create callback.
    Create,
    /// Running the scheme's update callback.
    Update,
    /// Recording the new version.
    WriteVersion,
    /// Committing the transaction.
    Commit,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Validate => write!(f, "validate"),
            Phase::Begin => write!(f, "begin"),
            Phase::ReadVersion => write!(f, "read_version"),
            Phase::Decide => write!(f, "decide"),
            Phase::Create => write!(f, "create"),
            Phase::Update => write!(f, "update"),
            Phase::WriteVersion => write!(f, "write_version"),
            Phase::Commit => write!(f, "commit"),
        }
    }
}

/// Errors returned by [`Migrator::apply`](crate::Migrator::apply) and
/// [`Migrator::plan`](crate::Migrator::plan).
///
/// Every variant that wraps an underlying failure exposes it unchanged as
/// [`std::error::Error::source`]; [`ApplyError::into_source`] hands the
/// original boxed error back.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The scheme's target version is below 1.
    #[error("invalid target version {version}: must be at least 1")]
    InvalidVersion {
        /// The rejected version.
        version: u32,
    },

    /// No backend is registered under the scheme's strategy name.
    #[error("unknown version strategy {name:?} (is its backend registered?)")]
    UnknownStrategy {
        /// The unresolved strategy name.
        name: String,
    },

    /// The store failed to open a transaction.
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] BoxError),

    /// The backend failed to report the stored version.
    #[error("failed to read stored version via strategy {strategy:?}: {source}")]
    ReadVersion {
        /// The strategy whose backend failed.
        strategy: String,
        /// The backend's error.
        #[source]
        source: BoxError,
    },

    /// The scheme's create callback failed.
    #[error("create to version {version} failed: {source}")]
    Create {
        /// The target version.
        version: u32,
        /// The callback's error.
        #[source]
        source: BoxError,
    },

    /// The scheme's update callback failed.
    #[error("update from version {from} to {to} failed: {source}")]
    Update {
        /// The stored version.
        from: u32,
        /// The target version.
        to: u32,
        /// The callback's error.
        #[source]
        source: BoxError,
    },

    /// The backend failed to record the new version.
    #[error("failed to record version {version}: {source}")]
    WriteVersion {
        /// The version being recorded.
        version: u32,
        /// The backend's error.
        #[source]
        source: BoxError,
    },

    /// The store failed to commit the transaction.
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] BoxError),

    /// The stored version is newer than the target and the migrator is
    /// configured with [`DowngradePolicy::Reject`](crate::DowngradePolicy::Reject).
    #[error("stored version {stored} is newer than target version {target}")]
    Downgrade {
        /// The stored version.
        stored: u32,
        /// The target version.
        target: u32,
    },
}

impl ApplyError {
    /// The phase this error was raised in.
    pub fn phase(&self) -> Phase {
        match self {
            ApplyError::InvalidVersion { .. } | ApplyError::UnknownStrategy { .. } => {
                Phase::Validate
            }
            ApplyError::Begin(_) => Phase::Begin,
            ApplyError::ReadVersion { .. } => Phase::ReadVersion,
            ApplyError::Downgrade { .. } => Phase::Decide,
            ApplyError::Create { .. } => Phase::Create,
            ApplyError::Update { .. } => Phase::Update,
            ApplyError::WriteVersion { .. } => Phase::WriteVersion,
            ApplyError::Commit(_) => Phase::Commit,
        }
    }

    /// Whether the error was raised before any transaction was opened.
    pub fn is_validation(&self) -> bool {
        self.phase() == Phase::Validate
    }

    /// Take the underlying collaborator error, if there is one.
    pub fn into_source(self) -> Option<BoxError> {
        match self {
            ApplyError::Begin(source)
            | ApplyError::Commit(source)
            | ApplyError::ReadVersion { source, .. }
            | ApplyError::Create { source, .. }
            | ApplyError::Update { source, .. }
            | ApplyError::WriteVersion { source, .. } => Some(source),
            ApplyError::InvalidVersion { .. }
            | ApplyError::UnknownStrategy { .. }
            | ApplyError::Downgrade { .. } => None,
        }
    }
}
