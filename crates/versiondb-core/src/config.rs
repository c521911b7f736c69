//! Migrator configuration.

/// What to do when the stored version is newer than the scheme's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DowngradePolicy {
    /// Treat it as already current, silently.
    Ignore,
    /// Treat it as already current and emit a warning.
    #[default]
    Warn,
    /// Roll back and return [`ApplyError::Downgrade`](crate::ApplyError::Downgrade).
    Reject,
}

/// Migrator configuration.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MigratorConfig {
    /// Handling of stored versions newer than the target.
    pub downgrade: DowngradePolicy,

    /// Run callbacks and the version write, then roll back instead of
    /// committing.
    pub dry_run: bool,
}

impl MigratorConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the downgrade policy.
    pub fn with_downgrade(mut self, policy: DowngradePolicy) -> Self {
        self.downgrade = policy;
        self
    }

    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
