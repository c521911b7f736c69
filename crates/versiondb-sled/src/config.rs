//! sled store configuration.

use std::path::PathBuf;

/// Default tree schemes and the version backend write to.
pub const DEFAULT_TREE: &str = "data";

/// Configuration for [`SledStore`](crate::SledStore).
#[derive(Debug, Clone)]
pub struct SledConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Name of the tree transactions operate on.
    pub tree: String,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None disables background flushing.
    pub flush_every_ms: Option<u64>,

    /// Flush to disk after every committed transaction. This only narrows
    /// the window before the background flush; a failed flush is logged and
    /// the commit still succeeds.
    pub flush_on_commit: bool,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,
}

impl Default for SledConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./versiondb_data"),
            tree: DEFAULT_TREE.to_string(),
            cache_capacity: 64 * 1024 * 1024, // 64MB
            flush_every_ms: Some(1000),
            flush_on_commit: true,
            compression: false,
            temporary: false,
        }
    }
}

impl SledConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            flush_on_commit: false,
            ..Default::default()
        }
    }

    /// Set the tree name.
    pub fn with_tree(mut self, tree: impl Into<String>) -> Self {
        self.tree = tree.into();
        self
    }

    /// Set the page cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Set the background flush interval.
    pub fn with_flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }

    /// Set whether every commit is flushed to disk.
    pub fn with_flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_every_ms);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        config
    }
}
