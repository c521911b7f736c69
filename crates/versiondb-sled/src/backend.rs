//! Version backend storing the schema version under a reserved key.

use tracing::debug;
use versiondb_core::{BoxError, VersionBackend};

use crate::error::SledError;
use crate::store::{SledStore, SledTx};

/// Key the version is stored under unless configured otherwise.
pub const DEFAULT_VERSION_KEY: &[u8] = b"__versiondb:schema_version";

/// Stores the version as a 4-byte big-endian `u32` under one key of the
/// store's tree. A missing key reads as version 0.
#[derive(Debug, Clone)]
pub struct SledKeyBackend {
    key: Vec<u8>,
}

impl SledKeyBackend {
    /// Create a backend using a custom key.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// The key the version lives under.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    fn decode(&self, bytes: &[u8]) -> Result<u32, SledError> {
        let raw: [u8; 4] = bytes.try_into().map_err(|_| SledError::CorruptVersion {
            key: hex::encode(&self.key),
            len: bytes.len(),
        })?;
        Ok(u32::from_be_bytes(raw))
    }
}

impl Default for SledKeyBackend {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION_KEY)
    }
}

impl VersionBackend<SledStore> for SledKeyBackend {
    fn read_version(&self, tx: &mut SledTx<'_>) -> Result<u32, BoxError> {
        let version = match tx.get(&self.key)? {
            Some(bytes) => self.decode(&bytes)?,
            None => 0,
        };
        debug!(version, "read version key");
        Ok(version)
    }

    fn write_version(&self, tx: &mut SledTx<'_>, version: u32) -> Result<(), BoxError> {
        tx.insert(&self.key, version.to_be_bytes().to_vec());
        Ok(())
    }
}
