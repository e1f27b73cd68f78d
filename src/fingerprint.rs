//! Source fingerprints, used to decide whether an imported asset is stale.

use std::path::Path;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::errors::Result;
use crate::io::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FingerprintPolicy {
    /// xxh3-64 of the file contents. Survives touches and checkouts.
    #[default]
    ContentHash,
    /// Modification time in milliseconds since the epoch. Cheap, no read.
    ModifiedTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "policy", content = "value")]
pub enum Fingerprint {
    ContentHash(u64),
    ModifiedTime(u64),
}

impl Fingerprint {
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::ContentHash(xxh3_64(bytes))
    }

    /// Computes the fingerprint of `path` under `policy`.
    pub fn compute(fs: &dyn FileSystem, path: &Path, policy: FingerprintPolicy) -> Result<Self> {
        match policy {
            FingerprintPolicy::ContentHash => Ok(Self::of_bytes(&fs.load(path)?)),
            FingerprintPolicy::ModifiedTime => Ok(Self::ModifiedTime(fs.modified_millis(path)?)),
        }
    }

    #[must_use]
    pub fn policy(self) -> FingerprintPolicy {
        match self {
            Self::ContentHash(_) => FingerprintPolicy::ContentHash,
            Self::ModifiedTime(_) => FingerprintPolicy::ModifiedTime,
        }
    }
}
