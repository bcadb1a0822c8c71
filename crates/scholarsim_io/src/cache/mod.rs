//! The cache gateway and the key-value stores behind it.

pub mod codec;
pub mod gateway;
pub mod keys;
pub mod memory;
pub mod sqlite;

pub use codec::{CacheEntry, FORMAT_VERSION};
pub use gateway::{CacheGateway, CachedState, Loaded, StateLoad, StateVersions};
pub use keys::{CacheKeys, SimulationData, SIMULATION_DATA};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;

/// Monotonic per-key version stamp. The first write of a key yields 1.
pub type Version = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedBlob {
    pub version: Version,
    pub bytes: Vec<u8>,
}

/// Precondition a write places on the current version of its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Overwrite whatever is there.
    Any,
    /// The key must not exist.
    Absent,
    /// The key must still carry this version.
    Version(Version),
}

impl Expect {
    #[must_use]
    pub fn admits(self, current: Option<Version>) -> bool {
        match self {
            Expect::Any => true,
            Expect::Absent => current.is_none(),
            Expect::Version(v) => current == Some(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobWrite {
    pub key: String,
    pub bytes: Vec<u8>,
    pub expected: Expect,
}

/// Byte store the gateway persists through.
///
/// `get` distinguishes absence (`Ok(None)`) from failure (`Err`). `set_many`
/// applies all writes or none: if any precondition fails the call returns
/// [`crate::StoreError::Conflict`] and nothing changes.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<VersionedBlob>>;

    /// Returns the new version of each key, in write order.
    fn set_many(&self, writes: Vec<BlobWrite>) -> Result<Vec<Version>>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> Result<bool>;

    fn set(&self, key: &str, bytes: Vec<u8>) -> Result<Version> {
        let versions = self.set_many(vec![BlobWrite {
            key: key.to_string(),
            bytes,
            expected: Expect::Any,
        }])?;
        Ok(versions.first().copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_admits() {
        assert!(Expect::Any.admits(None));
        assert!(Expect::Any.admits(Some(3)));
        assert!(Expect::Absent.admits(None));
        assert!(!Expect::Absent.admits(Some(1)));
        assert!(Expect::Version(2).admits(Some(2)));
        assert!(!Expect::Version(2).admits(Some(3)));
        assert!(!Expect::Version(2).admits(None));
    }
}
