use super::{BlobWrite, KeyValueStore, Version, VersionedBlob};
use crate::error::{Result, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Process-local store. Can be switched into an unreachable mode to exercise
/// failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, VersionedBlob>>,
    unreachable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("memory store marked unreachable"));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, VersionedBlob>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::backend("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<VersionedBlob>> {
        self.check_reachable()?;
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_many(&self, writes: Vec<BlobWrite>) -> Result<Vec<Version>> {
        self.check_reachable()?;
        let mut entries = self.lock()?;

        for write in &writes {
            let current = entries.get(&write.key).map(|b| b.version);
            if !write.expected.admits(current) {
                return Err(StoreError::conflict(&write.key));
            }
        }

        let mut versions = Vec::with_capacity(writes.len());
        for write in writes {
            let version = entries.get(&write.key).map_or(1, |b| b.version + 1);
            entries.insert(
                write.key,
                VersionedBlob {
                    version,
                    bytes: write.bytes,
                },
            );
            versions.push(version);
        }
        Ok(versions)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.lock()?.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Expect;

    fn write(key: &str, expected: Expect) -> BlobWrite {
        BlobWrite {
            key: key.to_string(),
            bytes: vec![1, 2, 3],
            expected,
        }
    }

    #[test]
    fn test_versions_increase() {
        let store = MemoryStore::new();
        assert_eq!(store.set("a", vec![1]).unwrap(), 1);
        assert_eq!(store.set("a", vec![2]).unwrap(), 2);
        assert_eq!(store.get("a").unwrap().unwrap().bytes, vec![2]);
        assert!(store.get("b").unwrap().is_none());
    }

    #[test]
    fn test_set_many_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.set("a", vec![0]).unwrap();
        let err = store
            .set_many(vec![write("b", Expect::Absent), write("a", Expect::Version(7))])
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(store.get("b").unwrap().is_none());
        assert_eq!(store.get("a").unwrap().unwrap().version, 1);
    }

    #[test]
    fn test_unreachable_is_error_not_absence() {
        let store = MemoryStore::new();
        store.set_unreachable(true);
        assert!(matches!(store.get("a"), Err(StoreError::Unavailable(_))));
        store.set_unreachable(false);
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        store.set("a", vec![0]).unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert!(store.is_empty());
    }
}
