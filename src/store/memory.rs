//! In-memory [`Store`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::Store;
use crate::error::{Result, StoreError};

/// Volatile store keeping entries in a `BTreeMap`
///
/// Iteration order matches an on-disk ordered store: ascending bytes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> std::result::Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn for_each(&self, visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        // Snapshot first so the visitor may call back into the store
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = {
            let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        for (key, value) in &snapshot {
            visit(key, value)?;
        }
        Ok(())
    }

    fn close(self) -> std::result::Result<(), StoreError> {
        Ok(())
    }
}
