//! Ordered byte-string key-value stores
//!
//! The cache engine only needs point reads, overwriting writes and an ordered
//! walk over all entries. [`Store`] captures that, with two implementations:
//!
//! - [`LmdbStore`]: durable store in an LMDB environment on disk
//! - [`MemoryStore`]: `BTreeMap`-backed store for tests and throwaway caches

mod lmdb;
mod memory;

pub use lmdb::LmdbStore;
pub use memory::MemoryStore;

use crate::error::{Result, StoreError};

/// An ordered key-value map of byte strings
///
/// Individual `get` and `put` calls are atomic; nothing spans several calls.
pub trait Store {
    /// Reads the value stored under `key`
    ///
    /// Returns `Ok(None)` when the key is absent, which is distinct from a
    /// failed read.
    fn get(&self, key: &[u8]) -> std::result::Result<Option<Vec<u8>>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value
    fn put(&self, key: &[u8], value: &[u8]) -> std::result::Result<(), StoreError>;

    /// Walks all entries in ascending key order
    ///
    /// Each call starts a fresh walk. Entries are handed to `visit` one at a
    /// time; an error returned by `visit` stops the walk and is returned.
    fn for_each(&self, visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()>;

    /// Releases the store. Consuming `self` rules out use after close.
    fn close(self) -> std::result::Result<(), StoreError>
    where
        Self: Sized;
}
