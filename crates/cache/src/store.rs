use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use tracing::trace;

use crate::entry::{Entry, MAX_VALUE_LEN};

/// Structural precondition failures raised by the store itself.
///
/// Protocol-level validation (key charset, oversize key, malformed integers)
/// happens upstream in the codec; by the time a call reaches the store the
/// only thing left to check is whether the value itself is storable at all.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("value must be between 1 and {MAX_VALUE_LEN} bytes, got {0}")]
    InvalidValueLength(usize),
}

/// A bounded, thread-safe, LRU-ordered key/value store.
///
/// Internally this wraps [`lru::LruCache`] behind a single mutex. `LruCache`
/// already implements the hash-map-plus-intrusive-list structure this store
/// needs — one hash lookup plus a constant number of list splices per
/// operation — so there is nothing to gain from hand-rolling the same
/// arena-of-indices list ourselves.
pub struct Store {
    inner: Mutex<LruCache<Vec<u8>, Entry>>,
    capacity: usize,
}

impl Store {
    /// Builds a store with the given fixed capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; a zero-capacity cache can never hold an
    /// entry and is not a configuration this type supports.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("store capacity must be non-zero");
        Store {
            inner: Mutex::new(LruCache::new(capacity)),
            capacity: capacity.get(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<Vec<u8>, Entry>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a fresh entry or overwrites and touches an existing one.
    ///
    /// When the key is new and the store is at capacity, the
    /// least-recently-used entry is evicted first. Updating an existing key
    /// never evicts, even at capacity, since the key already occupies a
    /// slot.
    pub fn insert_or_update(
        &self,
        key: Vec<u8>,
        flags: u16,
        exptime: u32,
        value: Vec<u8>,
    ) -> Result<(), StoreError> {
        if value.is_empty() || value.len() > MAX_VALUE_LEN {
            return Err(StoreError::InvalidValueLength(value.len()));
        }
        let entry = Entry::new(flags, exptime, value);
        let mut guard = self.lock();
        if let Some((displaced_key, _)) = guard.push(key.clone(), entry) {
            if displaced_key != key {
                trace!(key = %String::from_utf8_lossy(&displaced_key), "evicted least-recently-used entry");
            }
        }
        Ok(())
    }

    /// Returns an independent copy of the entry for `key`, touching it.
    ///
    /// The copy lets the caller format a reply, including blocking on
    /// socket I/O, without holding the store's mutex.
    pub fn get(&self, key: &[u8]) -> Option<Entry> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
