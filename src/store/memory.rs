//! In-Process Hash Store
//!
//! A thread-safe, sharded map from key to field map. It backs
//! `--memory-store` runs and the test suite, giving the same semantics as
//! the hash commands of a Redis-compatible server.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MemoryStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are hashed onto shards so workers touching different books rarely
//! contend on the same lock.

use super::{FieldMap, StoreConnection, StoreError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of shards. Workers are few, so a small count is plenty.
const NUM_SHARDS: usize = 16;

type Shard = RwLock<HashMap<String, FieldMap>>;

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub keys: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
}

/// Sharded in-memory hash store.
///
/// # Example
///
/// ```
/// use bookshelf::store::MemoryStore;
///
/// let store = MemoryStore::new();
/// store.hset("book:1", &[("title", "Dune"), ("price", "9.99")]);
/// assert_eq!(store.hgetall("book:1").unwrap()["title"], "Dune");
/// assert_eq!(store.del("book:1"), 1);
/// assert!(!store.exists("book:1"));
/// ```
pub struct MemoryStore {
    shards: Vec<Shard>,
    key_count: AtomicU64,
    read_count: AtomicU64,
    write_count: AtomicU64,
    delete_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("keys", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            key_count: AtomicU64::new(0),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            delete_count: AtomicU64::new(0),
        }
    }

    /// Opens a connection handle onto this store.
    pub fn connect(self: &Arc<Self>) -> MemoryConnection {
        MemoryConnection {
            store: Arc::clone(self),
        }
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Sets every field in `fields`, creating the key if needed.
    /// Returns the number of fields that did not exist before.
    pub fn hset(&self, key: &str, fields: &[(&str, &str)]) -> usize {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let mut shard = self.shard(key).write();
        let entry = shard.entry(key.to_string()).or_insert_with(|| {
            self.key_count.fetch_add(1, Ordering::Relaxed);
            FieldMap::new()
        });

        let mut added = 0;
        for (field, value) in fields {
            if entry.insert(field.to_string(), value.to_string()).is_none() {
                added += 1;
            }
        }
        added
    }

    pub fn hgetall(&self, key: &str) -> Option<FieldMap> {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        self.shard(key).read().get(key).cloned()
    }

    /// Removes `key`; returns 1 if it existed, 0 otherwise.
    pub fn del(&self, key: &str) -> u64 {
        self.delete_count.fetch_add(1, Ordering::Relaxed);

        if self.shard(key).write().remove(key).is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            1
        } else {
            0
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        self.shard(key).read().contains_key(key)
    }

    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            keys: self.key_count.load(Ordering::Relaxed),
            reads: self.read_count.load(Ordering::Relaxed),
            writes: self.write_count.load(Ordering::Relaxed),
            deletes: self.delete_count.load(Ordering::Relaxed),
        }
    }
}

/// A [`StoreConnection`] onto a shared [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    store: Arc<MemoryStore>,
}

impl StoreConnection for MemoryConnection {
    fn upsert_fields(&mut self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        self.store.hset(key, fields);
        Ok(())
    }

    fn get_all_fields(&mut self, key: &str) -> Result<Option<FieldMap>, StoreError> {
        Ok(self.store.hgetall(key))
    }

    fn set_field(&mut self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.store.hset(key, &[(field, value)]);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<u64, StoreError> {
        Ok(self.store.del(key))
    }

    fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.store.exists(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_hset_creates_and_merges() {
        let store = MemoryStore::new();

        assert_eq!(store.hset("book:1", &[("title", "A"), ("price", "1.00")]), 2);
        assert_eq!(store.hset("book:1", &[("price", "2.00"), ("author", "B")]), 1);

        let fields = store.hgetall("book:1").unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["price"], "2.00");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_key() {
        let store = MemoryStore::new();
        assert!(store.hgetall("book:404").is_none());
        assert!(!store.exists("book:404"));
        assert_eq!(store.del("book:404"), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_removes_key() {
        let store = MemoryStore::new();
        store.hset("book:2", &[("title", "T")]);

        assert!(store.exists("book:2"));
        assert_eq!(store.del("book:2"), 1);
        assert!(!store.exists("book:2"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_connection_trait_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let mut conn = store.connect();

        conn.upsert_fields("book:3", &[("title", "X")]).unwrap();
        conn.set_field("book:3", "price", "4.50").unwrap();

        let fields = conn.get_all_fields("book:3").unwrap().unwrap();
        assert_eq!(fields["price"], "4.50");
        assert!(conn.exists("book:3").unwrap());
        assert_eq!(conn.delete("book:3").unwrap(), 1);
        assert_eq!(conn.get_all_fields("book:3").unwrap(), None);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("book:{}", t * 100 + i);
                        store.hset(&key, &[("id", "x")]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = store.stats();
        assert_eq!(stats.keys, 800);
        assert_eq!(stats.writes, 800);
    }
}
