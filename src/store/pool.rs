//! Store Connection Pool
//!
//! A fixed set of connections opened once at startup and never resized.
//! `checkout` hands them out round robin. Workers check out one connection
//! when they start and keep it for their whole life, so the cursor only
//! decides which worker is bound to which connection.
//!
//! When there are more workers than connections, several workers share a
//! connection and take turns through its mutex.

use super::{StoreBackend, StoreConnection, StoreError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// A pooled connection, shareable between worker threads.
pub type SharedConnection = Arc<Mutex<Box<dyn StoreConnection>>>;

pub struct StorePool {
    connections: Vec<SharedConnection>,
    cursor: Mutex<usize>,
}

impl std::fmt::Debug for StorePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePool")
            .field("size", &self.connections.len())
            .field("cursor", &*self.cursor.lock())
            .finish()
    }
}

impl StorePool {
    /// Opens `size` connections with `open`. The first failure aborts and
    /// closes whatever was already opened.
    pub fn init<F>(size: usize, mut open: F) -> Result<Self, StoreError>
    where
        F: FnMut(usize) -> Result<Box<dyn StoreConnection>, StoreError>,
    {
        if size == 0 {
            return Err(StoreError::EmptyPool);
        }

        let mut connections = Vec::with_capacity(size);
        for index in 0..size {
            connections.push(Arc::new(Mutex::new(open(index)?)));
        }

        Ok(Self {
            connections,
            cursor: Mutex::new(0),
        })
    }

    /// Opens `size` connections to `backend`.
    pub fn open(backend: &StoreBackend, size: usize) -> Result<Self, StoreError> {
        let pool = Self::init(size, |_| backend.connect())?;
        info!(store = %backend.describe(), size, "Store pool ready");
        Ok(pool)
    }

    /// Returns the connection under the cursor and advances it.
    pub fn checkout(&self) -> SharedConnection {
        let mut cursor = self.cursor.lock();
        let conn = Arc::clone(&self.connections[*cursor]);
        *cursor = (*cursor + 1) % self.connections.len();
        conn
    }

    pub fn size(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::io;

    fn memory_pool(size: usize) -> StorePool {
        let store = Arc::new(MemoryStore::new());
        StorePool::open(&StoreBackend::Memory(store), size).unwrap()
    }

    #[test]
    fn test_zero_size_rejected() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            StorePool::open(&StoreBackend::Memory(store), 0),
            Err(StoreError::EmptyPool)
        ));
    }

    #[test]
    fn test_checkout_round_robin() {
        let pool = memory_pool(3);
        assert_eq!(pool.size(), 3);

        let first: Vec<_> = (0..3).map(|_| pool.checkout()).collect();
        let second: Vec<_> = (0..3).map(|_| pool.checkout()).collect();

        for i in 0..3 {
            assert!(Arc::ptr_eq(&first[i], &second[i]));
            assert!(!Arc::ptr_eq(&first[i], &first[(i + 1) % 3]));
        }
    }

    #[test]
    fn test_failure_aborts_init() {
        let store = Arc::new(MemoryStore::new());
        let mut opened = 0;

        let result = StorePool::init(4, |index| {
            if index == 2 {
                return Err(StoreError::Io(io::Error::other("refused")));
            }
            opened += 1;
            Ok(Box::new(store.connect()) as Box<dyn StoreConnection>)
        });

        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(opened, 2);
    }

    #[test]
    fn test_shared_connections_see_same_store() {
        let pool = memory_pool(2);
        let a = pool.checkout();
        let b = pool.checkout();

        a.lock().upsert_fields("book:1", &[("title", "T")]).unwrap();
        assert!(b.lock().exists("book:1").unwrap());
    }
}
