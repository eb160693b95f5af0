use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async lock. Course media mutations take the lock for their
/// course id so that "read old id, upload new, write new id, delete old"
/// never interleaves for the same course.
#[derive(Debug, Clone)]
pub struct KeyedMutex {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Acquires the lock for `key`; released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        mutex.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub fn cleanup(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = KeyedMutex::new();
        let guard = locks.lock("course-1").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.lock("course-1").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedMutex::new();
        let _a = locks.lock("course-1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("course-2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_held_locks() {
        let locks = KeyedMutex::new();
        let held = locks.lock("a").await;
        drop(locks.lock("b").await);
        locks.cleanup();
        assert_eq!(locks.len(), 1);
        drop(held);
        locks.cleanup();
        assert!(locks.is_empty());
    }
}
