//! Per-key write serialization.
//!
//! Mutating engine paths take the key's lock before reading, so every
//! read-modify-write on one account or ledger is serialized. Multi-key
//! operations sort their keys first, which rules out lock-order deadlocks
//! between concurrent transfers or posting batches.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A registry of per-key async mutexes, created on first use.
#[derive(Debug, Default)]
pub struct LockRegistry<K>
where
    K: Eq + Hash + Ord + Clone,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> LockRegistry<K>
where
    K: Eq + Hash + Ord + Clone,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn handle(&self, key: &K) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquires the lock for one key.
    pub async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
        self.handle(key).lock_owned().await
    }

    /// Acquires the locks for several keys in sorted, deduplicated order.
    pub async fn acquire_many(&self, keys: &[K]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<K> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in &sorted {
            guards.push(self.handle(key).lock_owned().await);
        }
        guards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let registry = Arc::new(LockRegistry::new());
        let counter = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _guard = registry.acquire(&1u64).await;
                // Non-atomic read-modify-write; exclusive access keeps it
                // race-free.
                let seen = counter.load(Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                counter.store(seen + 1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn test_reversed_multi_key_orders_do_not_deadlock() {
        let registry = Arc::new(LockRegistry::new());

        let a = Arc::clone(&registry);
        let first = tokio::spawn(async move {
            for _ in 0..50 {
                let _guards = a.acquire_many(&[1u64, 2u64]).await;
            }
        });
        let b = Arc::clone(&registry);
        let second = tokio::spawn(async move {
            for _ in 0..50 {
                let _guards = b.acquire_many(&[2u64, 1u64]).await;
            }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            first.await.unwrap();
            second.await.unwrap();
        })
        .await
        .expect("lock acquisition deadlocked");
    }

    #[tokio::test]
    async fn test_acquire_many_dedups_keys() {
        let registry = LockRegistry::new();
        let guards = registry.acquire_many(&[7u64, 7u64, 7u64]).await;
        assert_eq!(guards.len(), 1);
    }
}
