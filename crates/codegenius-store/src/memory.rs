//! In-process store implementation
//!
//! Backs single-process deployments and tests. Entries are checked for
//! expiry lazily on read; the dashmap entry API provides the per-key
//! locking that makes increments atomic.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::clock::Clock;
use crate::error::StoreResult;
use crate::kv::KvStore;

use async_trait::async_trait;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-memory [`KvStore`] with lazy expiry
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a store reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of live entries (expired-but-unswept entries excluded)
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether the store holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deadline(&self, ttl: Duration) -> DateTime<Utc> {
        self.clock.now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX)
    }

    fn incr_inner(&self, key: &str, ttl: Duration, refresh: bool) -> u64 {
        let now = self.clock.now();
        let deadline = self.deadline(ttl);
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                value: "0".to_string(),
                expires_at: deadline,
            });
        if entry.is_expired(now) {
            entry.value = "0".to_string();
            entry.expires_at = deadline;
        }
        let count = entry.value.parse::<u64>().unwrap_or(0).saturating_add(1);
        entry.value = count.to_string();
        if refresh {
            entry.expires_at = deadline;
        }
        count
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired(now) {
                drop(entry);
                self.entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: self.deadline(ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        Ok(self.incr_inner(key, ttl, false))
    }

    async fn incr_refresh_ttl(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        Ok(self.incr_inner(key, ttl, true))
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        let now = self.clock.now();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.is_expired(now))
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::start_now());
        (MemoryStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let (store, _) = store();
        store
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_get_after_ttl_returns_none() {
        let (store, clock) = store();
        store
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(61));
        assert_eq!(store.get("k").await.unwrap(), None);
        // Expired entry was swept on read
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _) = store();
        store
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_fixed_window_keeps_deadline() {
        let (store, clock) = store();
        assert_eq!(
            store.incr_with_ttl("c", Duration::from_secs(60)).await.unwrap(),
            1
        );

        // Later increments do not extend the window
        clock.advance(Duration::from_secs(50));
        assert_eq!(
            store.incr_with_ttl("c", Duration::from_secs(60)).await.unwrap(),
            2
        );
        clock.advance(Duration::from_secs(11));
        // Original deadline passed; counter restarts
        assert_eq!(
            store.incr_with_ttl("c", Duration::from_secs(60)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_incr_refresh_slides_deadline() {
        let (store, clock) = store();
        assert_eq!(
            store
                .incr_refresh_ttl("c", Duration::from_secs(60))
                .await
                .unwrap(),
            1
        );

        clock.advance(Duration::from_secs(50));
        assert_eq!(
            store
                .incr_refresh_ttl("c", Duration::from_secs(60))
                .await
                .unwrap(),
            2
        );
        // 50s after the refresh the counter is still alive
        clock.advance(Duration::from_secs(50));
        assert_eq!(
            store
                .incr_refresh_ttl("c", Duration::from_secs(60))
                .await
                .unwrap(),
            3
        );
        // But a full window of silence resets it
        clock.advance(Duration::from_secs(61));
        assert_eq!(
            store
                .incr_refresh_ttl("c", Duration::from_secs(60))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_scan_prefix_skips_expired() {
        let (store, clock) = store();
        store
            .set_with_ttl("session:a", "1", Duration::from_secs(10))
            .await
            .unwrap();
        store
            .set_with_ttl("session:b", "2", Duration::from_secs(100))
            .await
            .unwrap();
        store
            .set_with_ttl("other:c", "3", Duration::from_secs(100))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(11));
        let mut keys: Vec<String> = store
            .scan_prefix("session:")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["session:b".to_string()]);
    }

    #[tokio::test]
    async fn test_set_overwrites_value_and_ttl() {
        let (store, clock) = store();
        store
            .set_with_ttl("k", "v1", Duration::from_secs(10))
            .await
            .unwrap();
        store
            .set_with_ttl("k", "v2", Duration::from_secs(100))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(11));
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
    }
}
