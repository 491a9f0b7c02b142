//! The shared counter/record store interface

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Key-value store with per-key expiry and atomic counters.
///
/// Increment operations must be atomic read-modify-write at the store: two
/// concurrent failures or requests must never under-count due to a lost
/// update. A shared-cache implementation maps these onto native
/// INCR/SETEX primitives; [`crate::MemoryStore`] holds a per-key lock for
/// the duration of the update.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value at `key`, if present and unexpired
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` at `key`, expiring after `ttl`
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Atomically increment the counter at `key` and return the new value.
    ///
    /// `ttl` is applied only when the key is created; later increments leave
    /// the original deadline untouched (fixed-window semantics).
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> StoreResult<u64>;

    /// Atomically increment the counter at `key`, resetting its TTL on
    /// every call (sliding-window semantics), and return the new value.
    async fn incr_refresh_ttl(&self, key: &str, ttl: Duration) -> StoreResult<u64>;

    /// List all live `(key, value)` pairs whose key starts with `prefix`.
    ///
    /// Pairs observed mid-scan are best-effort: entries created after the
    /// scan started may or may not appear.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, String)>>;
}
