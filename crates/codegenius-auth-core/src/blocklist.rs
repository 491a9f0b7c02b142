//! IP blocklist with suspicion-driven auto-blocking

use std::sync::Arc;
use std::time::Duration;

use codegenius_store::KvStore;
use tokio::time::timeout;

const BLOCKED_PREFIX: &str = "blocked:ip:";
const SUSPICIOUS_PREFIX: &str = "suspicious:ip:";

/// When and for how long an IP gets blocked
#[derive(Debug, Clone, Copy)]
pub struct BlocklistPolicy {
    /// Suspicious events inside the window before an auto-block
    pub auto_block_threshold: u64,
    /// Sliding window over suspicious events
    pub suspicion_window: Duration,
    /// How long a block lasts
    pub block_duration: Duration,
}

impl Default for BlocklistPolicy {
    fn default() -> Self {
        Self {
            auto_block_threshold: 5,
            suspicion_window: Duration::from_secs(3600),
            block_duration: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Blocks abusive client IPs outright.
///
/// Suspicious events (malformed tokens, repeated lockouts) accumulate per
/// IP in a sliding window; crossing the threshold blocks the IP for the
/// configured duration. Blocks expire on their own. Lookups fail open so
/// a store outage never takes down honest traffic.
pub struct IpBlocklist {
    store: Arc<dyn KvStore>,
    policy: BlocklistPolicy,
    store_timeout: Duration,
}

impl IpBlocklist {
    /// Create a blocklist over the shared store
    pub fn new(store: Arc<dyn KvStore>, policy: BlocklistPolicy, store_timeout: Duration) -> Self {
        Self {
            store,
            policy,
            store_timeout,
        }
    }

    /// Whether `ip` is currently blocked. Fails open.
    pub async fn is_blocked(&self, ip: &str) -> bool {
        let key = format!("{BLOCKED_PREFIX}{ip}");
        match timeout(self.store_timeout, self.store.get(&key)).await {
            Ok(Ok(value)) => value.is_some(),
            Ok(Err(e)) => {
                tracing::error!("Blocklist lookup failed, treating as unblocked: {}", e);
                false
            }
            Err(_) => {
                tracing::error!("Blocklist lookup timed out, treating as unblocked");
                false
            }
        }
    }

    /// Block `ip` for the policy's block duration.
    pub async fn block(&self, ip: &str) {
        let key = format!("{BLOCKED_PREFIX}{ip}");
        match timeout(
            self.store_timeout,
            self.store.set_with_ttl(&key, "1", self.policy.block_duration),
        )
        .await
        {
            Ok(Ok(())) => tracing::warn!(ip, "IP blocked"),
            Ok(Err(e)) => tracing::error!("Failed to block IP: {}", e),
            Err(_) => tracing::error!("Timed out blocking IP"),
        }
    }

    /// Record one suspicious event for `ip`, auto-blocking it once the
    /// threshold is crossed. Returns whether the IP is now blocked.
    pub async fn record_suspicious(&self, ip: &str) -> bool {
        let key = format!("{SUSPICIOUS_PREFIX}{ip}");
        let count = match timeout(
            self.store_timeout,
            self.store.incr_refresh_ttl(&key, self.policy.suspicion_window),
        )
        .await
        {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                tracing::error!("Failed to record suspicious event: {}", e);
                return false;
            }
            Err(_) => {
                tracing::error!("Timed out recording suspicious event");
                return false;
            }
        };

        if count >= self.policy.auto_block_threshold {
            tracing::warn!(ip, count, "Suspicion threshold crossed, auto-blocking");
            self.block(ip).await;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for IpBlocklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpBlocklist")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
