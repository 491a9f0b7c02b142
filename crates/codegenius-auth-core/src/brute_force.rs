//! Failed-login tracking and lockout

use std::sync::Arc;
use std::time::Duration;

use codegenius_store::KvStore;
use tokio::time::timeout;

use crate::config::BruteForcePolicy;

const ATTEMPT_PREFIX: &str = "login_attempts:";

/// Outcome of a lockout check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutStatus {
    /// Whether the identifier is currently blocked
    pub blocked: bool,
    /// Failures recorded inside the current window
    pub attempts: u64,
    /// Seconds until the caller should retry
    pub retry_after: u64,
}

/// Tracks failed login attempts per identifier (username, client IP) and
/// blocks identifiers that exceed the policy threshold.
///
/// Each failure refreshes the window, so a blocked attacker who keeps
/// hammering stays blocked. Availability beats strictness here: if the
/// store is down, checks report not-blocked and recording is a no-op, so
/// an outage never locks every user out of login.
pub struct BruteForceGuard {
    store: Arc<dyn KvStore>,
    policy: BruteForcePolicy,
    store_timeout: Duration,
}

impl BruteForceGuard {
    /// Create a guard over the shared store
    pub fn new(store: Arc<dyn KvStore>, policy: BruteForcePolicy, store_timeout: Duration) -> Self {
        Self {
            store,
            policy,
            store_timeout,
        }
    }

    /// Current lockout status for `identifier`. Fails open.
    pub async fn check(&self, identifier: &str) -> LockoutStatus {
        let key = attempt_key(identifier);
        let attempts = match timeout(self.store_timeout, self.store.get(&key)).await {
            Ok(Ok(value)) => value.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0),
            Ok(Err(e)) => {
                tracing::error!("Lockout check failed, treating as unblocked: {}", e);
                0
            }
            Err(_) => {
                tracing::error!("Lockout check timed out, treating as unblocked");
                0
            }
        };

        LockoutStatus {
            blocked: attempts >= self.policy.max_attempts,
            attempts,
            retry_after: self.policy.lockout_window.as_secs(),
        }
    }

    /// Record one failed attempt for `identifier`, refreshing its window.
    pub async fn record_failure(&self, identifier: &str) {
        let key = attempt_key(identifier);
        match timeout(
            self.store_timeout,
            self.store.incr_refresh_ttl(&key, self.policy.lockout_window),
        )
        .await
        {
            Ok(Ok(count)) => {
                if count >= self.policy.max_attempts {
                    tracing::warn!(identifier, count, "Identifier locked out");
                }
            }
            Ok(Err(e)) => tracing::error!("Failed to record login failure: {}", e),
            Err(_) => tracing::error!("Timed out recording login failure"),
        }
    }

    /// Clear the failure counter for `identifier` after a successful login.
    pub async fn reset(&self, identifier: &str) {
        let key = attempt_key(identifier);
        match timeout(self.store_timeout, self.store.delete(&key)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Failed to reset login failures: {}", e),
            Err(_) => tracing::error!("Timed out resetting login failures"),
        }
    }
}

fn attempt_key(identifier: &str) -> String {
    format!("{ATTEMPT_PREFIX}{identifier}")
}

impl std::fmt::Debug for BruteForceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BruteForceGuard")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
