//! Fixed-window request rate limiting

use std::sync::Arc;
use std::time::Duration;

use codegenius_store::KvStore;
use codegenius_types::UserId;
use tokio::time::timeout;

use crate::config::{RateLimitConfig, RateQuota};

const RATE_PREFIX: &str = "rate_limit:";
const GLOBAL_CATEGORY: &str = "global";

/// Who a request is counted against.
///
/// Authenticated traffic is keyed by user so a NAT full of legitimate
/// users is not punished collectively; anonymous traffic falls back to
/// the client IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateIdentity {
    /// Authenticated caller, counted per user
    Subject(UserId),
    /// Anonymous caller, counted per client IP
    Ip(String),
}

impl RateIdentity {
    /// Pick the identity for a request: the authenticated user when there
    /// is one, the client IP otherwise.
    pub fn resolve(user_id: Option<UserId>, ip_address: &str) -> Self {
        match user_id {
            Some(user_id) => Self::Subject(user_id),
            None => Self::Ip(ip_address.to_string()),
        }
    }
}

impl std::fmt::Display for RateIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subject(user_id) => write!(f, "user:{user_id}"),
            Self::Ip(ip) => write!(f, "ip:{ip}"),
        }
    }
}

/// Fixed-window counters over the shared store.
///
/// Each (category, identity) pair gets its own counter whose TTL is set
/// when the window opens and left alone afterwards, so windows roll over
/// on a fixed cadence no matter how hard the client retries. Every
/// request is also counted against the `global` ceiling. Fails open on
/// store trouble.
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    config: RateLimitConfig,
    store_timeout: Duration,
}

impl RateLimiter {
    /// Create a limiter over the shared store
    pub fn new(store: Arc<dyn KvStore>, config: RateLimitConfig, store_timeout: Duration) -> Self {
        Self {
            store,
            config,
            store_timeout,
        }
    }

    /// Count one request for `identity` under `category` and report
    /// whether it is within quota.
    ///
    /// A category with no configured quota is only subject to the global
    /// ceiling.
    pub async fn allow(&self, category: &str, identity: &RateIdentity) -> bool {
        if let Some(quota) = self.config.quota_for(category) {
            if !self.within(category, identity, quota).await {
                return false;
            }
        }
        self.within(GLOBAL_CATEGORY, identity, self.config.global)
            .await
    }

    async fn within(&self, category: &str, identity: &RateIdentity, quota: RateQuota) -> bool {
        let key = format!("{RATE_PREFIX}{category}:{identity}");
        match timeout(
            self.store_timeout,
            self.store.incr_with_ttl(&key, quota.window),
        )
        .await
        {
            Ok(Ok(count)) => {
                if count > quota.max_requests {
                    tracing::warn!(category, %identity, count, "Rate limit exceeded");
                    false
                } else {
                    true
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Rate limit counter unavailable, allowing request: {}", e);
                true
            }
            Err(_) => {
                tracing::warn!("Rate limit counter timed out, allowing request");
                true
            }
        }
    }

    /// Seconds a limited caller should wait before retrying `category`
    pub fn retry_after(&self, category: &str) -> u64 {
        self.config
            .quota_for(category)
            .unwrap_or(self.config.global)
            .window
            .as_secs()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
