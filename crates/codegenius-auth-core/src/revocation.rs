//! JTI denylist with self-expiring entries

use std::sync::Arc;
use std::time::Duration;

use codegenius_store::{Clock, KvStore};
use tokio::time::timeout;

use crate::AuthError;

const DENYLIST_PREFIX: &str = "revoked:jti:";

/// Denylist of revoked token identifiers.
///
/// An entry lives exactly until the token's own `exp`, so it always
/// outlives the token it suppresses and the registry never grows
/// unbounded. Lookups fail **closed**: if the store is unreachable the
/// caller gets an error to surface as 503, never a silently accepted
/// token.
pub struct RevocationRegistry {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl RevocationRegistry {
    /// Create a registry over the shared store
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, store_timeout: Duration) -> Self {
        Self {
            store,
            clock,
            store_timeout,
        }
    }

    /// Record that `jti` must be rejected until `expires_at` (the token's
    /// original `exp`, seconds since the epoch).
    pub async fn deny(&self, jti: &str, expires_at: i64) -> Result<(), AuthError> {
        let now = self.clock.now().timestamp();
        // Never earlier than the token's own deadline, never indefinite.
        let ttl = Duration::from_secs((expires_at - now).max(1) as u64);
        let key = format!("{DENYLIST_PREFIX}{jti}");

        match timeout(self.store_timeout, self.store.set_with_ttl(&key, "1", ttl)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!("Failed to record revoked jti: {}", e);
                Err(e.into())
            }
            Err(_) => {
                tracing::error!("Timed out recording revoked jti");
                Err(AuthError::StoreUnavailable(
                    "revocation write timed out".to_string(),
                ))
            }
        }
    }

    /// Whether `jti` has been revoked. Fails closed on store trouble.
    pub async fn is_denied(&self, jti: &str) -> Result<bool, AuthError> {
        let key = format!("{DENYLIST_PREFIX}{jti}");
        match timeout(self.store_timeout, self.store.get(&key)).await {
            Ok(Ok(value)) => Ok(value.is_some()),
            Ok(Err(e)) => {
                tracing::error!("Revocation lookup failed: {}", e);
                Err(e.into())
            }
            Err(_) => {
                tracing::error!("Revocation lookup timed out");
                Err(AuthError::StoreUnavailable(
                    "revocation lookup timed out".to_string(),
                ))
            }
        }
    }
}

impl std::fmt::Debug for RevocationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationRegistry")
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}
