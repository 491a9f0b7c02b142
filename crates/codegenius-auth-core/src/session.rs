//! Server-side session records

use std::sync::Arc;
use std::time::Duration;

use codegenius_store::{Clock, KvStore};
use codegenius_types::{Session, SessionId, UserId};
use tokio::time::timeout;

use crate::config::AuthConfig;
use crate::crypto::{chrono_ttl, secure_token, SESSION_ID_BYTES};
use crate::AuthError;

const SESSION_PREFIX: &str = "session:";

/// Stored user-agent strings are capped at this many characters
pub const USER_AGENT_MAX_LEN: usize = 200;

/// Creates, validates and destroys session records.
///
/// Records are serialized into the shared store under `session:{id}` with
/// a TTL matching their lifetime, so even unread sessions vanish on their
/// own. Reads that find an expired record invalidate it on the spot.
/// Session reads gate security-sensitive operations and therefore fail
/// closed on store trouble.
pub struct SessionStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    remember_me_session_ttl: Duration,
    strict_ip_binding: bool,
    store_timeout: Duration,
}

impl SessionStore {
    /// Create a session store over the shared store
    pub fn new(config: &AuthConfig, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            session_ttl: config.session_ttl,
            remember_me_session_ttl: config.remember_me_session_ttl,
            strict_ip_binding: config.strict_ip_binding,
            store_timeout: config.store_timeout,
        }
    }

    /// Create and persist a new session for `user_id`.
    pub async fn create(
        &self,
        user_id: UserId,
        ip_address: &str,
        user_agent: &str,
        remember_me: bool,
    ) -> Result<Session, AuthError> {
        let now = self.clock.now();
        let ttl = if remember_me {
            self.remember_me_session_ttl
        } else {
            self.session_ttl
        };

        let session = Session {
            session_id: SessionId(secure_token(SESSION_ID_BYTES)),
            user_id,
            ip_address: ip_address.to_string(),
            user_agent: truncate(user_agent, USER_AGENT_MAX_LEN),
            created_at: now,
            expires_at: now + chrono_ttl(ttl),
            remember_me,
            active: true,
        };

        self.write(&session, ttl).await?;
        tracing::debug!(user_id = %user_id, session_id = %session.session_id, "Session created");
        Ok(session)
    }

    /// Look up and vet a session.
    ///
    /// Returns `None` when the record is missing, inactive, or past its
    /// deadline. An expired record is invalidated as a side effect, so a
    /// second call for the same id also returns `None`.
    /// When strict IP binding is configured, a caller IP that differs from
    /// the recorded one fails validation (without destroying the session).
    pub async fn validate(
        &self,
        session_id: &SessionId,
        ip_address: &str,
    ) -> Result<Option<Session>, AuthError> {
        let key = session_key(session_id);
        let raw = match self.store_call(self.store.get(&key), "session read").await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let session: Session = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(session_id = %session_id, "Dropping unreadable session record: {}", e);
                self.invalidate(session_id).await?;
                return Ok(None);
            }
        };

        if !session.active {
            return Ok(None);
        }

        if session.is_expired(self.clock.now()) {
            self.invalidate(session_id).await?;
            return Ok(None);
        }

        if self.strict_ip_binding && session.ip_address != ip_address {
            tracing::warn!(
                session_id = %session_id,
                "Session IP mismatch under strict binding"
            );
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Destroy a single session. Destroying a missing session is a no-op.
    pub async fn invalidate(&self, session_id: &SessionId) -> Result<(), AuthError> {
        let key = session_key(session_id);
        self.store_call(self.store.delete(&key), "session delete")
            .await
    }

    /// Destroy every session belonging to `user_id`, returning how many
    /// were removed.
    ///
    /// Defense-in-depth, not a consistency guarantee: sessions created
    /// after the scan started may survive.
    pub async fn invalidate_all(&self, user_id: UserId) -> Result<u64, AuthError> {
        let entries = self
            .store_call(self.store.scan_prefix(SESSION_PREFIX), "session scan")
            .await?;

        let mut removed = 0;
        for (key, raw) in entries {
            let owner = serde_json::from_str::<Session>(&raw)
                .ok()
                .map(|s| s.user_id);
            if owner == Some(user_id) {
                self.store_call(self.store.delete(&key), "session delete")
                    .await?;
                removed += 1;
            }
        }

        tracing::info!(user_id = %user_id, removed, "Invalidated all sessions for user");
        Ok(removed)
    }

    async fn write(&self, session: &Session, ttl: Duration) -> Result<(), AuthError> {
        let raw = serde_json::to_string(session).map_err(|e| {
            tracing::error!("Failed to serialize session: {}", e);
            AuthError::Internal("failed to serialize session".to_string())
        })?;
        let key = session_key(&session.session_id);
        self.store_call(self.store.set_with_ttl(&key, &raw, ttl), "session write")
            .await
    }

    async fn store_call<T>(
        &self,
        fut: impl std::future::Future<Output = codegenius_store::StoreResult<T>>,
        what: &str,
    ) -> Result<T, AuthError> {
        match timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!("{} failed: {}", what, e);
                Err(e.into())
            }
            Err(_) => {
                tracing::error!("{} timed out", what);
                Err(AuthError::StoreUnavailable(format!("{what} timed out")))
            }
        }
    }
}

fn session_key(session_id: &SessionId) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session_ttl", &self.session_ttl)
            .field("strict_ip_binding", &self.strict_ip_binding)
            .finish_non_exhaustive()
    }
}
