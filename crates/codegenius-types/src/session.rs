//! Session records and issued token bundles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SessionId, UserId};

/// A server-side session record.
///
/// Created on successful login, destroyed on logout / revoke-all, or lazily
/// on read once `expires_at` has passed. Only the session store creates and
/// destroys these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier
    pub session_id: SessionId,
    /// User who owns the session
    pub user_id: UserId,
    /// IP address the session was created from
    pub ip_address: String,
    /// User agent string (truncated at creation)
    pub user_agent: String,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Session expiration time
    pub expires_at: DateTime<Utc>,
    /// Whether the long remember-me duration was requested
    pub remember_me: bool,
    /// Whether the session is still active
    pub active: bool,
}

impl Session {
    /// Check whether the session has expired as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check whether the session is usable as of `now`
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }
}

/// Tokens returned to the client after a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    /// The session backing both tokens
    pub session_id: SessionId,
    /// Short-lived access token
    pub access_token: String,
    /// Long-lived refresh token
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}
