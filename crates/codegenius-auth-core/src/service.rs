//! The composed auth session service

use std::sync::Arc;

use async_trait::async_trait;
use codegenius_store::{Clock, KvStore};
use codegenius_types::{Session, SessionId, SessionTokens, UserId};

use crate::blocklist::IpBlocklist;
use crate::brute_force::BruteForceGuard;
use crate::config::AuthConfig;
use crate::rate_limit::{RateIdentity, RateLimiter};
use crate::revocation::RevocationRegistry;
use crate::session::SessionStore;
use crate::token::{TokenClaims, TokenCodec, TokenType};
use crate::AuthError;

/// Checks a username/password pair against the user backend.
///
/// The service never sees password hashes; implementations own hashing
/// and comparison. Returning `Ok(None)` means the pair does not match
/// (without saying which half was wrong); errors are reserved for backend
/// failures and policy rejections such as a disabled account.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verify the pair, returning the matched user id if any
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserId>, AuthError>;
}

/// Everything a request handler learns from a valid access token
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The authenticated user
    pub user_id: UserId,
    /// The live session backing the token
    pub session: Session,
    /// The verified token claims
    pub claims: TokenClaims,
}

/// Front door for login, token verification, refresh and logout.
///
/// Composes the codec, session store, revocation registry, brute-force
/// guard and IP blocklist over one shared store. Request handlers call
/// this and translate [`AuthError`] into HTTP via
/// [`AuthError::status_code`].
pub struct AuthSessionService<V> {
    codec: TokenCodec,
    sessions: SessionStore,
    revocation: RevocationRegistry,
    guard: BruteForceGuard,
    rate_limiter: RateLimiter,
    blocklist: IpBlocklist,
    verifier: Arc<V>,
    access_token_ttl: std::time::Duration,
    refresh_token_ttl: std::time::Duration,
    remember_me_refresh_ttl: std::time::Duration,
    block_retry_after: u64,
}

impl<V: CredentialVerifier> AuthSessionService<V> {
    /// Wire up the service over one shared store and clock.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] for an unusable config, such
    /// as a too-short signing secret.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        verifier: Arc<V>,
    ) -> Result<Self, AuthError> {
        let codec = TokenCodec::new(&config, clock.clone())?;
        Ok(Self {
            codec,
            sessions: SessionStore::new(&config, store.clone(), clock.clone()),
            revocation: RevocationRegistry::new(store.clone(), clock, config.store_timeout),
            guard: BruteForceGuard::new(store.clone(), config.brute_force, config.store_timeout),
            rate_limiter: RateLimiter::new(
                store.clone(),
                config.rate_limits.clone(),
                config.store_timeout,
            ),
            blocklist: IpBlocklist::new(store, config.blocklist, config.store_timeout),
            verifier,
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            remember_me_refresh_ttl: config.remember_me_refresh_ttl,
            block_retry_after: config.blocklist.block_duration.as_secs(),
        })
    }

    /// The request rate limiter, for edge middleware
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// The IP blocklist, for edge middleware
    pub fn blocklist(&self) -> &IpBlocklist {
        &self.blocklist
    }

    /// Count one request under `category` and reject it if over quota.
    pub async fn enforce_quota(
        &self,
        category: &str,
        identity: &RateIdentity,
    ) -> Result<(), AuthError> {
        if self.rate_limiter.allow(category, identity).await {
            Ok(())
        } else {
            Err(AuthError::RateLimited {
                retry_after: self.rate_limiter.retry_after(category),
            })
        }
    }

    /// Log a user in: verify credentials under lockout protection, open a
    /// session and issue its access/refresh token pair.
    ///
    /// Failed attempts are counted against both the client IP and the
    /// username, so an attacker rotating passwords locks the account and
    /// an attacker rotating usernames locks the IP. A success clears both
    /// counters.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ip_address: &str,
        user_agent: &str,
        remember_me: bool,
    ) -> Result<SessionTokens, AuthError> {
        if self.blocklist.is_blocked(ip_address).await {
            return Err(AuthError::AccountLocked {
                retry_after: self.block_retry_after,
            });
        }

        let ip_status = self.guard.check(ip_address).await;
        if ip_status.blocked {
            tracing::warn!(ip = ip_address, "Login rejected, IP locked out");
            return Err(AuthError::AccountLocked {
                retry_after: ip_status.retry_after,
            });
        }
        let user_status = self.guard.check(username).await;
        if user_status.blocked {
            tracing::warn!(username, "Login rejected, account locked out");
            return Err(AuthError::AccountLocked {
                retry_after: user_status.retry_after,
            });
        }

        let user_id = match self.verifier.verify_credentials(username, password).await? {
            Some(user_id) => user_id,
            None => {
                self.guard.record_failure(ip_address).await;
                self.guard.record_failure(username).await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.guard.reset(ip_address).await;
        self.guard.reset(username).await;

        let session = self
            .sessions
            .create(user_id, ip_address, user_agent, remember_me)
            .await?;

        let (access_token, _) = self.codec.issue(
            user_id,
            &session.session_id,
            TokenType::Access,
            self.access_token_ttl,
        )?;
        let refresh_ttl = if remember_me {
            self.remember_me_refresh_ttl
        } else {
            self.refresh_token_ttl
        };
        let (refresh_token, _) = self.codec.issue(
            user_id,
            &session.session_id,
            TokenType::Refresh,
            refresh_ttl,
        )?;

        tracing::info!(user_id = %user_id, session_id = %session.session_id, "Login succeeded");
        Ok(SessionTokens {
            session_id: session.session_id,
            access_token,
            refresh_token,
            expires_in: self.access_token_ttl.as_secs(),
        })
    }

    /// Authenticate a request by its access token.
    ///
    /// A token passes only if its signature, claims and expiry check out,
    /// its JTI is not revoked, and its session is still live. A token
    /// that fails signature verification counts as a suspicious event for
    /// the caller's IP.
    pub async fn authenticate(
        &self,
        access_token: &str,
        ip_address: &str,
    ) -> Result<AuthContext, AuthError> {
        if self.blocklist.is_blocked(ip_address).await {
            return Err(AuthError::AccountLocked {
                retry_after: self.block_retry_after,
            });
        }
        let claims = self.verify_bound(access_token, TokenType::Access, ip_address).await?;
        let (user_id, session) = self.resolve_session(&claims, ip_address).await?;
        Ok(AuthContext {
            user_id,
            session,
            claims,
        })
    }

    /// Exchange a live refresh token for a fresh access token.
    ///
    /// The refresh token itself is not rotated; it stays valid until it
    /// expires or its session or JTI is revoked.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        ip_address: &str,
    ) -> Result<SessionTokens, AuthError> {
        if self.blocklist.is_blocked(ip_address).await {
            return Err(AuthError::AccountLocked {
                retry_after: self.block_retry_after,
            });
        }
        let claims = self.verify_bound(refresh_token, TokenType::Refresh, ip_address).await?;
        let (user_id, session) = self.resolve_session(&claims, ip_address).await?;

        let (access_token, _) = self.codec.issue(
            user_id,
            &session.session_id,
            TokenType::Access,
            self.access_token_ttl,
        )?;
        tracing::debug!(user_id = %user_id, session_id = %session.session_id, "Access token refreshed");
        Ok(SessionTokens {
            session_id: session.session_id,
            access_token,
            refresh_token: refresh_token.to_string(),
            expires_in: self.access_token_ttl.as_secs(),
        })
    }

    /// Log out: revoke whichever tokens the client still holds and
    /// destroy the session.
    ///
    /// Tokens that no longer verify are skipped rather than rejected; a
    /// client logging out with an expired access token still gets its
    /// refresh token revoked and its session destroyed.
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        session_id: &SessionId,
    ) -> Result<(), AuthError> {
        for token in [access_token, refresh_token].into_iter().flatten() {
            if let Ok(claims) = self.codec.verify(token) {
                self.revocation.deny(&claims.jti, claims.exp).await?;
            }
        }
        self.sessions.invalidate(session_id).await?;
        tracing::info!(session_id = %session_id, "Logged out");
        Ok(())
    }

    /// Revoke every session of the caller's user, as after a password
    /// change. Returns how many sessions were destroyed.
    pub async fn change_password(
        &self,
        session_id: &SessionId,
        ip_address: &str,
    ) -> Result<u64, AuthError> {
        let session = self
            .sessions
            .validate(session_id, ip_address)
            .await?
            .ok_or(AuthError::SessionExpired)?;
        self.sessions.invalidate_all(session.user_id).await
    }

    async fn verify_bound(
        &self,
        token: &str,
        expected: TokenType,
        ip_address: &str,
    ) -> Result<TokenClaims, AuthError> {
        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                self.blocklist.record_suspicious(ip_address).await;
                return Err(e);
            }
        };
        if claims.token_type != expected {
            tracing::debug!(
                got = %claims.token_type,
                want = %expected,
                "Token type mismatch"
            );
            return Err(AuthError::TokenInvalid);
        }
        if self.revocation.is_denied(&claims.jti).await? {
            tracing::debug!(jti = %claims.jti, "Token revoked");
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    async fn resolve_session(
        &self,
        claims: &TokenClaims,
        ip_address: &str,
    ) -> Result<(UserId, Session), AuthError> {
        let session_id = SessionId::from(claims.session_id.as_str());
        let session = self
            .sessions
            .validate(&session_id, ip_address)
            .await?
            .ok_or(AuthError::SessionExpired)?;

        // The token must agree with the session it points at.
        match claims.user_id() {
            Some(user_id) if user_id == session.user_id => Ok((user_id, session)),
            _ => {
                tracing::warn!(session_id = %session_id, "Token subject does not own session");
                Err(AuthError::TokenInvalid)
            }
        }
    }
}

impl<V> std::fmt::Debug for AuthSessionService<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSessionService")
            .field("access_token_ttl", &self.access_token_ttl)
            .finish_non_exhaustive()
    }
}
