//! Signed token issue/verify

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use codegenius_store::Clock;
use codegenius_types::{SessionId, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::crypto::{chrono_ttl, secure_token, JTI_BYTES};
use crate::AuthError;

/// Token kind, fixed at issue time.
///
/// A closed enum rather than a free-form string: a token whose `type` claim
/// is anything else fails to decode at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived bearer token for authenticated requests
    Access,
    /// Long-lived token exchanged for fresh access tokens
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims carried by every issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,
    /// Session the token is bound to
    pub session_id: String,
    /// Token kind
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued-at timestamp (seconds)
    pub iat: i64,
    /// Expiration timestamp (seconds)
    pub exp: i64,
    /// Unique token id, the revocation handle
    pub jti: String,
    /// Audience
    pub aud: String,
    /// Issuer
    pub iss: String,
}

impl TokenClaims {
    /// Parse the subject as a user id
    pub fn user_id(&self) -> Option<UserId> {
        UserId::parse(&self.sub).ok()
    }

    /// Whether the token is past its deadline as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}

/// Issues and verifies signed claims with a symmetric secret.
///
/// Verification checks signature, audience and issuer inside the JWT
/// layer, then expiry strictly (`now <= exp`, zero leeway) against the
/// injected clock. Every failure collapses to [`AuthError::TokenInvalid`];
/// the concrete reason is logged at `debug` only.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    audience: String,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Minimum signing secret length in bytes (256 bits)
    pub const MIN_SECRET_LENGTH: usize = 32;

    /// Create a codec from config.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if the secret is shorter than
    /// [`Self::MIN_SECRET_LENGTH`].
    pub fn new(config: &AuthConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        if config.token_secret.len() < Self::MIN_SECRET_LENGTH {
            return Err(AuthError::Configuration(format!(
                "token secret too short: got {} bytes, need at least {}",
                config.token_secret.len(),
                Self::MIN_SECRET_LENGTH
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_issuer(&[config.issuer.as_str()]);
        // Expiry is re-checked manually against the injected clock with
        // zero leeway; the library default grants 60 seconds.
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_bytes()),
            validation,
            audience: config.audience.clone(),
            issuer: config.issuer.clone(),
            clock,
        })
    }

    /// Issue a signed token bound to `session_id`, returning the encoded
    /// token and the claims that went into it.
    pub fn issue(
        &self,
        user_id: UserId,
        session_id: &SessionId,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<(String, TokenClaims), AuthError> {
        let now = self.clock.now();
        let exp = now + chrono_ttl(ttl.max(Duration::from_secs(1)));

        let claims = TokenClaims {
            sub: user_id.to_string(),
            session_id: session_id.as_str().to_string(),
            token_type,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: secure_token(JTI_BYTES),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!("Failed to sign token: {}", e);
                AuthError::Internal("failed to sign token".to_string())
            })?;

        Ok((token, claims))
    }

    /// Verify a token and return its claims, failing closed on any
    /// signature, audience, issuer, claim-shape or expiry mismatch.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token verification failed: {}", e);
                AuthError::TokenInvalid
            })?;

        let claims = data.claims;
        if claims.is_expired(self.clock.now()) {
            tracing::debug!(jti = %claims.jti, "Token expired");
            return Err(AuthError::TokenInvalid);
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
