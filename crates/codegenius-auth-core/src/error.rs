//! Auth errors

use codegenius_store::StoreError;
use thiserror::Error;

/// Authentication errors.
///
/// The externally-visible surface is deliberately coarse: a bad signature,
/// a forged claim, an expired token and a revoked JTI all collapse into
/// [`AuthError::TokenInvalid`], and wrong-username vs wrong-password is
/// never distinguished. The real reason is logged at `debug` level where
/// the rejection happens.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong username or password (never says which)
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Brute-force threshold exceeded for the IP or the account
    #[error("account locked, retry after {retry_after}s")]
    AccountLocked {
        /// Seconds until the lockout window ends
        retry_after: u64,
    },

    /// Too many requests for this identity
    #[error("rate limit exceeded, retry after {retry_after}s")]
    RateLimited {
        /// Seconds until the window rolls over
        retry_after: u64,
    },

    /// Bad signature, bad claims, expired, or revoked
    #[error("invalid token")]
    TokenInvalid,

    /// The referenced session is gone, inactive, or past its deadline
    #[error("session expired")]
    SessionExpired,

    /// Account exists but is disabled
    #[error("account disabled")]
    AccountDisabled,

    /// Infrastructure failure, not attributable to the caller
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials | Self::TokenInvalid | Self::SessionExpired => 401,
            Self::AccountDisabled => 403,
            Self::AccountLocked { .. } => 423,
            Self::RateLimited { .. } => 429,
            Self::StoreUnavailable(_) => 503,
            Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Stable error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountLocked { .. } => "ACCOUNT_LOCKED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::TokenInvalid => "INVALID_TOKEN",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
