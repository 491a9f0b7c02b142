//! Configuration for the auth subsystem

use std::collections::HashMap;
use std::time::Duration;

use crate::blocklist::BlocklistPolicy;

/// Auth subsystem configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Symmetric signing secret (must be at least 32 bytes)
    pub token_secret: String,
    /// `aud` claim stamped into and required from every token
    pub audience: String,
    /// `iss` claim stamped into and required from every token
    pub issuer: String,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Refresh token lifetime without remember-me
    pub refresh_token_ttl: Duration,
    /// Refresh token lifetime with remember-me
    pub remember_me_refresh_ttl: Duration,
    /// Session lifetime without remember-me
    pub session_ttl: Duration,
    /// Session lifetime with remember-me
    pub remember_me_session_ttl: Duration,
    /// Reject session validation when the caller's IP differs from the
    /// session's recorded IP. Deployment policy, off by default: proxies
    /// and NAT legitimately rotate source addresses.
    pub strict_ip_binding: bool,
    /// Upper bound on any single store call
    pub store_timeout: Duration,
    /// Brute-force lockout policy
    pub brute_force: BruteForcePolicy,
    /// Rate limit quotas
    pub rate_limits: RateLimitConfig,
    /// IP blocklist policy
    pub blocklist: BlocklistPolicy,
}

impl AuthConfig {
    /// Create a config with production defaults and the given secret
    pub fn new(token_secret: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            audience: "codegenius-api".to_string(),
            issuer: "codegenius.ai".to_string(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(24 * 60 * 60),
            remember_me_refresh_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            session_ttl: Duration::from_secs(24 * 60 * 60),
            remember_me_session_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            strict_ip_binding: false,
            store_timeout: Duration::from_millis(250),
            brute_force: BruteForcePolicy::default(),
            rate_limits: RateLimitConfig::default(),
            blocklist: BlocklistPolicy::default(),
        }
    }

    /// Set the access token lifetime
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    /// Set both refresh token lifetimes
    pub fn with_refresh_ttls(mut self, short: Duration, remember_me: Duration) -> Self {
        self.refresh_token_ttl = short;
        self.remember_me_refresh_ttl = remember_me;
        self
    }

    /// Set both session lifetimes
    pub fn with_session_ttls(mut self, short: Duration, remember_me: Duration) -> Self {
        self.session_ttl = short;
        self.remember_me_session_ttl = remember_me;
        self
    }

    /// Enable strict IP binding for session validation
    pub fn with_strict_ip_binding(mut self, strict: bool) -> Self {
        self.strict_ip_binding = strict;
        self
    }

    /// Set the store call timeout
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the brute-force policy
    pub fn with_brute_force(mut self, policy: BruteForcePolicy) -> Self {
        self.brute_force = policy;
        self
    }

    /// Set the rate limit quotas
    pub fn with_rate_limits(mut self, limits: RateLimitConfig) -> Self {
        self.rate_limits = limits;
        self
    }

    /// Set the IP blocklist policy
    pub fn with_blocklist(mut self, policy: BlocklistPolicy) -> Self {
        self.blocklist = policy;
        self
    }
}

/// Brute-force lockout policy
#[derive(Debug, Clone, Copy)]
pub struct BruteForcePolicy {
    /// Failures before an identifier is blocked
    pub max_attempts: u64,
    /// Sliding window; also the advertised retry-after
    pub lockout_window: Duration,
}

impl Default for BruteForcePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_window: Duration::from_secs(900),
        }
    }
}

/// A single fixed-window quota
#[derive(Debug, Clone, Copy)]
pub struct RateQuota {
    /// Requests allowed per window
    pub max_requests: u64,
    /// Window length
    pub window: Duration,
}

impl RateQuota {
    /// Construct a quota
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Per-category rate quotas plus the always-applied global ceiling
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    categories: HashMap<String, RateQuota>,
    /// Ceiling applied to every identity regardless of category
    pub global: RateQuota,
}

impl RateLimitConfig {
    /// Empty category table with the given global ceiling
    pub fn with_global(global: RateQuota) -> Self {
        Self {
            categories: HashMap::new(),
            global,
        }
    }

    /// Add or replace a category quota
    pub fn with_category(mut self, name: impl Into<String>, quota: RateQuota) -> Self {
        self.categories.insert(name.into(), quota);
        self
    }

    /// Quota for a category, if one is configured
    pub fn quota_for(&self, category: &str) -> Option<RateQuota> {
        self.categories.get(category).copied()
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::with_global(RateQuota::new(10_000, Duration::from_secs(3600)))
            .with_category("login", RateQuota::new(5, Duration::from_secs(900)))
            .with_category("register", RateQuota::new(3, Duration::from_secs(3600)))
            .with_category("payment", RateQuota::new(10, Duration::from_secs(3600)))
            .with_category("api", RateQuota::new(1000, Duration::from_secs(3600)))
    }
}
