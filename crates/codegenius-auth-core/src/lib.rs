//! CodeGenius Auth Core - Session and token lifecycle
//!
//! The single entry point for route handlers is [`AuthSessionService`],
//! which composes:
//! - [`TokenCodec`]: signed bounded-lifetime access/refresh tokens
//! - [`RevocationRegistry`]: self-expiring JTI denylist
//! - [`SessionStore`]: revocable server-side session records
//! - [`BruteForceGuard`]: per-IP and per-username lockouts
//! - [`RateLimiter`]: fixed-window limits per (category, identity)
//!
//! All shared state lives behind the `codegenius-store` KV abstraction;
//! credential verification is the external [`CredentialVerifier`] trait.

pub mod blocklist;
pub mod config;
pub mod crypto;
pub mod error;
pub mod rate_limit;
pub mod revocation;
pub mod service;
pub mod session;
pub mod token;

mod brute_force;

pub use blocklist::{BlocklistPolicy, IpBlocklist};
pub use brute_force::{BruteForceGuard, LockoutStatus};
pub use config::{AuthConfig, BruteForcePolicy, RateLimitConfig, RateQuota};
pub use error::AuthError;
pub use rate_limit::{RateIdentity, RateLimiter};
pub use revocation::RevocationRegistry;
pub use service::{AuthContext, AuthSessionService, CredentialVerifier};
pub use session::SessionStore;
pub use token::{TokenClaims, TokenCodec, TokenType};
