//! CodeGenius Types - Shared domain types
//!
//! Domain types used across the auth subsystem:
//! - User and session identifiers
//! - Session records
//! - Issued token bundles

pub mod id;
pub mod session;

pub use id::*;
pub use session::*;
