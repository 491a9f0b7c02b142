//! CodeGenius Store - Shared counter/record store abstraction
//!
//! Every piece of cross-request auth state (sessions, revocation entries,
//! failure counters, rate windows) lives behind the [`KvStore`] trait: a
//! key-value store with per-key expiry and atomic increments. Deployments
//! back it with a shared cache; single-process deployments and tests use
//! [`MemoryStore`].

pub mod clock;
pub mod error;
pub mod kv;
pub mod memory;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use kv::KvStore;
pub use memory::MemoryStore;
