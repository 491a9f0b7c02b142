//! Store errors

use thiserror::Error;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not be reached or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Store result alias
pub type StoreResult<T> = Result<T, StoreError>;
