//! Orchestrator errors

use std::time::Duration;

use persistence::StoreError;
use thiserror::Error;
use types::ids::AccountId;

#[derive(Error, Debug)]
pub enum RecomputeError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Recompute of account {account_id} exceeded {timeout:?}, nothing committed")]
    Timeout { account_id: AccountId, timeout: Duration },

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Invalid configuration {key}={value}")]
    InvalidConfig { key: &'static str, value: String },
}

impl RecomputeError {
    /// Whether the caller can simply run the same recompute again.
    ///
    /// Fills are never touched by a recompute, so a timed-out or
    /// transiently failed run is safe to repeat.
    pub fn is_retryable(&self) -> bool {
        match self {
            RecomputeError::Store(e) => e.is_retryable(),
            RecomputeError::Timeout { .. } => true,
            RecomputeError::TaskFailed(_) | RecomputeError::InvalidConfig { .. } => false,
        }
    }
}
