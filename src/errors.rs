//! Error types for the async pool

use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by a resource factory
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool capacity must be positive, got {0}")]
    InvalidCapacity(i64),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Resource factory failed: {0}")]
    Factory(Arc<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl PoolError {
    pub(crate) fn factory(err: BoxError) -> Self {
        PoolError::Factory(Arc::from(err))
    }

    /// Whether this error is a cancellation outcome rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PoolError::Cancelled)
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
