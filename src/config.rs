//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use std::time::Duration;

/// Configuration for async pool behavior
///
/// # Examples
///
/// ```
/// use esox_asyncpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_pool_size(8)
///     .with_timeout(Duration::from_secs(5))
///     .with_restore_capacity_on_failure(true);
///
/// assert_eq!(config.max_pool_size, 8);
/// assert_eq!(config.operation_timeout, Some(Duration::from_secs(5)));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfiguration {
    /// Maximum number of resources the pool may construct and keep in circulation
    pub max_pool_size: usize,

    /// Upper bound on how long a rent may wait in the queue
    pub operation_timeout: Option<Duration>,

    /// Give the capacity slot back when the factory fails.
    ///
    /// Off by default: a failed construction permanently consumes its slot
    /// until the pool is cleared.
    pub restore_capacity_on_failure: bool,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_pool_size: 100,
            operation_timeout: None,
            restore_capacity_on_failure: false,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum pool size
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_asyncpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_max_pool_size(50);
    ///
    /// assert_eq!(config.max_pool_size, 50);
    /// ```
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Set the maximum pool size from a signed value, rejecting zero and negatives
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_asyncpool::{PoolConfiguration, PoolError};
    ///
    /// assert!(PoolConfiguration::new().try_with_capacity(4).is_ok());
    /// assert!(matches!(
    ///     PoolConfiguration::new().try_with_capacity(-1),
    ///     Err(PoolError::InvalidCapacity(-1))
    /// ));
    /// ```
    pub fn try_with_capacity(self, capacity: i64) -> PoolResult<Self> {
        if capacity <= 0 {
            return Err(PoolError::InvalidCapacity(capacity));
        }
        let size = usize::try_from(capacity).map_err(|_| PoolError::InvalidCapacity(capacity))?;
        Ok(self.with_max_pool_size(size))
    }

    /// Set the queued-wait timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Restore (or not) the capacity slot when construction fails
    pub fn with_restore_capacity_on_failure(mut self, restore: bool) -> Self {
        self.restore_capacity_on_failure = restore;
        self
    }

    /// Check the configuration before a pool is built from it
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_pool_size == 0 {
            return Err(PoolError::InvalidCapacity(0));
        }
        Ok(())
    }
}
