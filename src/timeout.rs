//! Bounded timeout for quota store calls

use crate::{ConfigError, StoreError};
use std::future::Future;
use std::time::Duration;

/// Upper bound on a single store round trip. Expiry surfaces as [`StoreError::Timeout`].
#[derive(Debug, Clone, Copy)]
pub struct StoreTimeout {
    duration: Duration,
}

impl Default for StoreTimeout {
    fn default() -> Self {
        Self { duration: crate::config::DEFAULT_STORE_TIMEOUT }
    }
}

impl StoreTimeout {
    /// Create a timeout. Zero and `Duration::MAX` are rejected.
    pub fn new(duration: Duration) -> Result<Self, ConfigError> {
        if duration == Duration::ZERO || duration == Duration::MAX {
            return Err(ConfigError::InvalidStoreTimeout(duration));
        }
        Ok(Self { duration })
    }

    /// Inspect the configured timeout duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub async fn execute<T, Fut>(&self, call: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.duration, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.duration, "quota store call timed out");
                Err(StoreError::Timeout { timeout: self.duration })
            }
        }
    }
}
