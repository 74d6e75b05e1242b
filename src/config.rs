//! Gate configuration.
//!
//! `limit` and `window` are process constants: built once at startup and never changed
//! while serving. The window is handed to the store in whole seconds, so fractional
//! windows are rejected at build time rather than rounded.

use crate::timeout::StoreTimeout;
use crate::ConfigError;
use std::time::Duration;

/// Maximum requests per window when none is configured.
pub const DEFAULT_LIMIT: u64 = 50;
/// Window length when none is configured.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);
/// Bound applied to every store round trip when none is configured.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(500);

/// Validated configuration for a [`Gate`](crate::Gate).
#[derive(Debug, Clone)]
pub struct GateConfig {
    limit: u64,
    window: Duration,
    store_timeout: StoreTimeout,
}

impl GateConfig {
    /// Start from the defaults.
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::new()
    }

    /// Create a config with validation and the default store timeout.
    pub fn new(limit: u64, window: Duration) -> Result<Self, ConfigError> {
        Self::builder().limit(limit).window(window).build()
    }

    /// Highest count a client may be observed at and still be admitted.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window in the unit the store's expiry takes.
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }

    pub fn store_timeout(&self) -> StoreTimeout {
        self.store_timeout
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
            store_timeout: StoreTimeout::default(),
        }
    }
}

/// Builder for [`GateConfig`].
#[derive(Debug, Clone)]
pub struct GateConfigBuilder {
    limit: u64,
    window: Duration,
    store_timeout: Duration,
}

impl Default for GateConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GateConfigBuilder {
    pub fn new() -> Self {
        Self { limit: DEFAULT_LIMIT, window: DEFAULT_WINDOW, store_timeout: DEFAULT_STORE_TIMEOUT }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window_secs(self, secs: u64) -> Self {
        self.window(Duration::from_secs(secs))
    }

    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<GateConfig, ConfigError> {
        if self.window.as_secs() == 0 || self.window.subsec_nanos() != 0 {
            return Err(ConfigError::InvalidWindow(self.window));
        }
        let store_timeout = StoreTimeout::new(self.store_timeout)?;
        Ok(GateConfig { limit: self.limit, window: self.window, store_timeout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = GateConfig::default();
        assert_eq!(cfg.limit(), 50);
        assert_eq!(cfg.window_secs(), 300);
        assert_eq!(cfg.store_timeout().duration(), DEFAULT_STORE_TIMEOUT);
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = GateConfig::builder()
            .limit(3)
            .window_secs(10)
            .store_timeout(Duration::from_millis(20))
            .build()
            .unwrap();
        assert_eq!(cfg.limit(), 3);
        assert_eq!(cfg.window(), Duration::from_secs(10));
        assert_eq!(cfg.store_timeout().duration(), Duration::from_millis(20));
    }

    #[test]
    fn rejects_zero_window() {
        let err = GateConfig::new(1, Duration::ZERO).expect_err("zero window is invalid");
        assert_eq!(err, ConfigError::InvalidWindow(Duration::ZERO));
    }

    #[test]
    fn rejects_fractional_window() {
        let err = GateConfig::new(1, Duration::from_millis(1500)).expect_err("1.5s is invalid");
        assert!(matches!(err, ConfigError::InvalidWindow(_)));
    }

    #[test]
    fn rejects_zero_store_timeout() {
        let err = GateConfig::builder().store_timeout(Duration::ZERO).build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidStoreTimeout(Duration::ZERO));
    }

    #[test]
    fn zero_limit_is_allowed() {
        assert_eq!(GateConfig::new(0, Duration::from_secs(1)).unwrap().limit(), 0);
    }
}
