//! Convenient re-exports for common quotagate types.
pub use crate::{
    config::{GateConfig, GateConfigBuilder},
    error::{ConfigError, GateError, StoreError},
    rate_limit::{
        gate::Gate,
        key::{ClientId, KeyDeriver, NamespacedKey, VerbatimKey},
        middleware::{ClientIdExtractor, RateLimitLayer, RateLimitService},
        store::{InMemoryQuotaStore, OperationHandle, QuotaStore},
        Decision, RateLimiter,
    },
    telemetry::{GateEvent, LogSink, TelemetrySink},
};
