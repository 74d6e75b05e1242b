#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # quotagate
//!
//! Fixed-window, per-client request quotas enforced across any number of stateless
//! application instances. A single shared counting store (Redis in production, an
//! in-memory store for tests and single-process use) is the source of truth.
//!
//! ## How a request is decided
//!
//! 1. The client identifier is turned into a quota key by a [`KeyDeriver`].
//! 2. The [`Gate`] reads the current count for that key.
//! 3. A count strictly above the limit rejects the request; the counter is left alone.
//! 4. Otherwise the gate runs the store's atomic increment+expire operation, which arms
//!    the window TTL only when the counter goes from absent to 1.
//!
//! Steps 2 and 4 are separate round trips. Concurrent requests for one client can all
//! pass step 3 before any of them increments, so the admitted count may overshoot the
//! limit by the number of requests in flight for that client.
//!
//! ## Quick Start
//!
//! ```rust
//! use quotagate::{ClientId, Gate, GateConfig, InMemoryQuotaStore};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GateConfig::builder().limit(2).window(Duration::from_secs(60)).build()?;
//! let gate = Gate::connect(InMemoryQuotaStore::new(), config).await?;
//!
//! let client = ClientId::new("203.0.113.7");
//! assert!(gate.check(&client).await?.is_admitted());
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod prelude;
pub mod rate_limit;
pub mod telemetry;
pub mod timeout;

// Re-exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{GateConfig, GateConfigBuilder};
pub use error::{ConfigError, GateError, StoreError};
pub use rate_limit::gate::Gate;
pub use rate_limit::key::{ClientId, KeyDeriver, NamespacedKey, VerbatimKey};
pub use rate_limit::middleware::{ClientIdExtractor, RateLimitLayer, RateLimitService};
pub use rate_limit::store::{InMemoryQuotaStore, OperationHandle, QuotaStore};
pub use rate_limit::{Decision, RateLimiter};
pub use timeout::StoreTimeout;
