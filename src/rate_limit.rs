//! Fixed-window rate limiting.
//!
//! This module provides the building blocks:
//! - [`RateLimiter`]: the decision interface the middleware talks to.
//! - [`Gate`](gate::Gate): the fixed-window implementation backed by a [`QuotaStore`](store::QuotaStore).
//! - [`RateLimitLayer`]: Tower middleware that enforces the decision.
//! - [`Decision`]: the result of a check (Admitted/Rejected).
//!
//! # Architecture
//!
//! - **Middleware**: `RateLimitLayer` wraps your service. It doesn't know *how* limiting works,
//!   only that it should ask a `RateLimiter` about the request's client.
//! - **Logic**: `Gate` reads, compares, and advances the counter.
//! - **Storage**: `QuotaStore` (in `store` module) owns the counters and their expiry, so
//!   every application instance sharing a store shares the quota.

use crate::StoreError;
use crate::rate_limit::key::ClientId;
use std::time::Duration;

pub mod gate;
pub mod key;
pub mod middleware;
pub mod store;
pub use middleware::{RateLimitLayer, RateLimitService};

/// The decision returned by a rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed; the counter now holds `count`.
    Admitted {
        /// Counter value after this request's increment.
        count: u64,
        /// `limit - count`, floored at zero.
        /// Useful for `X-RateLimit-Remaining` headers.
        remaining: u64,
    },
    /// The request is refused; the counter was not touched.
    Rejected {
        /// Count read before deciding.
        observed: u64,
        /// Configured limit.
        limit: u64,
        /// Upper bound on how long until the window resets.
        /// Useful for `Retry-After` headers.
        retry_after: Duration,
    },
}

impl Decision {
    /// Helper to check if admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected { .. })
    }
}

/// Core interface for rate limiting logic.
///
/// Store failures are errors, never decisions: callers must not read a failed check as
/// either "admitted" or "rejected".
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// Decide for one request from `client`, advancing state only on admission.
    async fn check(&self, client: &ClientId) -> Result<Decision, StoreError>;
}
