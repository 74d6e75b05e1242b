//! Fixed-window gate.
//!
//! Semantics, per request from client `c`:
//! - Read the counter for `key(c)`. Absent counts as 0.
//! - Observed count strictly above `limit`: reject. The counter is not touched, so a flood
//!   of rejected requests cannot extend or inflate the window.
//! - Otherwise run the prepared increment+expire operation and admit.
//!
//! Invariants:
//! - The request that moves the counter from `limit` to `limit + 1` is admitted; only
//!   requests that *observe* more than `limit` are rejected.
//! - The expiry is armed by the store on the absent→1 transition only. The gate never
//!   clears counters; windows end purely by store expiry.
//! - Read and increment are two round trips with no lock between them. Concurrent
//!   requests for one client may all pass the comparison, so the admitted count can
//!   exceed `limit` by the number of requests in flight for that client.
//! - Any store failure is returned as an error for that request alone. Nothing is
//!   retried and nothing is re-prepared.

use crate::config::GateConfig;
use crate::rate_limit::key::{ClientId, KeyDeriver, VerbatimKey};
use crate::rate_limit::store::{OperationHandle, QuotaStore};
use crate::rate_limit::{Decision, RateLimiter};
use crate::telemetry::{emit_best_effort, GateEvent, NullSink, StorePhase, TelemetrySink};
use crate::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Per-client fixed-window quota enforcement over a shared [`QuotaStore`].
///
/// Built once at startup with [`Gate::connect`] and then shared (usually behind an `Arc`)
/// by every request handler.
pub struct Gate<S, K = VerbatimKey, T = NullSink> {
    store: Arc<S>,
    operation: OperationHandle,
    config: GateConfig,
    keys: K,
    telemetry: T,
}

impl<S, K, T> std::fmt::Debug for Gate<S, K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("operation", &self.operation)
            .field("config", &self.config)
            .field("store", &"<quota store>")
            .finish()
    }
}

impl<S> Gate<S>
where
    S: QuotaStore,
{
    /// Register the increment+expire operation with `store` and build the gate.
    ///
    /// # Errors
    /// Returns the store error if registration fails or times out. Callers should treat
    /// this as fatal: there is no non-atomic fallback.
    pub async fn connect(store: S, config: GateConfig) -> Result<Self, StoreError> {
        let store = Arc::new(store);
        let operation = match config.store_timeout().execute(store.prepare()).await {
            Ok(op) => op,
            Err(e) => {
                tracing::error!(error = %e, "failed to register increment+expire operation");
                return Err(e);
            }
        };

        tracing::info!(
            operation = %operation,
            limit = config.limit(),
            window_secs = config.window_secs(),
            "quota gate ready"
        );

        Ok(Self { store, operation, config, keys: VerbatimKey, telemetry: NullSink })
    }
}

impl<S, K, T> Gate<S, K, T> {
    /// Replace the key deriver.
    pub fn with_keys<K2: KeyDeriver>(self, keys: K2) -> Gate<S, K2, T> {
        Gate {
            store: self.store,
            operation: self.operation,
            config: self.config,
            keys,
            telemetry: self.telemetry,
        }
    }

    /// Send decision events to `sink`.
    pub fn with_telemetry<T2: TelemetrySink>(self, sink: T2) -> Gate<S, K, T2> {
        Gate {
            store: self.store,
            operation: self.operation,
            config: self.config,
            keys: self.keys,
            telemetry: sink,
        }
    }

    /// Handle returned by the store at startup.
    pub fn operation(&self) -> &OperationHandle {
        &self.operation
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, K, T> Gate<S, K, T>
where
    S: QuotaStore,
    K: KeyDeriver,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    /// Decide one request from `client`, advancing the counter only on admission.
    pub async fn check(&self, client: &ClientId) -> Result<Decision, StoreError> {
        let key = self.keys.derive(client);
        let limit = self.config.limit();
        let timeout = self.config.store_timeout();

        let observed = match timeout.execute(self.store.read(&key)).await {
            Ok(count) => count.unwrap_or(0),
            Err(error) => return Err(self.store_failed(key, StorePhase::Read, error).await),
        };

        if observed > limit {
            tracing::debug!(key = %key, observed, limit, "quota exceeded");
            let retry_after = self.retry_after(&key).await;
            self.emit(GateEvent::Rejected { key, observed, limit }).await;
            return Ok(Decision::Rejected { observed, limit, retry_after });
        }

        let increment =
            self.store.increment_and_expire(&self.operation, &key, self.config.window_secs());
        let count = match timeout.execute(increment).await {
            Ok(count) => count,
            Err(error) => return Err(self.store_failed(key, StorePhase::Increment, error).await),
        };

        self.emit(GateEvent::Admitted { key, count }).await;
        Ok(Decision::Admitted { count, remaining: limit.saturating_sub(count) })
    }

    /// Time until the window resets. The decision is already made, so any failure here
    /// falls back to the full window.
    async fn retry_after(&self, key: &str) -> Duration {
        let window = self.config.window();
        match self.config.store_timeout().execute(self.store.remaining_window(key)).await {
            Ok(Some(left)) if !left.is_zero() => left.min(window),
            Ok(_) => window,
            Err(error) => {
                tracing::debug!(key = %key, error = %error, "remaining window unknown");
                window
            }
        }
    }

    async fn store_failed(&self, key: String, phase: StorePhase, error: StoreError) -> StoreError {
        tracing::warn!(key = %key, phase = %phase, error = %error, "quota store call failed");
        self.emit(GateEvent::StoreFailed { key, phase, error: error.clone() }).await;
        error
    }

    async fn emit(&self, event: GateEvent) {
        emit_best_effort(self.telemetry.clone(), event).await;
    }
}

#[async_trait]
impl<S, K, T> RateLimiter for Gate<S, K, T>
where
    S: QuotaStore,
    K: KeyDeriver,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    async fn check(&self, client: &ClientId) -> Result<Decision, StoreError> {
        Gate::check(self, client).await
    }
}
