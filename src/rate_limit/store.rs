use crate::clock::{Clock, MonotonicClock};
use crate::StoreError;
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Opaque id of the increment+expire operation once registered with a store.
///
/// Obtained once from [`QuotaStore::prepare`] and reused for every call. The store may
/// forget it (for example after a restart); the next call then fails with
/// [`StoreError::UnknownOperation`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle(Arc<str>);

impl OperationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared, networked key-counter service.
///
/// Implementations must make [`increment_and_expire`](QuotaStore::increment_and_expire)
/// indivisible for all callers across all processes: increment the counter, and only if
/// the result is exactly 1 set its time-to-live to `window_secs`.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Register the increment+expire operation and return its handle.
    async fn prepare(&self) -> Result<OperationHandle, StoreError>;

    /// Current counter value; `None` when the key is absent (count 0).
    async fn read(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Run the prepared operation against `key` and return the new count.
    async fn increment_and_expire(
        &self,
        operation: &OperationHandle,
        key: &str,
        window_secs: u64,
    ) -> Result<u64, StoreError>;

    /// Time left before the counter for `key` expires, if the store can tell.
    ///
    /// Only consulted for rejected requests. `None` means unknown or absent.
    async fn remaining_window(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
        Ok(None)
    }
}

/// Handle the in-memory store hands out.
const IN_MEMORY_OPERATION: &str = "in-memory:incr-expire-on-first";

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at_millis: u64,
}

/// Live counters plus a min-heap of window deadlines.
///
/// Every counter has exactly one heap entry carrying its deadline.
#[derive(Debug, Default)]
struct Counters {
    live: HashMap<String, Counter>,
    deadlines: BinaryHeap<Reverse<(u64, String)>>,
}

impl Counters {
    /// Drop every counter whose window has ended by `now`.
    fn purge_expired(&mut self, now: u64) {
        while self.deadlines.peek().is_some_and(|Reverse((at, _))| *at <= now) {
            let Some(Reverse((at, key))) = self.deadlines.pop() else { break };
            if self.live.get(&key).is_some_and(|c| c.expires_at_millis == at) {
                self.live.remove(&key);
            }
        }
    }

    fn get(&mut self, key: &str, now: u64) -> Option<Counter> {
        self.purge_expired(now);
        self.live.get(key).copied()
    }

    fn increment(&mut self, key: &str, now: u64, window_secs: u64) -> u64 {
        let next = match self.get(key, now) {
            Some(c) => Counter { count: c.count.saturating_add(1), ..c },
            None => {
                let expires_at_millis = now.saturating_add(window_secs.saturating_mul(1_000));
                self.deadlines.push(Reverse((expires_at_millis, key.to_string())));
                Counter { count: 1, expires_at_millis }
            }
        };
        self.live.insert(key.to_string(), next);
        next.count
    }
}

/// Single-process quota store with the same semantics as the networked one.
///
/// Every access first purges the counters whose window has ended, so memory tracks the
/// number of clients seen within one window. Clones share state.
#[derive(Clone, Debug)]
pub struct InMemoryQuotaStore {
    counters: Arc<Mutex<Counters>>,
    prepared: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryQuotaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::default())
    }

    /// Drive expiry from `clock` instead of the monotonic clock.
    pub fn with_clock<C: Clock + 'static>(clock: C) -> Self {
        Self {
            counters: Arc::new(Mutex::new(Counters::default())),
            prepared: Arc::new(AtomicBool::new(false)),
            clock: Arc::new(clock),
        }
    }

    /// Forget every prepared operation, as a restarted store would.
    pub fn flush_operations(&self) {
        self.prepared.store(false, Ordering::SeqCst);
    }

    /// Live counter value without going through the async interface.
    pub fn peek(&self, key: &str) -> Option<u64> {
        let now = self.clock.now_millis();
        self.lock().ok()?.get(key, now).map(|c| c.count)
    }

    /// Remaining time-to-live of a live counter.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now_millis();
        self.lock()
            .ok()?
            .get(key, now)
            .map(|c| Duration::from_millis(c.expires_at_millis.saturating_sub(now)))
    }

    /// Number of counters currently held, without purging first.
    pub fn tracked_keys(&self) -> usize {
        self.lock().map(|g| g.live.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Counters>, StoreError> {
        self.counters.lock().map_err(|_| StoreError::unavailable("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn prepare(&self) -> Result<OperationHandle, StoreError> {
        self.prepared.store(true, Ordering::SeqCst);
        Ok(OperationHandle::new(IN_MEMORY_OPERATION))
    }

    async fn read(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = self.clock.now_millis();
        Ok(self.lock()?.get(key, now).map(|c| c.count))
    }

    async fn increment_and_expire(
        &self,
        operation: &OperationHandle,
        key: &str,
        window_secs: u64,
    ) -> Result<u64, StoreError> {
        if operation.as_str() != IN_MEMORY_OPERATION || !self.prepared.load(Ordering::SeqCst) {
            return Err(StoreError::UnknownOperation { handle: operation.to_string() });
        }

        let now = self.clock.now_millis();
        Ok(self.lock()?.increment(key, now, window_secs))
    }

    async fn remaining_window(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        Ok(self.ttl(key))
    }
}
