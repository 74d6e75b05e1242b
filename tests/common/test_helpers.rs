use async_trait::async_trait;
use quotagate::{InMemoryQuotaStore, OperationHandle, QuotaStore, StoreError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

/// In-memory store with switchable faults and call counters.
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: InMemoryQuotaStore,
    pub fail_prepare: Arc<AtomicBool>,
    pub fail_reads: Arc<AtomicBool>,
    pub fail_increments: Arc<AtomicBool>,
    pub failing_key: Arc<Mutex<Option<String>>>,
    pub read_delay: Arc<Mutex<Option<Duration>>>,
    pub read_barrier: Arc<Mutex<Option<Arc<Barrier>>>>,
    pub reads: Arc<AtomicUsize>,
    pub increments: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryQuotaStore) -> Self {
        Self { inner, ..Default::default() }
    }

    fn key_fails(&self, key: &str) -> bool {
        self.failing_key.lock().unwrap().as_deref() == Some(key)
    }
}

#[async_trait]
impl QuotaStore for FaultyStore {
    async fn prepare(&self) -> Result<OperationHandle, StoreError> {
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        self.inner.prepare().await
    }

    async fn read(&self, key: &str) -> Result<Option<u64>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) || self.key_fails(key) {
            return Err(StoreError::unavailable("read failed"));
        }
        let value = self.inner.read(key).await;
        let barrier = self.read_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        value
    }

    async fn increment_and_expire(
        &self,
        operation: &OperationHandle,
        key: &str,
        window_secs: u64,
    ) -> Result<u64, StoreError> {
        self.increments.fetch_add(1, Ordering::SeqCst);
        if self.fail_increments.load(Ordering::SeqCst) || self.key_fails(key) {
            return Err(StoreError::unavailable("increment failed"));
        }
        self.inner.increment_and_expire(operation, key, window_secs).await
    }
}
