use quotagate::{ClientId, Decision, Gate, GateConfig, QuotaStore, StoreError};
use quotagate_redis::RedisQuotaStore;

// Requires Redis running. If QUOTAGATE_TEST_REDIS_URL is unset, the tests skip.
async fn client() -> Option<redis::Client> {
    let url = match std::env::var("QUOTAGATE_TEST_REDIS_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("skipping: set QUOTAGATE_TEST_REDIS_URL (e.g. redis://127.0.0.1:6379/15)");
            return None;
        }
    };
    Some(
        redis::Client::open(url.as_str())
            .unwrap_or_else(|e| panic!("invalid redis url '{}': {}", url, e)),
    )
}

#[tokio::test]
async fn gate_counts_and_expires_in_redis() {
    let Some(client) = client().await else { return };
    let store = RedisQuotaStore::from_client(client.clone()).await.expect("connect");
    let cfg = GateConfig::builder().limit(1).window_secs(30).build().unwrap();
    let gate = Gate::connect(store, cfg).await.expect("script load");

    let key = format!("quotagate-test-{}", uuid::Uuid::new_v4());
    let who = ClientId::new(key.clone());

    assert_eq!(gate.check(&who).await.unwrap(), Decision::Admitted { count: 1, remaining: 0 });
    assert_eq!(gate.check(&who).await.unwrap(), Decision::Admitted { count: 2, remaining: 0 });
    assert!(gate.check(&who).await.unwrap().is_rejected());

    let mut conn = client.get_multiplexed_async_connection().await.expect("conn");
    let count: i64 = redis::cmd("GET").arg(&key).query_async(&mut conn).await.unwrap();
    assert_eq!(count, 2, "rejected request must not increment");
    let ttl: i64 = redis::cmd("TTL").arg(&key).query_async(&mut conn).await.unwrap();
    assert!(ttl > 0 && ttl <= 30, "ttl armed once on first increment, got {}", ttl);

    // Cleanup
    let _: i64 = redis::cmd("DEL").arg(&key).query_async(&mut conn).await.unwrap();
}

#[tokio::test]
async fn unknown_script_is_reported_not_reloaded() {
    let Some(client) = client().await else { return };
    let store = RedisQuotaStore::from_client(client).await.expect("connect");

    let bogus = quotagate::OperationHandle::new("0000000000000000000000000000000000000000");
    let err = store.increment_and_expire(&bogus, "quotagate-test-noscript", 30).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownOperation { .. }));
}

#[tokio::test]
async fn window_resets_after_expiry() {
    let Some(client) = client().await else { return };
    let store = RedisQuotaStore::from_client(client.clone()).await.expect("connect");
    let cfg = GateConfig::builder().limit(0).window_secs(1).build().unwrap();
    let gate = Gate::connect(store.clone(), cfg).await.expect("script load");

    let key = format!("quotagate-test-{}", uuid::Uuid::new_v4());
    let who = ClientId::new(key.clone());

    assert_eq!(gate.check(&who).await.unwrap(), Decision::Admitted { count: 1, remaining: 0 });
    match gate.check(&who).await.unwrap() {
        Decision::Rejected { retry_after, .. } => {
            assert!(retry_after <= std::time::Duration::from_secs(1), "got {:?}", retry_after)
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert_eq!(store.read(&key).await.unwrap(), None, "counter expired with its window");
    assert_eq!(store.remaining_window(&key).await.unwrap(), None);

    // First request of the new window starts from 1, not from the old count.
    assert_eq!(gate.check(&who).await.unwrap(), Decision::Admitted { count: 1, remaining: 0 });

    let mut conn = client.get_multiplexed_async_connection().await.expect("conn");
    let _: i64 = redis::cmd("DEL").arg(&key).query_async(&mut conn).await.unwrap();
}
