//! Redis quota store for `quotagate` (companion crate).
//!
//! The increment+expire sequence runs as a Lua script so Redis executes it atomically for
//! every client of the server. The script body is sent once with `SCRIPT LOAD`; requests
//! invoke it by SHA1 with `EVALSHA`. If Redis restarts and forgets the script, `EVALSHA`
//! fails with `NOSCRIPT`, which surfaces as [`StoreError::UnknownOperation`]; this crate
//! does not reload it behind the caller's back.

use async_trait::async_trait;
use quotagate::{OperationHandle, QuotaStore, StoreError};
use redis::aio::ConnectionManager;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError};
use std::time::Duration;

/// `KEYS[1]` is the quota key, `ARGV[1]` the window in seconds.
pub const INCREMENT_AND_EXPIRE_SCRIPT: &str = r#"
local count = redis.call("INCR", KEYS[1])
if count == 1 then
    redis.call("EXPIRE", KEYS[1], ARGV[1])
end
return count
"#;

/// Where to find Redis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    /// `host:port`
    pub addr: String,
    /// Empty means no AUTH.
    pub password: Option<String>,
    /// Logical database index.
    pub db: i64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self { addr: "localhost:6379".to_string(), password: None, db: 0 }
    }
}

impl RedisSettings {
    /// Resolve into a connection description.
    ///
    /// `addr` is `host:port`; IPv6 hosts may be bracketed (`[::1]:6379`) or bare
    /// (`::1:6379`), the last colon separating the port.
    pub fn connection_info(&self) -> Result<ConnectionInfo, StoreError> {
        let addr = self.addr.trim();
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| StoreError::unavailable(format!("redis address {addr:?} has no port")))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| StoreError::unavailable(format!("redis address {addr:?} has a bad port")))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(StoreError::unavailable(format!("redis address {addr:?} has no host")));
        }

        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_string(), port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone().filter(|p| !p.is_empty()),
                ..Default::default()
            },
        })
    }
}

/// Quota store backed by a Redis server shared by all application instances.
#[derive(Clone)]
pub struct RedisQuotaStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisQuotaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisQuotaStore").field("conn", &"<redis::aio::ConnectionManager>").finish()
    }
}

impl RedisQuotaStore {
    /// Connect using `settings`.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the address is malformed or the server is
    /// unreachable.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, StoreError> {
        let client = redis::Client::open(settings.connection_info()?).map_err(map_redis_error)?;
        Self::from_client(client).await
    }

    /// Bring your own `redis::Client`.
    pub async fn from_client(client: redis::Client) -> Result<Self, StoreError> {
        let conn = client.get_connection_manager().await.map_err(map_redis_error)?;
        tracing::info!(target: "quotagate::redis", "connected to redis");
        Ok(Self { conn })
    }

    /// Bring your own connection manager.
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn prepare(&self) -> Result<OperationHandle, StoreError> {
        let mut conn = self.conn.clone();
        let sha: String = redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(INCREMENT_AND_EXPIRE_SCRIPT)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        tracing::debug!(target: "quotagate::redis", sha = %sha, "loaded increment+expire script");
        Ok(OperationHandle::new(sha))
    }

    async fn read(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await.map_err(map_redis_error)?;
        raw.map(|value| parse_count(key, value)).transpose()
    }

    async fn increment_and_expire(
        &self,
        operation: &OperationHandle,
        key: &str,
        window_secs: u64,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("EVALSHA")
            .arg(operation.as_str())
            .arg(1)
            .arg(key)
            .arg(window_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| match e.kind() {
                redis::ErrorKind::NoScriptError => {
                    tracing::error!(
                        target: "quotagate::redis",
                        sha = %operation,
                        "redis no longer has the increment+expire script"
                    );
                    StoreError::UnknownOperation { handle: operation.to_string() }
                }
                _ => map_redis_error(e),
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn remaining_window(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        let millis: i64 =
            redis::cmd("PTTL").arg(key).query_async(&mut conn).await.map_err(map_redis_error)?;
        Ok(pttl_to_duration(millis))
    }
}

/// `PTTL` answers -2 for a missing key and -1 for a key without expiry.
fn pttl_to_duration(millis: i64) -> Option<Duration> {
    u64::try_from(millis).ok().filter(|ms| *ms > 0).map(Duration::from_millis)
}

/// Counters are stored as decimal strings; zero or negative reads as 0.
fn parse_count(key: &str, value: String) -> Result<u64, StoreError> {
    match value.trim().parse::<i64>() {
        Ok(n) => Ok(u64::try_from(n).unwrap_or(0)),
        Err(_) => Err(StoreError::InvalidValue { key: key.to_string(), value }),
    }
}

fn map_redis_error(err: RedisError) -> StoreError {
    StoreError::unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_resolve_address_db_and_password() {
        let settings = RedisSettings {
            addr: "10.1.2.3:6380".into(),
            password: Some("p@ss/word".into()),
            db: 2,
        };
        let info = settings.connection_info().unwrap();
        assert_eq!(info.addr, ConnectionAddr::Tcp("10.1.2.3".into(), 6380));
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.password.as_deref(), Some("p@ss/word"));
    }

    #[test]
    fn ipv6_addresses_resolve_with_or_without_brackets() {
        for addr in ["[::1]:6379", "::1:6379"] {
            let settings = RedisSettings { addr: addr.into(), ..Default::default() };
            let info = settings.connection_info().unwrap();
            assert_eq!(info.addr, ConnectionAddr::Tcp("::1".into(), 6379), "{addr}");
        }
    }

    #[test]
    fn malformed_addresses_are_store_errors() {
        for addr in ["localhost", "localhost:redis", ":6379"] {
            let settings = RedisSettings { addr: addr.into(), ..Default::default() };
            assert!(settings.connection_info().is_err(), "{addr}");
        }
    }

    #[test]
    fn empty_password_means_no_auth() {
        let settings = RedisSettings { password: Some(String::new()), ..Default::default() };
        assert_eq!(settings.connection_info().unwrap().redis.password, None);
    }

    #[test]
    fn parse_count_accepts_integers() {
        assert_eq!(parse_count("k", "42".into()).unwrap(), 42);
        assert_eq!(parse_count("k", "-1".into()).unwrap(), 0);
    }

    #[test]
    fn parse_count_rejects_garbage() {
        let err = parse_count("k", "abc".into()).unwrap_err();
        assert_eq!(err, StoreError::InvalidValue { key: "k".into(), value: "abc".into() });
    }

    #[test]
    fn pttl_sentinels_mean_unknown() {
        assert_eq!(pttl_to_duration(-2), None);
        assert_eq!(pttl_to_duration(-1), None);
        assert_eq!(pttl_to_duration(0), None);
        assert_eq!(pttl_to_duration(4_500), Some(Duration::from_millis(4_500)));
    }

    #[test]
    fn script_only_arms_expiry_on_first_increment() {
        assert!(INCREMENT_AND_EXPIRE_SCRIPT.contains("INCR"));
        assert!(INCREMENT_AND_EXPIRE_SCRIPT.contains("if count == 1 then"));
    }
}
