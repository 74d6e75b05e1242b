//! Server configuration from environment variables.

use anyhow::Context;
use quotagate::GateConfig;
use quotagate_redis::RedisSettings;
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR: &str = "QUOTAGATE_LISTEN_ADDR";
pub const REDIS_ADDR: &str = "QUOTAGATE_REDIS_ADDR";
pub const REDIS_PASSWORD: &str = "QUOTAGATE_REDIS_PASSWORD";
pub const REDIS_DB: &str = "QUOTAGATE_REDIS_DB";
pub const LIMIT: &str = "QUOTAGATE_LIMIT";
pub const WINDOW_SECS: &str = "QUOTAGATE_WINDOW_SECS";
pub const STORE_TIMEOUT_MS: &str = "QUOTAGATE_STORE_TIMEOUT_MS";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub redis: RedisSettings,
    pub gate: GateConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset variables take their defaults.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = get(LISTEN_ADDR)
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .with_context(|| format!("{} must be host:port", LISTEN_ADDR))?;

        let redis = RedisSettings {
            addr: get(REDIS_ADDR).unwrap_or_else(|| "localhost:6379".to_string()),
            password: get(REDIS_PASSWORD).filter(|p| !p.is_empty()),
            db: parse_or(&get, REDIS_DB, 0)?,
        };

        let mut gate = GateConfig::builder();
        if let Some(limit) = parse_opt(&get, LIMIT)? {
            gate = gate.limit(limit);
        }
        if let Some(secs) = parse_opt(&get, WINDOW_SECS)? {
            gate = gate.window_secs(secs);
        }
        if let Some(ms) = parse_opt(&get, STORE_TIMEOUT_MS)? {
            gate = gate.store_timeout(Duration::from_millis(ms));
        }
        let gate = gate.build().context("invalid quota configuration")?;

        Ok(Self { listen_addr, redis, gate })
    }
}

fn parse_opt<F, T>(get: &F, name: &str) -> anyhow::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(name)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("{} has invalid value {:?}", name, raw)))
        .transpose()
}

fn parse_or<F, T>(get: &F, name: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(get, name)?.unwrap_or(default))
}
