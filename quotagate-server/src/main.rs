//! Server entry point.
//!
//! Startup is all-or-nothing: if Redis is unreachable or the increment+expire script
//! cannot be loaded, the process exits instead of serving unprotected traffic.

use anyhow::Context;
use quotagate::telemetry::LogSink;
use quotagate::Gate;
use quotagate_redis::RedisQuotaStore;
use quotagate_server::{router, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quotagate=info,quotagate_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let store = RedisQuotaStore::connect(&config.redis)
        .await
        .with_context(|| format!("connecting to redis at {}", config.redis.addr))?;
    let gate = Gate::connect(store, config.gate.clone())
        .await
        .context("registering increment+expire script")?
        .with_telemetry(LogSink);

    let app = router(Arc::new(gate));

    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
