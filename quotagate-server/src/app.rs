//! Router and response mapping.

use axum::error_handling::HandleErrorLayer;
use axum::extract::{ConnectInfo, Request};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use quotagate::{ClientId, GateError, RateLimitLayer, RateLimiter};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Build the application with `/limited-route` behind `limiter`.
pub fn router<L>(limiter: Arc<L>) -> Router
where
    L: RateLimiter + 'static,
{
    let quota = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(gate_error_response))
        .layer(RateLimitLayer::from_shared(limiter, peer_ip));

    Router::new()
        .route("/limited-route", get(limited_route))
        .route_layer(quota)
        .layer(TraceLayer::new_for_http())
}

/// Client identity is the TCP peer address; forwarded-for headers are not trusted.
fn peer_ip(req: &Request) -> Option<ClientId> {
    req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| ClientId::from(*addr))
}

async fn limited_route() -> Json<Value> {
    Json(json!({ "message": "Limited route" }))
}

async fn gate_error_response(err: GateError<Infallible>) -> Response {
    match err {
        GateError::Rejected { retry_after, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs(retry_after).to_string())],
            Json(json!({ "message": "Rate limit exceeded" })),
        )
            .into_response(),
        GateError::Store(e) => {
            tracing::error!(error = %e, "quota check failed");
            internal_error()
        }
        GateError::MissingClientId => {
            tracing::error!("connection info missing; serve with into_make_service_with_connect_info");
            internal_error()
        }
        GateError::Inner(never) => match never {},
    }
}

/// Whole seconds, rounded up so clients never retry before the window resets.
fn retry_after_secs(left: Duration) -> u64 {
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "Internal Server Error" })))
        .into_response()
}
