//! HTTP gateway (Axum) exposing a shared verifier pool.
//!
//! Several training processes can score against one pool by posting samples
//! here instead of each running their own workers.

pub mod error;
pub mod handler;
pub mod state;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::{ErrorResponse, GatewayError};
pub use handler::{dispatch_handler, stats_handler, verify_batch_handler, verify_handler};
pub use state::HandlerState;

/// Response header carrying a short machine-readable status.
pub const TALLY_STATUS_HEADER: &str = "X-Tally-Status";
pub const TALLY_STATUS_HEALTHY: &str = "healthy";
pub const TALLY_STATUS_READY: &str = "ready";
pub const TALLY_STATUS_NOT_READY: &str = "not_ready";
pub const TALLY_STATUS_VERIFIED: &str = "verified";
pub const TALLY_STATUS_ERROR: &str = "error";

pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/v1/stats", get(stats_handler))
        .route("/v1/verify", post(verify_handler))
        .route("/v1/verify/batch", post(verify_batch_handler))
        .route("/v1/dispatch/{kind}", post(dispatch_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub pool: String,
    pub workers: usize,
}

pub(crate) fn status_headers(status: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(TALLY_STATUS_HEADER, HeaderValue::from_static(status));
    headers
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    (
        StatusCode::OK,
        status_headers(TALLY_STATUS_HEALTHY),
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

/// Ready while the pool is up and has at least one slot.
#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<HandlerState>) -> Response {
    let workers = state.pool.num_workers();
    let is_ready = !state.pool.is_shut_down() && workers > 0;

    let (status_code, status_msg, header) = if is_ready {
        (StatusCode::OK, "ok", TALLY_STATUS_READY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "pending", TALLY_STATUS_NOT_READY)
    };

    (
        status_code,
        status_headers(header),
        Json(ReadyResponse {
            status: status_msg,
            pool: state.pool.name().to_string(),
            workers,
        }),
    )
        .into_response()
}
