use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::error::GatewayError;
use super::state::HandlerState;
use super::{TALLY_STATUS_READY, TALLY_STATUS_VERIFIED, status_headers};
use crate::sample::{CheckKind, Sample};

fn parse_body<T: DeserializeOwned>(
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<T, GatewayError> {
    let Json(value) = payload?;
    serde_json::from_value(value)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request schema: {}", e)))
}

fn verified<T: serde::Serialize>(body: T) -> Response {
    (StatusCode::OK, status_headers(TALLY_STATUS_VERIFIED), Json(body)).into_response()
}

/// `POST /v1/verify`: one sample in, balanced result out.
#[instrument(skip(state, payload))]
pub async fn verify_handler(
    State(state): State<HandlerState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let sample: Sample = parse_body(payload)?;
    let result = state.pool.verify_balanced(sample).await;
    Ok(verified(result))
}

/// `POST /v1/verify/batch`: JSON array of samples, results in the same order.
#[instrument(skip(state, payload), fields(samples = tracing::field::Empty))]
pub async fn verify_batch_handler(
    State(state): State<HandlerState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let samples: Vec<Sample> = parse_body(payload)?;
    tracing::Span::current().record("samples", samples.len() as u64);
    debug!(samples = samples.len(), "Verifying batch");

    let results = state.pool.verify_batch(samples).await;
    Ok(verified(results))
}

/// `POST /v1/dispatch/{kind}`: a single check.
#[instrument(skip(state, payload))]
pub async fn dispatch_handler(
    State(state): State<HandlerState>,
    Path(kind): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let kind: CheckKind = kind.parse().map_err(|_| GatewayError::UnknownCheckKind(kind))?;
    let sample: Sample = parse_body(payload)?;

    let result = state.pool.dispatch(&sample, kind).await;
    Ok(verified(result))
}

/// `GET /v1/stats`
#[instrument(skip(state))]
pub async fn stats_handler(State(state): State<HandlerState>) -> Response {
    (
        StatusCode::OK,
        status_headers(TALLY_STATUS_READY),
        Json(state.pool.stats()),
    )
        .into_response()
}
