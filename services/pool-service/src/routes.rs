//! HTTP surface for game servers
//!
//! Endpoints:
//! - GET  /api/randomness/available   allocate one account
//! - POST /api/randomness/return      hand an account back for cooldown
//! - GET  /api/randomness/pool/stats  counts by status
//! - GET  /health                     pool health
//! - GET  /metrics                    Prometheus exposition

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use randomness_pool::PoolManager;
use serde::Deserialize;
use tracing::{Instrument, error, info, info_span};

const NO_ACCOUNTS_MESSAGE: &str = "No randomness accounts available. Please try again later.";

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PoolManager>,
    /// Cooldown used when a return request does not carry one
    pub default_cooldown: Duration,
    pub prometheus: PrometheusHandle,
}

/// Build the router with all routes and shared state.
///
/// `max_connections` bounds concurrent in-flight requests; excess requests
/// queue rather than fail.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/api/randomness/available", get(allocate_handler))
        .route("/api/randomness/return", post(return_handler))
        .route("/api/randomness/pool/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

fn request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// GET /api/randomness/available: allocate an account for a new match.
///
/// Any allocation failure is reported the same way; the reason is in the logs.
async fn allocate_handler(State(state): State<AppState>) -> Response {
    let span = info_span!("allocate", request_id = %request_id());
    async move {
        match state.pool.allocate().await {
            Ok(account) => {
                (StatusCode::OK, Json(serde_json::json!({ "randomness_account": account })))
                    .into_response()
            }
            Err(e) => {
                info!(reason = %e, "no account allocated");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({ "error": NO_ACCOUNTS_MESSAGE })),
                )
                    .into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Request body for the return endpoint.
#[derive(Deserialize)]
struct ReturnRequest {
    account: String,
    #[serde(default)]
    cooldown_secs: Option<u64>,
}

/// POST /api/randomness/return: a match finished with its account.
///
/// Always accepted. Pool bookkeeping problems are logged, never surfaced to the
/// game server finishing its match.
async fn return_handler(
    State(state): State<AppState>,
    Json(body): Json<ReturnRequest>,
) -> impl IntoResponse {
    let span = info_span!("return", request_id = %request_id(), account_id = %body.account);
    let cooldown = body
        .cooldown_secs
        .map(Duration::from_secs)
        .unwrap_or(state.default_cooldown);

    state
        .pool
        .return_account(&body.account, cooldown)
        .instrument(span)
        .await;

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    )
}

/// GET /api/randomness/pool/stats: account counts by status.
async fn stats_handler(State(state): State<AppState>) -> Response {
    match state.pool.stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to read pool stats");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /health: 200 while the pool can serve or grow, 503 when it cannot.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.pool.health().await;
    let status_code = if body["status"] == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status_code, Json(body))
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
