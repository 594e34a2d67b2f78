//! HTTP endpoints exposing the aggregator.

use crate::aggregator::HealthAggregator;
use crate::vitals::Vitals;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

/// Routes:
///
/// - `GET /health` status only, 503 when unhealthy
/// - `GET /health/detailed` full snapshot, 503 when unhealthy
/// - `GET /health/live` always alive while the process answers
/// - `GET /health/ready` always ready while the process answers
pub fn health_router<V>(aggregator: Arc<HealthAggregator<V>>) -> Router
where
    V: Vitals,
{
    Router::new()
        .route("/health", get(health_handler::<V>))
        .route("/health/detailed", get(detailed_handler::<V>))
        .route("/health/live", get(live_handler))
        .route("/health/ready", get(ready_handler))
        .with_state(aggregator)
}

const fn status_for(healthy: bool) -> StatusCode {
    if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn health_handler<V>(State(aggregator): State<Arc<HealthAggregator<V>>>) -> Response
where
    V: Vitals,
{
    let healthy = aggregator.is_healthy();
    let status = if healthy { "healthy" } else { "unhealthy" };

    (
        status_for(healthy),
        Json(json!({ "status": status, "timestamp": Utc::now() })),
    )
        .into_response()
}

async fn detailed_handler<V>(State(aggregator): State<Arc<HealthAggregator<V>>>) -> Response
where
    V: Vitals,
{
    let snapshot = aggregator.snapshot();

    (status_for(snapshot.healthy), Json(snapshot)).into_response()
}

async fn live_handler() -> Response {
    Json(json!({ "alive": true })).into_response()
}

async fn ready_handler() -> Response {
    Json(json!({ "status": "ready", "timestamp": Utc::now() })).into_response()
}
