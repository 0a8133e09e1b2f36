//! HTTP surface of the delivery domain.
//!
//! Routes:
//! - `GET /` health check
//! - `GET /consumption/{device_id}/{date}` hourly buckets for one UTC day
//! - `GET /ws/{device_id}` live readings for one device

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::aggregator::HourlyBucket;
use crate::broadcast::Bridge;
use crate::storage::ReadingStore;

mod websocket;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub bridge: Bridge,
    /// Buffer size of each subscriber's outbound channel.
    pub subscriber_buffer: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>, bridge: Bridge, subscriber_buffer: usize) -> Self {
        Self {
            store,
            bridge,
            subscriber_buffer,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/consumption/{device_id}/{date}", get(hourly_consumption))
        .route("/ws/{device_id}", get(websocket::subscribe))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Never fails: malformed dates and storage errors both answer `[]`.
async fn hourly_consumption(
    State(state): State<AppState>,
    Path((device_id, date)): Path<(String, String)>,
) -> Json<Vec<HourlyBucket>> {
    match state.store.hourly_consumption(&device_id, &date).await {
        Ok(buckets) => Json(buckets),
        Err(e) => {
            error!(device_id = %device_id, date = %date, error = %e, "Hourly query failed");
            Json(Vec::new())
        }
    }
}
