// =============================================================================
// HTTP API — Axum 0.7
// =============================================================================
//
//   GET /health            liveness + configured instruments
//   GET /history/:ticker   recent candles, oldest-first
//   GET /ws                live ticker relay (see `api::ws`)
//
// CORS is fully permissive: any origin, method and header.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;

use crate::app_state::AppState;
use crate::error::HistoryError;
use crate::types::Candle;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/history/:ticker", get(history))
        .route("/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    products: Vec<String>,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
        products: state.config.product_ids.clone(),
    })
}

// =============================================================================
// History
// =============================================================================

async fn history(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<Json<Vec<Candle>>, HistoryError> {
    let candles = state.candles.fetch_history(&ticker).await?;
    debug!(ticker = %ticker, count = candles.len(), "history served");
    Ok(Json(candles))
}

// =============================================================================
// Tests
// =============================================================================
