//! HTTP server exposing feed state, selection changes, health and metrics

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::market::SelectionChange;
use crate::AppState;

/// Routes for the state API
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/book", get(order_book))
        .route("/depth", get(depth_curve))
        .route("/trades", get(trades))
        .route("/summary", get(summary))
        .route("/status", get(status))
        .route("/selection", post(change_selection))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the state API on an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "Starting HTTP server");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let view = state.feed.view();
    Json(serde_json::json!({
        "status": "healthy",
        "component": "depth-feed",
        "connected": view.is_connected(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode() {
        Ok(text) => text.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn order_book(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.feed.view().order_book())
}

async fn depth_curve(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.feed.view().depth_curve())
}

async fn trades(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.feed.view().trades())
}

async fn summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.feed.view().summary())
}

async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let view = state.feed.view();
    Json(serde_json::json!({
        "connected": view.is_connected(),
        "selection": view.selection(),
    }))
}

async fn change_selection(
    State(state): State<Arc<AppState>>,
    Json(change): Json<SelectionChange>,
) -> Response {
    match state.feed.change(change).await {
        Ok(selection) => Json(selection).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}
