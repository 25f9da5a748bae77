//! Voltline analyze server library logic.
//!
//! A single-purpose HTTP service: `POST /api/analyze` forwards one turn of
//! helpline conversation to the upstream language model and returns its
//! structured verdict. The endpoint performs no validation beyond JSON
//! parsing and keeps no state between requests.

pub mod api_analyze;
pub mod config;
pub mod llm;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Upstream chat-completion client.
    pub chat: llm::ChatClient,
}

/// Maximum request body size (64 KiB). A single spoken turn is far smaller.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(api_analyze::analyze_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
