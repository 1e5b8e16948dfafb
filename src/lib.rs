pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/extract", post(handlers::extract::extract))
        .route("/select", post(handlers::select::select))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
