use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod error;
pub mod health;
pub mod metrics;
pub mod predict;

/// Prediction and health routes. The binary adds `/metrics` and the HTTP
/// layers on top.
pub fn api_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/model/predict", post(predict::predict))
        .route("/model/result/{job_id}", get(predict::get_result))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
