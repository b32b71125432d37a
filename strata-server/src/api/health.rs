//! Health Check API Handler

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
/// Liveness probe; needs no tenant key
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
