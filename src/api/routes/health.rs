//! Health check endpoint

use axum::Json;

use crate::api::types::HealthResponse;

/// GET /api/v1/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
