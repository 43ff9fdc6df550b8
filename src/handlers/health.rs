//! Liveness of the service and its backing stores

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use super::state::AppState;
use crate::infrastructure::database::ping;

/// GET /api/health
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = Utc::now().to_rfc3339();

    let checks = async {
        ping(&state.db).await?;
        state.cache.ping().await
    };

    match checks.await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": timestamp,
                "services": {
                    "database": "connected",
                    "cache": state.cache.backend().as_str(),
                },
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": timestamp,
                    "error": e.to_string(),
                })),
            )
        }
    }
}
