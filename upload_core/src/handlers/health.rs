//! Health check handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::AppState;

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().timestamp();

    let documents = match state.documents.health_check().await {
        Ok(()) => state.documents.count().await,
        Err(e) => Err(e),
    };

    match documents {
        Ok(documents) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "storage": state.documents.backend(),
                "documents": documents,
                "version": state.version,
                "timestamp": timestamp,
            })),
        ),
        Err(e) => {
            warn!("Storage health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "storage": state.documents.backend(),
                    "version": state.version,
                    "timestamp": timestamp,
                })),
            )
        }
    }
}
