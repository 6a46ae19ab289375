//! Route table

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::{documents, health};
use crate::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(health::handle_health))
        .route("/api/documents", get(documents::list_documents))
        .route("/api/documents/upload", post(documents::upload_document))
        .route(
            "/api/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/api/documents/:id/download", get(documents::download_document))
}

async fn handle_root(State(state): State<AppState>) -> impl IntoResponse {
    let policy = state.validator.policy();

    Json(serde_json::json!({
        "app": state.app_name,
        "version": state.version,
        "upload": {
            "allowed_extensions": policy.allowed_extensions(),
            "max_file_size_bytes": policy.max_file_size(),
        },
        "endpoints": {
            "health": "/health",
            "upload": "/api/documents/upload",
            "documents": "/api/documents",
            "document": "/api/documents/{id}",
            "download": "/api/documents/{id}/download"
        }
    }))
}
