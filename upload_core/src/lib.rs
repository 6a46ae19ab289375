//! Core library for the document upload service: validation, storage and
//! the HTTP surface.

pub mod config;
pub mod database;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;

pub use crate::config::AppConfig;
pub use database::get_database_pool;
pub use documents::{
    AcceptedFile, Document, DocumentRepository, DocumentStore, InMemoryDocumentRepository,
    SqliteDocumentRepository, UploadPolicy, UploadValidator, UploadedFile, ValidationError,
};
pub use error::{AppError, Result};
pub use handlers::routes::create_routes;

use axum::{extract::DefaultBodyLimit, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub validator: UploadValidator,
    pub documents: DocumentStore,
}

impl AppState {
    pub fn new(validator: UploadValidator, documents: DocumentStore) -> Self {
        Self {
            app_name: "Document Upload Service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            validator,
            documents,
        }
    }

    /// State backed by the in-memory repository, storing bytes under `root`.
    pub fn in_memory(policy: UploadPolicy, root: impl Into<std::path::PathBuf>) -> Self {
        let repository: Arc<dyn DocumentRepository> = Arc::new(InMemoryDocumentRepository::new());
        Self::new(UploadValidator::new(policy), DocumentStore::new(root, repository))
    }
}

pub fn create_app(state: AppState, config: &AppConfig) -> Router {
    let body_limit = usize::try_from(config.upload.max_request_body_bytes).unwrap_or(usize::MAX);

    let router = Router::new()
        .merge(create_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::cors::cors_layer_from_config(&config.cors));

    middleware::logging::with_request_logging(router).with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
