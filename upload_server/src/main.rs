//! Main entry point for the document upload server

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use upload_core::{
    create_app, get_database_pool, run_server, AppConfig, AppState, DocumentRepository,
    DocumentStore, InMemoryDocumentRepository, SqliteDocumentRepository, UploadValidator,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());
    info!("Upload directory: {}", config.upload.dir.display());

    config.create_directories()
        .map_err(|e| anyhow::anyhow!("Failed to create directories: {}", e))?;

    let addr: SocketAddr = config.bind_address().parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let state = build_state(&config).await?;

    let policy = state.validator.policy();
    info!(
        "Accepting {:?} up to {} bytes",
        policy.allowed_extensions(),
        policy.max_file_size()
    );
    info!("Document storage: {}", state.documents.backend());

    let app = create_app(state, &config);

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn build_state(config: &AppConfig) -> Result<AppState> {
    let repository: Arc<dyn DocumentRepository> = match get_database_pool(&config.database).await {
        Ok(pool) => {
            info!("Database initialized successfully");
            Arc::new(SqliteDocumentRepository::new(pool))
        }
        Err(e) => {
            warn!("Failed to initialize database, falling back to in-memory store: {}", e);
            Arc::new(InMemoryDocumentRepository::new())
        }
    };

    let documents = DocumentStore::new(config.upload.dir.clone(), repository);
    documents.initialize().await
        .map_err(|e| anyhow::anyhow!("Failed to initialize document store: {}", e))?;

    Ok(AppState::new(UploadValidator::new(config.upload.policy()), documents))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let default_level = if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            };

            format!(
                "{}={},upload_core={},tower_http=debug,axum=debug",
                env!("CARGO_CRATE_NAME").replace('-', "_"),
                default_level,
                default_level
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
