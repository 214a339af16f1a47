mod audit;
mod config;
mod handlers;
mod state;

use anyhow::Context;
use common::StorageLayout;
use ocr::{OcrDispatcher, TesseractEngine};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::audit::AuditLog;
use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    // RUST_LOG manda; si no está, OCR_LOG_LEVEL o el default
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    for w in &config.warnings {
        warn!("{}", w);
    }

    let layout = StorageLayout::new(&config.storage_dir);
    layout
        .ensure_directories()
        .context("no se pudo preparar el directorio de storage")?;

    let audit = AuditLog::open(&config.log_dir)
        .with_context(|| format!("no se pudo abrir el audit log en {}", config.log_dir.display()))?;
    info!(
        "audit log en {}",
        config.log_dir.join(audit::AUDIT_FILE_NAME).display()
    );

    let engine = Arc::new(TesseractEngine::new(config.tesseract.clone()));
    let ocr = OcrDispatcher::new(engine, config.max_concurrency, config.ocr_timeout);
    info!(
        "OCR con {} (max_concurrency={}, timeout={:?})",
        ocr.engine_name(),
        config.max_concurrency,
        config.ocr_timeout
    );

    let state = AppState::new(layout, ocr, audit);

    // router HTTP
    let app = handlers::build_router(state, config.max_upload_bytes);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", config.bind_addr))?;
    info!(
        "server escuchando en {} (storage={})",
        listener.local_addr()?,
        config.storage_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server detenido");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("no se pudo escuchar ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("ctrl-c recibido, cerrando...");
}
