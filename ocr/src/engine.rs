use async_trait::async_trait;
use std::{io, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("formato no soportado: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("no se pudo ejecutar {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("{program} terminó con {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("el PDF no produjo ninguna página")]
    EmptyPdf,

    #[error("se superó el tiempo límite de {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Engine(String),
}

/// Capacidad externa que convierte una imagen o un PDF en texto.
///
/// El server no sabe nada del algoritmo: sólo le pasa la ruta del archivo
/// ya guardado y espera el texto.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Identificador corto del motor, para logs
    fn name(&self) -> &'static str;

    async fn extract_text(&self, path: &Path) -> Result<String, OcrError>;
}
