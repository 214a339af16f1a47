use std::{io, path::PathBuf};
use thiserror::Error;

use crate::api::ErrorKind;

/// Fallos del layout de almacenamiento.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no se pudo preparar el directorio {path}: {source}")]
    Unavailable { path: PathBuf, source: io::Error },

    #[error("no se pudo escribir {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("no se pudo leer {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("{path} no contiene UTF-8 válido")]
    NotUtf8 { path: PathBuf },
}

/// Error de cara al cliente. Cada variante corresponde a un `ErrorKind`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("tipo de archivo no soportado: {0}")]
    InvalidFileType(String),

    #[error("upload inválido: {0}")]
    InvalidUpload(String),

    #[error("no hay resultado para la tarea {0}")]
    ResultNotFound(String),

    #[error("{0}")]
    StorageWriteFailed(String),

    #[error("{0}")]
    StorageReadFailed(String),

    #[error("{0}")]
    StorageUnavailable(String),

    #[error("falló el OCR: {0}")]
    OcrFailed(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidFileType(_) => ErrorKind::InvalidFileType,
            ServiceError::InvalidUpload(_) => ErrorKind::InvalidUpload,
            ServiceError::ResultNotFound(_) => ErrorKind::ResultNotFound,
            ServiceError::StorageWriteFailed(_) => ErrorKind::StorageWriteFailed,
            ServiceError::StorageReadFailed(_) => ErrorKind::StorageReadFailed,
            ServiceError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            ServiceError::OcrFailed(_) => ErrorKind::OcrFailed,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        let detail = err.to_string();
        match err {
            StorageError::Unavailable { .. } => ServiceError::StorageUnavailable(detail),
            StorageError::Write { .. } => ServiceError::StorageWriteFailed(detail),
            StorageError::Read { .. } | StorageError::NotUtf8 { .. } => {
                ServiceError::StorageReadFailed(detail)
            }
        }
    }
}
