use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/* --------- Respuestas HTTP compartidas entre server y client --------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub task_id: TaskId,
    /// Nombre del archivo de texto generado, `<task_id>.txt`
    pub ocr_output_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResultResponse {
    pub task_id: TaskId,
    pub ocr_text: String,
}

/// Tipo de error que viaja en el cuerpo de las respuestas fallidas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidFileType,
    InvalidUpload,
    ResultNotFound,
    StorageWriteFailed,
    StorageReadFailed,
    StorageUnavailable,
    OcrFailed,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidFileType | ErrorKind::InvalidUpload => 400,
            ErrorKind::ResultNotFound => 404,
            ErrorKind::StorageWriteFailed
            | ErrorKind::StorageReadFailed
            | ErrorKind::StorageUnavailable
            | ErrorKind::OcrFailed => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub detail: String,
}
