use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::storage::StorageLayout;

pub type TaskId = String;

/// Unidad de trabajo: un archivo subido y el texto que produce el OCR.
///
/// No hay registro en memoria: el estado vive en disco. Que exista
/// `output_path` significa que la tarea terminó.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    /// Nombre que mandó el cliente, ya reducido a su último componente
    pub original_filename: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub submitted_at: DateTime<Utc>,
}

impl Task {
    /// Crea una tarea con un id nuevo. Las rutas salen siempre del layout.
    pub fn new(layout: &StorageLayout, original_filename: &str) -> Self {
        let id = new_task_id();
        Self {
            input_path: layout.input_path(&id, original_filename),
            output_path: layout.output_path(&id),
            original_filename: original_filename.to_string(),
            submitted_at: Utc::now(),
            id,
        }
    }

    /// Nombre del archivo de salida tal como se le devuelve al cliente.
    pub fn output_filename(&self) -> String {
        format!("{}.txt", self.id)
    }
}

/// Genera un id aleatorio de 128 bits (UUID v4).
pub fn new_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}

/// Un id que no cumple este formato nunca pudo haber sido emitido.
pub fn is_valid_task_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
