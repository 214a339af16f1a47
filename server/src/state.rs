// server/src/state.rs

use common::StorageLayout;
use ocr::OcrDispatcher;
use std::sync::Arc;

use crate::audit::AuditLog;

/// Estado compartido por los handlers. No hay nada mutable en memoria:
/// todo el estado de las tareas vive en disco.
#[derive(Clone)]
pub struct AppState {
    pub layout: Arc<StorageLayout>,
    pub ocr: OcrDispatcher,
    pub audit: AuditLog,
}

impl AppState {
    pub fn new(layout: StorageLayout, ocr: OcrDispatcher, audit: AuditLog) -> Self {
        Self {
            layout: Arc::new(layout),
            ocr,
            audit,
        }
    }
}
