use std::{path::Path, sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::engine::{OcrEngine, OcrError};

pub const DEFAULT_OCR_CONCURRENCY: usize = 2;

/// Ejecuta trabajos de OCR con un máximo de `max_concurrency` a la vez.
///
/// Cada request espera su permiso y después espera al motor; el resto de
/// requests sigue atendiéndose mientras tanto.
#[derive(Clone)]
pub struct OcrDispatcher {
    engine: Arc<dyn OcrEngine>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl OcrDispatcher {
    pub fn new(engine: Arc<dyn OcrEngine>, max_concurrency: usize, timeout: Option<Duration>) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            timeout,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub async fn run(&self, path: &Path) -> Result<String, OcrError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| OcrError::Engine("dispatcher de OCR cerrado".to_string()))?;

        debug!("OCR ({}) sobre {}", self.engine.name(), path.display());

        let job = self.engine.extract_text(path);
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, job).await {
                Ok(res) => res,
                Err(_) => {
                    warn!("OCR sobre {} superó {:?}", path.display(), limit);
                    Err(OcrError::Timeout(limit))
                }
            },
            None => job.await,
        }
    }
}
