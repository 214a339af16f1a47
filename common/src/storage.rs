use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::task::is_valid_task_id;

pub const DEFAULT_STORAGE_ROOT: &str = "storage";

/// Mapeo determinista `task_id` → rutas de entrada y salida.
///
/// Es el único lugar donde se calculan esas rutas. Las escrituras son
/// atómicas: primero a un temporal en el mismo directorio y luego rename,
/// así nadie ve un archivo a medio escribir.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            input_dir: root.join("input"),
            output_dir: root.join("output"),
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Crea `input/` y `output/` si faltan. Idempotente.
    pub fn ensure_directories(&self) -> Result<(), StorageError> {
        for dir in [&self.input_dir, &self.output_dir] {
            fs::create_dir_all(dir).map_err(|source| StorageError::Unavailable {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn input_path(&self, task_id: &str, filename: &str) -> PathBuf {
        self.input_dir.join(format!("{}_{}", task_id, filename))
    }

    pub fn output_path(&self, task_id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.txt", task_id))
    }

    pub fn write_input(
        &self,
        task_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.input_path(task_id, filename);
        write_atomic(&path, bytes)?;
        Ok(path)
    }

    pub fn write_output(&self, task_id: &str, text: &str) -> Result<PathBuf, StorageError> {
        let path = self.output_path(task_id);
        write_atomic(&path, text.as_bytes())?;
        Ok(path)
    }

    /// `Ok(None)` si no hay resultado (nunca emitido o todavía en curso).
    pub fn read_output(&self, task_id: &str) -> Result<Option<String>, StorageError> {
        if !is_valid_task_id(task_id) {
            return Ok(None);
        }

        let path = self.output_path(task_id);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Read { path, source }),
        };

        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StorageError::NotUtf8 { path })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let to_err = |source: io::Error| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    // el temporal se borra solo si algo falla antes del persist
    let mut tmp = NamedTempFile::new_in(dir).map_err(to_err)?;
    tmp.write_all(bytes).map_err(to_err)?;
    tmp.as_file().sync_all().map_err(to_err)?;
    tmp.persist(path).map_err(|e| to_err(e.error))?;
    Ok(())
}
