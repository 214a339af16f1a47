use std::path::Path;

use crate::error::ServiceError;

/// Largo máximo del nombre del cliente en bytes. El archivo de entrada se
/// guarda como `<uuid de 36>_<nombre>` y la mayoría de los filesystems
/// corta en 255 bytes por componente.
pub const MAX_FILENAME_BYTES: usize = 255 - 37;

/// Extensiones aceptadas (en minúscula, sin punto).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "pdf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Pdf,
}

impl InputKind {
    /// Clasifica por extensión, sin mirar el contenido.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(InputKind::Pdf),
            e if SUPPORTED_EXTENSIONS.contains(&e) => Some(InputKind::Image),
            _ => None,
        }
    }
}

/// Se queda con el último componente del nombre que manda el cliente,
/// tanto con separadores `/` como `\`.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Valida el nombre y devuelve el tipo de entrada.
pub fn classify_filename(filename: &str) -> Result<InputKind, ServiceError> {
    InputKind::from_path(Path::new(filename)).ok_or_else(|| {
        ServiceError::InvalidFileType(format!(
            "'{}' (se aceptan: {})",
            filename,
            SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

/// Nombre saneado y validado, listo para armar la ruta de entrada.
pub fn validate_upload_filename(raw: &str) -> Result<String, ServiceError> {
    let filename = sanitize_filename(raw)
        .ok_or_else(|| ServiceError::InvalidFileType(format!("nombre de archivo inválido: {:?}", raw)))?;
    if filename.len() > MAX_FILENAME_BYTES {
        return Err(ServiceError::InvalidFileType(format!(
            "nombre de archivo demasiado largo ({} bytes, máximo {})",
            filename.len(),
            MAX_FILENAME_BYTES
        )));
    }
    classify_filename(&filename)?;
    Ok(filename)
}
