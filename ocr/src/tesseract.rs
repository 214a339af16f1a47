use async_trait::async_trait;
use common::InputKind;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;
use tracing::debug;

use crate::engine::{OcrEngine, OcrError};

#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Ejecutable de tesseract (nombre en PATH o ruta absoluta)
    pub tesseract_path: String,
    /// Ejecutable de pdftoppm (poppler) para rasterizar PDFs
    pub pdftoppm_path: String,
    /// Idioma(s) de tesseract, ej: "eng" o "eng+spa"
    pub language: String,
    pub pdf_dpi: u32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".to_string(),
            pdftoppm_path: "pdftoppm".to_string(),
            language: "eng".to_string(),
            pdf_dpi: 300,
        }
    }
}

/// Motor OCR que delega en los binarios `tesseract` y `pdftoppm`.
///
/// Imágenes: `tesseract <archivo> stdout -l <lang>`.
/// PDFs: se rasteriza cada página a PNG en un directorio temporal y se pasa
/// página por página a tesseract, en orden.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    async fn recognize_image(&self, path: &Path) -> Result<String, OcrError> {
        let mut cmd = Command::new(&self.config.tesseract_path);
        cmd.arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language);

        let stdout = run_command(cmd, &self.config.tesseract_path).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    async fn recognize_pdf(&self, path: &Path) -> Result<String, OcrError> {
        // se borra al salir de la función
        let pages_dir = tempfile::Builder::new().prefix("ocr-pdf-").tempdir()?;

        let mut cmd = Command::new(&self.config.pdftoppm_path);
        cmd.arg("-r")
            .arg(self.config.pdf_dpi.to_string())
            .arg("-png")
            .arg(path)
            .arg(pages_dir.path().join("page"));
        run_command(cmd, &self.config.pdftoppm_path).await?;

        let pages = list_pages(pages_dir.path()).await?;
        if pages.is_empty() {
            return Err(OcrError::EmptyPdf);
        }
        debug!("PDF {} rasterizado en {} páginas", path.display(), pages.len());

        let mut texts = Vec::with_capacity(pages.len());
        for page in &pages {
            texts.push(self.recognize_image(page).await?);
        }

        Ok(texts.join("\n").trim().to_string())
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn extract_text(&self, path: &Path) -> Result<String, OcrError> {
        match InputKind::from_path(path) {
            Some(InputKind::Image) => self.recognize_image(path).await,
            Some(InputKind::Pdf) => self.recognize_pdf(path).await,
            None => Err(OcrError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Ejecuta el comando y devuelve su stdout. Si el future se descarta
/// (timeout del dispatcher) el proceso hijo se mata.
async fn run_command(mut cmd: Command, program: &str) -> Result<Vec<u8>, OcrError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd.output().await.map_err(|source| OcrError::Spawn {
        program: program.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(OcrError::ProcessFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

/// PNGs que dejó pdftoppm. Dentro de una misma corrida todos los nombres
/// tienen el mismo relleno de ceros, así que ordenar por nombre respeta el
/// orden de páginas.
async fn list_pages(dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut pages = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_png = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        if is_png {
            pages.push(path);
        }
    }
    pages.sort();
    Ok(pages)
}
