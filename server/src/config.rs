use ocr::{dispatcher::DEFAULT_OCR_CONCURRENCY, TesseractConfig};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_LEVEL: &str = "server=debug,ocr=debug,tower_http=info";
pub const DEFAULT_OCR_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Configuración del server, leída una sola vez al arrancar.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub storage_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Filtro de tracing si no hay RUST_LOG
    pub log_level: String,
    pub max_concurrency: usize,
    /// `None` = sin límite
    pub ocr_timeout: Option<Duration>,
    pub max_upload_bytes: usize,
    pub tesseract: TesseractConfig,
    /// Valores inválidos que se reemplazaron por el default; se loguean
    /// cuando el subscriber ya está listo
    pub warnings: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let timeout_secs: u64 =
            parse_or(&lookup, "OCR_TIMEOUT_SECS", DEFAULT_OCR_TIMEOUT_SECS, &mut warnings);

        let defaults = TesseractConfig::default();
        let tesseract = TesseractConfig {
            tesseract_path: string_or("TESSERACT_PATH", &defaults.tesseract_path),
            pdftoppm_path: string_or("PDFTOPPM_PATH", &defaults.pdftoppm_path),
            language: string_or("OCR_LANG", &defaults.language),
            pdf_dpi: parse_or(&lookup, "OCR_PDF_DPI", defaults.pdf_dpi, &mut warnings),
        };

        Self {
            bind_addr: string_or("OCR_BIND_ADDR", DEFAULT_BIND_ADDR),
            storage_dir: PathBuf::from(string_or(
                "OCR_STORAGE_DIR",
                common::storage::DEFAULT_STORAGE_ROOT,
            )),
            log_dir: PathBuf::from(string_or("OCR_LOG_DIR", DEFAULT_LOG_DIR)),
            log_level: string_or("OCR_LOG_LEVEL", DEFAULT_LOG_LEVEL),
            max_concurrency: parse_or(
                &lookup,
                "OCR_MAX_CONCURRENCY",
                DEFAULT_OCR_CONCURRENCY,
                &mut warnings,
            ),
            ocr_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            max_upload_bytes: parse_or(
                &lookup,
                "OCR_MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
                &mut warnings,
            ),
            tesseract,
            warnings,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T, warnings: &mut Vec<String>) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warnings.push(format!("{}={:?} no es válido, uso el valor por defecto", key, raw));
                default
            }
        },
    }
}
