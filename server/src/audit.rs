//! Registro de auditoría del ciclo de vida de cada tarea.
//!
//! Una línea por evento: `<timestamp> <NIVEL> task=<id> <evento> [detalle]`.
//! Se escribe con un writer no bloqueante de tracing-appender; si falla la
//! escritura el request sigue igual.

use chrono::{SecondsFormat, Utc};
use std::{fmt, fs, io::Write, path::Path, sync::Arc};
use tracing::{error, info, warn, Level};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};

pub const AUDIT_FILE_NAME: &str = "audit.log";

#[derive(Debug, Clone)]
pub enum AuditEvent<'a> {
    Submitted { filename: &'a str },
    Rejected { filename: &'a str, reason: String },
    InputSaved { path: &'a Path },
    InputSaveFailed { error: String },
    OcrCompleted { engine: &'static str, chars: usize },
    OcrFailed { error: String },
    OutputSaved { path: &'a Path },
    OutputSaveFailed { error: String },
    Completed { input: &'a Path, output: &'a Path },
    ResultRead,
    ResultNotFound,
    ResultReadFailed { error: String },
}

impl AuditEvent<'_> {
    pub fn level(&self) -> Level {
        match self {
            AuditEvent::Rejected { .. } | AuditEvent::ResultNotFound => Level::WARN,
            AuditEvent::InputSaveFailed { .. }
            | AuditEvent::OcrFailed { .. }
            | AuditEvent::OutputSaveFailed { .. }
            | AuditEvent::ResultReadFailed { .. } => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

impl fmt::Display for AuditEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::Submitted { filename } => write!(f, "submitted filename={:?}", filename),
            AuditEvent::Rejected { filename, reason } => {
                write!(f, "rejected filename={:?} reason={:?}", filename, reason)
            }
            AuditEvent::InputSaved { path } => write!(f, "input_saved path={}", path.display()),
            AuditEvent::InputSaveFailed { error } => write!(f, "input_save_failed error={:?}", error),
            AuditEvent::OcrCompleted { engine, chars } => {
                write!(f, "ocr_completed engine={} chars={}", engine, chars)
            }
            AuditEvent::OcrFailed { error } => write!(f, "ocr_failed error={:?}", error),
            AuditEvent::OutputSaved { path } => write!(f, "output_saved path={}", path.display()),
            AuditEvent::OutputSaveFailed { error } => {
                write!(f, "output_save_failed error={:?}", error)
            }
            AuditEvent::Completed { input, output } => write!(
                f,
                "completed input={} output={}",
                input.display(),
                output.display()
            ),
            AuditEvent::ResultRead => write!(f, "result_read"),
            AuditEvent::ResultNotFound => write!(f, "result_not_found"),
            AuditEvent::ResultReadFailed { error } => {
                write!(f, "result_read_failed error={:?}", error)
            }
        }
    }
}

struct Sink {
    writer: NonBlocking,
    // al soltarlo se vacía el buffer pendiente
    _guard: WorkerGuard,
}

/// Sink de auditoría. Se crea en `main` y viaja dentro del `AppState`.
#[derive(Clone)]
pub struct AuditLog {
    sink: Option<Arc<Sink>>,
}

impl AuditLog {
    /// Abre (o crea) `<dir>/audit.log` en modo append.
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix("audit")
            .filename_suffix("log")
            .build(dir)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        Ok(Self {
            sink: Some(Arc::new(Sink {
                writer,
                _guard: guard,
            })),
        })
    }

    /// Sólo tracing, sin archivo.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn record(&self, task_id: Option<&str>, event: AuditEvent<'_>) {
        let task = task_id.unwrap_or("-");

        match event.level() {
            Level::ERROR => error!(task_id = task, "{}", event),
            Level::WARN => warn!(task_id = task, "{}", event),
            _ => info!(task_id = task, "{}", event),
        }

        if let Some(sink) = &self.sink {
            let line = format_line(task, &event);
            let mut writer = sink.writer.clone();
            let _ = writer.write_all(line.as_bytes());
        }
    }
}

fn format_line(task: &str, event: &AuditEvent<'_>) -> String {
    format!(
        "{} {} task={} {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        event.level(),
        task,
        event
    )
}
