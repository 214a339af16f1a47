use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{
    validate_upload_filename, ErrorBody, HealthResponse, InfoResponse, OcrResultResponse,
    ServiceError, StorageError, Task, UploadResponse,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use crate::audit::AuditEvent;
use crate::state::AppState;

pub const WELCOME_MESSAGE: &str = "Smart OCR Agent is live!";
pub const UPLOAD_OK_MESSAGE: &str = "File uploaded successfully";

/// Nombre del campo multipart que trae el archivo
const FILE_FIELD: &str = "file";

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        // el front web llama con barra final
        .route("/api/v1/upload", post(upload))
        .route("/api/v1/upload/", post(upload))
        .route("/api/v1/result/:task_id", get(get_result))
        .route("/api/v1/result/:task_id/", get(get_result))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- errores ---------------- */

/// Convierte un `ServiceError` en `{error, detail}` con su código HTTP.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: kind,
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn root() -> Json<InfoResponse> {
    Json(InfoResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

// Recibe el archivo, lo guarda, corre el OCR y guarda el texto.
// El cliente queda esperando hasta que termina el OCR.
async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let audit = &state.audit;

    // Un body que no es multipart también responde con {error, detail}
    let read = match multipart {
        Ok(mut m) => read_file_field(&mut m).await,
        Err(rejection) => Err(ServiceError::InvalidUpload(rejection.body_text())),
    };
    let (raw_name, bytes) = match read {
        Ok(r) => r,
        Err(e) => {
            audit.record(
                None,
                AuditEvent::Rejected {
                    filename: "-",
                    reason: e.to_string(),
                },
            );
            return Err(e.into());
        }
    };

    // Validación antes de generar id: si falla no se escribe nada
    let filename = match validate_upload_filename(&raw_name) {
        Ok(f) => f,
        Err(e) => {
            audit.record(
                None,
                AuditEvent::Rejected {
                    filename: &raw_name,
                    reason: e.to_string(),
                },
            );
            return Err(e.into());
        }
    };

    // 1) Nueva tarea
    let task = Task::new(&state.layout, &filename);
    audit.record(Some(&task.id), AuditEvent::Submitted { filename: &filename });

    // 2) Guardar la entrada tal cual llegó
    let layout = state.layout.clone();
    let (id, name) = (task.id.clone(), filename.clone());
    let saved = run_blocking(
        move || {
            layout.ensure_directories()?;
            layout.write_input(&id, &name, &bytes)
        },
        ServiceError::StorageWriteFailed,
    )
    .await;

    let input_path = match saved {
        Ok(p) => p,
        Err(e) => {
            audit.record(
                Some(&task.id),
                AuditEvent::InputSaveFailed {
                    error: e.to_string(),
                },
            );
            return Err(e.into());
        }
    };
    audit.record(Some(&task.id), AuditEvent::InputSaved { path: &input_path });

    // 3) OCR. La entrada queda en disco aunque falle
    let text = match state.ocr.run(&input_path).await {
        Ok(t) => t,
        Err(e) => {
            let detail = e.to_string();
            audit.record(
                Some(&task.id),
                AuditEvent::OcrFailed {
                    error: detail.clone(),
                },
            );
            return Err(ServiceError::OcrFailed(detail).into());
        }
    };
    audit.record(
        Some(&task.id),
        AuditEvent::OcrCompleted {
            engine: state.ocr.engine_name(),
            chars: text.chars().count(),
        },
    );

    // 4) Guardar el texto
    let layout = state.layout.clone();
    let id = task.id.clone();
    let written = run_blocking(
        move || layout.write_output(&id, &text),
        ServiceError::StorageWriteFailed,
    )
    .await;

    let output_path = match written {
        Ok(p) => p,
        Err(e) => {
            audit.record(
                Some(&task.id),
                AuditEvent::OutputSaveFailed {
                    error: e.to_string(),
                },
            );
            return Err(e.into());
        }
    };
    audit.record(Some(&task.id), AuditEvent::OutputSaved { path: &output_path });

    // 5) Registro final con entrada, salida y resultado
    audit.record(
        Some(&task.id),
        AuditEvent::Completed {
            input: &input_path,
            output: &output_path,
        },
    );

    Ok(Json(UploadResponse {
        message: UPLOAD_OK_MESSAGE.to_string(),
        ocr_output_file: task.output_filename(),
        task_id: task.id,
    }))
}

// Devuelve el texto de una tarea terminada
async fn get_result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<OcrResultResponse>, ApiError> {
    let layout = state.layout.clone();
    let id = task_id.clone();
    let read = run_blocking(move || layout.read_output(&id), ServiceError::StorageReadFailed).await;

    match read {
        Ok(Some(ocr_text)) => {
            state.audit.record(Some(&task_id), AuditEvent::ResultRead);
            Ok(Json(OcrResultResponse { task_id, ocr_text }))
        }
        Ok(None) => {
            state.audit.record(Some(&task_id), AuditEvent::ResultNotFound);
            Err(ServiceError::ResultNotFound(task_id).into())
        }
        Err(e) => {
            state.audit.record(
                Some(&task_id),
                AuditEvent::ResultReadFailed {
                    error: e.to_string(),
                },
            );
            Err(e.into())
        }
    }
}

/* ---------------- helpers ---------------- */

/// Busca el campo `file` y devuelve el nombre que mandó el cliente y los bytes.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidUpload(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let raw_name = field.file_name().map(str::to_string).ok_or_else(|| {
            ServiceError::InvalidUpload("el campo 'file' no trae nombre de archivo".to_string())
        })?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServiceError::InvalidUpload(e.body_text()))?;

        debug!("recibido '{}' ({} bytes)", raw_name, bytes.len());
        return Ok((raw_name, bytes));
    }

    Err(ServiceError::InvalidUpload(
        "falta el campo 'file' en el formulario".to_string(),
    ))
}

/// Corre E/S de disco en el pool de bloqueo. Si la tarea se cae, el error
/// se construye con `on_abort`.
async fn run_blocking<T, F>(f: F, on_abort: fn(String) -> ServiceError) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(res) => res.map_err(ServiceError::from),
        Err(e) => Err(on_abort(format!("tarea de E/S abortada: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use common::{ErrorKind, StorageLayout};
    use ocr::{OcrDispatcher, OcrEngine, OcrError};
    use serde_json::{json, Value};
    use std::{
        env, fs,
        path::{Path as FsPath, PathBuf},
        sync::Arc,
    };
    use tower::ServiceExt;

    const BOUNDARY: &str = "ocr-test-boundary";

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("server_handlers_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    /// Devuelve siempre el mismo texto, pero falla si la entrada no está en disco.
    struct FixedEngine(&'static str);

    #[async_trait]
    impl OcrEngine for FixedEngine {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn extract_text(&self, path: &FsPath) -> Result<String, OcrError> {
            if !path.is_file() {
                return Err(OcrError::Engine(format!("no existe {}", path.display())));
            }
            Ok(self.0.to_string())
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl OcrEngine for FailingEngine {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn extract_text(&self, _path: &FsPath) -> Result<String, OcrError> {
            Err(OcrError::Engine("imagen corrupta".to_string()))
        }
    }

    fn test_app_with_limit(
        sub: &str,
        engine: Arc<dyn OcrEngine>,
        limit: usize,
    ) -> (Router, StorageLayout) {
        let layout = StorageLayout::new(temp_dir(sub));
        let state = AppState::new(
            layout.clone(),
            OcrDispatcher::new(engine, 2, None),
            AuditLog::disabled(),
        );
        (build_router(state, limit), layout)
    }

    fn test_app(sub: &str, engine: Arc<dyn OcrEngine>) -> (Router, StorageLayout) {
        test_app_with_limit(sub, engine, 1024 * 1024)
    }

    fn upload_request(uri: &str, field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn files_in(dir: &FsPath) -> Vec<String> {
        match fs::read_dir(dir) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn health_y_root_responden_constantes() {
        let (app, _) = test_app("health", Arc::new(FixedEngine("")));

        let (status, body) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));

        let (status, body) = send(&app, get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": WELCOME_MESSAGE}));
    }

    #[tokio::test]
    async fn upload_y_result_ida_y_vuelta() {
        let (app, layout) = test_app("roundtrip", Arc::new(FixedEngine("HELLO WORLD")));
        let bytes = b"\x89PNG fake image bytes";

        let (status, body) = send(
            &app,
            upload_request("/api/v1/upload", "file", "photo.png", bytes),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let task_id = body["task_id"].as_str().unwrap().to_string();
        assert_eq!(body["message"], UPLOAD_OK_MESSAGE);
        assert_eq!(body["ocr_output_file"], format!("{task_id}.txt"));

        // la entrada quedó guardada con los bytes exactos
        let input = layout.input_path(&task_id, "photo.png");
        assert_eq!(fs::read(input).unwrap(), bytes);

        let (status, body) = send(&app, get_request(&format!("/api/v1/result/{task_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"task_id": task_id, "ocr_text": "HELLO WORLD"}));
    }

    #[tokio::test]
    async fn rutas_con_barra_final_tambien_funcionan() {
        let (app, _) = test_app("trailing", Arc::new(FixedEngine("texto")));

        let (status, body) = send(
            &app,
            upload_request("/api/v1/upload/", "file", "scan.pdf", b"%PDF-1.4"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let task_id = body["task_id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get_request(&format!("/api/v1/result/{task_id}/"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ocr_text"], "texto");
    }

    #[tokio::test]
    async fn acepta_todas_las_extensiones_soportadas() {
        let (app, _) = test_app("all_ext", Arc::new(FixedEngine("ok")));

        for name in [
            "a.png", "b.JPG", "c.jpeg", "d.Bmp", "e.tiff", "f.PDF",
        ] {
            let (status, _) = send(&app, upload_request("/api/v1/upload", "file", name, b"x")).await;
            assert_eq!(status, StatusCode::OK, "{name}");
        }
    }

    #[tokio::test]
    async fn extension_no_soportada_es_400_y_no_escribe_nada() {
        let (app, layout) = test_app("invalid_type", Arc::new(FixedEngine("nunca")));

        let (status, body) = send(
            &app,
            upload_request("/api/v1/upload", "file", "archive.zip", b"PK\x03\x04"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!(ErrorKind::InvalidFileType));

        assert!(files_in(layout.input_dir()).is_empty());
        assert!(files_in(layout.output_dir()).is_empty());
    }

    #[tokio::test]
    async fn result_desconocido_es_404() {
        let (app, _) = test_app("unknown", Arc::new(FixedEngine("")));

        let (status, body) = send(&app, get_request("/api/v1/result/unknown-id")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "ResultNotFound");
        assert!(body["detail"].as_str().unwrap().contains("unknown-id"));
    }

    #[tokio::test]
    async fn ocr_fallido_es_500_sin_salida_y_luego_404() {
        let (app, layout) = test_app("ocr_failed", Arc::new(FailingEngine));

        let (status, body) = send(
            &app,
            upload_request("/api/v1/upload", "file", "photo.png", b"basura"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "OcrFailed");
        assert!(body["detail"].as_str().unwrap().contains("imagen corrupta"));

        // la entrada se conserva, la salida no existe
        let inputs = files_in(layout.input_dir());
        assert_eq!(inputs.len(), 1);
        assert!(files_in(layout.output_dir()).is_empty());

        let (task_id, _) = inputs[0].split_once('_').unwrap();
        let (status, body) = send(&app, get_request(&format!("/api/v1/result/{task_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "ResultNotFound");
    }

    #[tokio::test]
    async fn dos_uploads_tienen_ids_y_rutas_distintas() {
        let (app, layout) = test_app("distinct", Arc::new(FixedEngine("t")));

        let (_, a) = send(&app, upload_request("/api/v1/upload", "file", "photo.png", b"1")).await;
        let (_, b) = send(&app, upload_request("/api/v1/upload", "file", "photo.png", b"2")).await;

        assert_ne!(a["task_id"], b["task_id"]);
        assert_eq!(files_in(layout.input_dir()).len(), 2);
        assert_eq!(files_in(layout.output_dir()).len(), 2);
    }

    #[tokio::test]
    async fn nombre_con_directorios_se_guarda_sin_ellos() {
        let (app, layout) = test_app("sanitize", Arc::new(FixedEngine("t")));

        let (status, body) = send(
            &app,
            upload_request("/api/v1/upload", "file", "../../evil.png", b"x"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let task_id = body["task_id"].as_str().unwrap();
        assert_eq!(
            files_in(layout.input_dir()),
            vec![format!("{task_id}_evil.png")]
        );
    }

    #[tokio::test]
    async fn falta_campo_file_es_invalid_upload() {
        let (app, layout) = test_app("missing_field", Arc::new(FixedEngine("t")));

        let (status, body) = send(
            &app,
            upload_request("/api/v1/upload", "document", "photo.png", b"x"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidUpload");
        assert!(files_in(layout.input_dir()).is_empty());
    }

    #[tokio::test]
    async fn body_que_no_es_multipart_es_invalid_upload() {
        let (app, layout) = test_app("not_multipart", Arc::new(FixedEngine("t")));

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/upload")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidUpload");
        assert!(files_in(layout.input_dir()).is_empty());
    }

    #[tokio::test]
    async fn nombre_demasiado_largo_es_invalid_file_type() {
        let (app, layout) = test_app("long_name", Arc::new(FixedEngine("t")));
        let name = format!("{}.png", "a".repeat(250));

        let (status, body) = send(&app, upload_request("/api/v1/upload", "file", &name, b"x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidFileType");
        assert!(files_in(layout.input_dir()).is_empty());
    }

    #[tokio::test]
    async fn uploads_rechazados_quedan_en_el_audit_log() {
        let root = temp_dir("audit_rejected");
        let log_dir = root.join("logs");
        let state = AppState::new(
            StorageLayout::new(root.join("storage")),
            OcrDispatcher::new(Arc::new(FixedEngine("t")), 1, None),
            AuditLog::open(&log_dir).unwrap(),
        );
        let app = build_router(state, 1024 * 1024);

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/upload")
            .header("content-type", "text/plain")
            .body(Body::from("hola"))
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            upload_request("/api/v1/upload", "document", "photo.png", b"x"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            upload_request("/api/v1/upload", "file", "archive.zip", b"x"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // soltar el router suelta el último clon del audit y vacía el buffer
        drop(app);

        let content = fs::read_to_string(log_dir.join(crate::audit::AUDIT_FILE_NAME)).unwrap();
        let rejected: Vec<&str> = content.lines().filter(|l| l.contains(" rejected ")).collect();
        assert_eq!(rejected.len(), 3, "{content}");
        assert!(rejected.iter().all(|l| l.contains("WARN task=-")));
        assert!(rejected[2].contains("archive.zip"));
    }

    #[tokio::test]
    async fn archivo_mayor_al_limite_es_invalid_upload() {
        let (app, layout) = test_app_with_limit("too_big", Arc::new(FixedEngine("t")), 64);

        let (status, body) = send(
            &app,
            upload_request("/api/v1/upload", "file", "photo.png", &[0u8; 4096]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidUpload");
        assert!(files_in(layout.input_dir()).is_empty());
    }

    #[tokio::test]
    async fn resultado_ilegible_es_storage_read_failed() {
        let (app, layout) = test_app("unreadable", Arc::new(FixedEngine("")));
        layout.ensure_directories().unwrap();
        // un directorio en lugar del .txt no se puede leer como archivo
        fs::create_dir_all(layout.output_path("broken")).unwrap();

        let (status, body) = send(&app, get_request("/api/v1/result/broken")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "StorageReadFailed");
    }

    #[tokio::test]
    async fn almacenamiento_no_disponible_es_500() {
        let root = temp_dir("unavailable");
        let blocker = root.join("blocker");
        fs::write(&blocker, b"no soy un directorio").unwrap();

        let state = AppState::new(
            StorageLayout::new(&blocker),
            OcrDispatcher::new(Arc::new(FixedEngine("t")), 1, None),
            AuditLog::disabled(),
        );
        let app = build_router(state, 1024 * 1024);

        let (status, body) = send(
            &app,
            upload_request("/api/v1/upload", "file", "photo.png", b"x"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "StorageUnavailable");
    }
}
