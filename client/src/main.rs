use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{ErrorBody, HealthResponse, OcrResultResponse, UploadResponse};
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use std::{env, path::PathBuf};

/// - En Docker: OCR_SERVER_URL=http://server:8000
/// - Local: default http://localhost:8000
fn server_base_url() -> String {
    env::var("OCR_SERVER_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para subir archivos al servicio de OCR")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verifica que el server esté vivo
    Health,
    /// Sube una imagen o PDF y espera el OCR
    Upload {
        #[arg(value_name = "ARCHIVO")]
        path: PathBuf,
    },
    /// Consulta el texto extraído de una tarea
    Result {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = server_base_url();

    match cli.command {
        Commands::Health => {
            let resp = client.get(format!("{}/health", base_url)).send().await?;
            let health: HealthResponse = parse_response(resp).await?;
            println!("server: {}", health.status);
        }
        Commands::Upload { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("no se pudo leer {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .context("la ruta no tiene nombre de archivo")?;

            let form = multipart::Form::new()
                .part("file", multipart::Part::bytes(bytes).file_name(file_name));

            let url = format!("{}/api/v1/upload", base_url);
            let resp = client.post(&url).multipart(form).send().await?;
            let uploaded: UploadResponse = parse_response(resp).await?;

            println!("{}", uploaded.message);
            println!("  task_id: {}", uploaded.task_id);
            println!("  salida: {}", uploaded.ocr_output_file);
        }
        Commands::Result { id } => {
            let url = format!("{}/api/v1/result/{id}", base_url);
            let resp = client.get(&url).send().await?;
            let result: OcrResultResponse = parse_response(resp).await?;

            println!("Tarea {}:", result.task_id);
            println!("{}", result.ocr_text);
        }
    }

    Ok(())
}

/// Deserializa la respuesta o arma un error con `{error, detail}` del server.
async fn parse_response<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => bail!("{} ({:?}): {}", status, body.error, body.detail),
        Err(_) => bail!("{}: {}", status, text),
    }
}
