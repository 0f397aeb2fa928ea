//! HTTP surface for PDF digest.
//!
//! The router exposes a small Axum API over the job pipeline:
//!
//! - `POST {prefix}/documents/upload` – multipart upload with one or more `files` parts and a
//!   `parser` field. Creates one job per file and returns `202 Accepted` with the job ids.
//! - `GET {prefix}/documents/{job_id}` – poll a job: `{job_id, status, content, summary}`.
//! - `GET /health` – store connectivity check (`200` healthy, `503` unhealthy).
//! - `GET /` – application name and version.
//!
//! Processing happens in the worker binary; this surface only stores documents and queues jobs.

use crate::extraction::Parser;
use crate::jobs::{JobId, JobStatus};
use crate::service::{JobApi, ServiceError};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Largest accepted upload request.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const FILES_FIELD: &str = "files";
const PARSER_FIELD: &str = "parser";

/// Build the HTTP router, mounting the document routes under `api_prefix`.
pub fn create_router<S>(service: Arc<S>, api_prefix: &str) -> Router
where
    S: JobApi + 'static,
{
    let documents = Router::new()
        .route("/documents/upload", post(upload_documents::<S>))
        .route("/documents/:job_id", get(get_job::<S>));

    let router = if api_prefix.is_empty() || api_prefix == "/" {
        documents
    } else {
        Router::new().nest(api_prefix, documents)
    };

    router
        .route("/", get(root))
        .route("/health", get(health::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(log_requests))
        .with_state(service)
}

/// Response body for an accepted upload.
#[derive(Debug, Serialize)]
struct UploadResponse {
    job_ids: Vec<JobId>,
    parser: Parser,
    message: &'static str,
}

/// Accept PDF uploads and queue one job per file.
async fn upload_documents<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError>
where
    S: JobApi,
{
    let mut selector: Option<String> = None;
    let mut documents: Vec<(Option<String>, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::BadRequest(format!("Multipart error: {error}")))?
    {
        match field.name() {
            Some(FILES_FIELD) => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|error| AppError::BadRequest(format!("Read error: {error}")))?;
                documents.push((file_name, bytes.to_vec()));
            }
            Some(PARSER_FIELD) => {
                selector = Some(
                    field
                        .text()
                        .await
                        .map_err(|error| AppError::BadRequest(format!("Read error: {error}")))?,
                );
            }
            _ => {}
        }
    }

    let selector = selector.unwrap_or_default();
    let parser = selector.parse::<Parser>().map_err(|_| {
        tracing::warn!(parser = %selector, "Rejected upload with invalid parser");
        AppError::BadRequest(format!(
            "Invalid parser type. Choose from {}",
            Parser::choices()
        ))
    })?;
    if documents.is_empty() {
        return Err(AppError::BadRequest("No files uploaded".into()));
    }

    let mut job_ids = Vec::with_capacity(documents.len());
    for (file_name, bytes) in documents {
        let id = service.create_job(parser.as_str(), &bytes).await?;
        tracing::info!(
            job_id = %id,
            parser = %parser,
            file = file_name.as_deref().unwrap_or("<unnamed>"),
            "Accepted document"
        );
        job_ids.push(id);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            job_ids,
            parser,
            message: "Files uploaded for processing",
        }),
    ))
}

/// Response body for `GET {prefix}/documents/{job_id}`.
#[derive(Debug, Serialize)]
struct JobResponse {
    job_id: JobId,
    status: JobStatus,
    content: String,
    summary: String,
}

/// Report the current status of a job.
async fn get_job<S>(
    State(service): State<Arc<S>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, AppError>
where
    S: JobApi,
{
    let id = JobId::parse(&job_id).ok_or(AppError::NotFound)?;
    let record = service.get_status(&id).await.map_err(|error| {
        if error.is_not_found() {
            tracing::warn!(job_id = %id, "Job not found");
            AppError::NotFound
        } else {
            AppError::from(error)
        }
    })?;
    Ok(Json(JobResponse {
        job_id: id,
        status: record.status,
        content: record.content,
        summary: record.summary,
    }))
}

/// Report store connectivity.
async fn health<S>(State(service): State<Arc<S>>) -> Response
where
    S: JobApi,
{
    match service.health().await {
        Ok(()) => Json(json!({ "status": "healthy", "redis": "connected" })).into_response(),
        Err(error) => {
            tracing::error!(%error, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "redis": "disconnected",
                    "error": error.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "app": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Log each request with its status and latency, and expose the latency as `x-process-time`.
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    tracing::debug!(%method, %path, "Request started");

    let mut response = next.run(request).await;

    let elapsed = started.elapsed();
    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Request completed"
    );
    if let Ok(value) = HeaderValue::from_str(&format!("{:.4}", elapsed.as_secs_f64())) {
        response.headers_mut().insert("x-process-time", value);
    }
    response
}

enum AppError {
    BadRequest(String),
    NotFound,
    Internal(ServiceError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::NotFound => (StatusCode::NOT_FOUND, "Job not found".to_string()),
            Self::Internal(error) => {
                tracing::error!(%error, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(inner: ServiceError) -> Self {
        Self::Internal(inner)
    }
}
