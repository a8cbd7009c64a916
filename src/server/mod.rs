//! HTTP adapter over [`DocumentService`]

use crate::error::DocQaError;
use crate::service::{DocumentService, IndexStats, QueryResponse, UploadResponse};
use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error response: status plus `{error}` body
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<DocQaError> for ApiError {
    fn from(err: DocQaError) -> Self {
        let status = match &err {
            DocQaError::UnsupportedInputType { .. } | DocQaError::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            DocQaError::Extraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DocQaError::IngestionBlocked(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", err);
        } else {
            warn!("Request rejected: {}", err);
        }

        let message = match err {
            DocQaError::UnsupportedInputType { reason, .. } => reason,
            other => other.to_string(),
        };

        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

pub fn router(service: DocumentService) -> Router {
    let upload_limit = service.config().server.max_upload_bytes;

    Router::new()
        .route("/", get(root))
        .route("/stats", get(stats))
        .route("/query", post(query))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(service)
}

/// Serve until Ctrl-C
pub async fn serve(service: DocumentService, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn root() -> Json<MessageBody> {
    Json(MessageBody {
        message: "Document QA API is running.".to_string(),
    })
}

async fn stats(State(service): State<DocumentService>) -> Result<Json<IndexStats>, ApiError> {
    Ok(Json(service.stats().await?))
}

async fn query(
    State(service): State<DocumentService>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let outcome = service.query(&request.question).await?;
    Ok(Json(outcome.into()))
}

async fn upload(
    State(service): State<DocumentService>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read upload: {}", e)))?;
        upload = Some((file_name, data.to_vec()));
        break;
    }

    let (file_name, data) = upload.ok_or_else(|| bad_request("Missing 'file' field"))?;
    let outcome = service.upload(&file_name, data).await?;
    Ok(Json(outcome.into()))
}
