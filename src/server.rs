//! HTTP surface of the change detection service

use crate::error::{DetectionError, ValidationError};
use crate::service::ChangeDetectionService;
use crate::types::{CleanupResponse, DetectionReport, ErrorBody, HealthStatus, UploadedImage};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    service: Arc<ChangeDetectionService>,
}

/// Build the router with all API routes and the upload size limit.
pub fn router(service: Arc<ChangeDetectionService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/detect-changes", post(detect_changes))
        .route("/get-result/:session_id", get(get_result))
        .route("/cleanup", post(cleanup))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(AppState { service })
}

/// Client-facing failure. Internal detail is logged, not returned.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(&'static str),
    Internal(String),
    Multipart(MultipartError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            ApiError::Multipart(e) => (e.status(), e.body_text()),
        };
        (status, Json(ErrorBody::new(message))).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        message: "Change detection API is running".to_string(),
    })
}

async fn detect_changes(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionReport>, ApiError> {
    // A body that is not multipart carries no files at all
    let mut multipart = multipart.map_err(|rejection| {
        warn!(error = %rejection, "Rejected non-multipart detection request");
        ApiError::BadRequest(ValidationError::MissingImage.to_string())
    })?;

    let mut image1 = None;
    let mut image2 = None;

    while let Some(field) = multipart.next_field().await? {
        let slot = match field.name() {
            Some("image1") => &mut image1,
            Some("image2") => &mut image2,
            _ => continue,
        };
        // Plain form values are not file uploads
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await?;
        *slot = Some(UploadedImage::new(filename, data.to_vec()));
    }

    let service = state.service.clone();
    let outcome = tokio::task::spawn_blocking(move || service.detect(image1, image2))
        .await
        .map_err(|e| {
            error!(error = %e, "Detection task panicked");
            ApiError::Internal("Internal server error occurred".to_string())
        })?;

    match outcome {
        Ok(report) => Ok(Json(report)),
        Err(DetectionError::Validation(e)) => {
            warn!(error = %e, "Rejected detection request");
            Err(ApiError::BadRequest(e.to_string()))
        }
        Err(e) => {
            error!(stage = e.stage(), error = %e, "Error in change detection");
            Err(ApiError::Internal("Internal server error occurred".to_string()))
        }
    }
}

async fn get_result(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let service = state.service.clone();
    let lookup_id = session_id.clone();
    let outcome = tokio::task::spawn_blocking(move || service.load_result(&lookup_id))
        .await
        .map_err(|e| {
            error!(error = %e, "Result lookup task panicked");
            ApiError::Internal("Error serving result".to_string())
        })?;

    match outcome {
        Ok(png) => Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response()),
        Err(DetectionError::NotFound) => Err(ApiError::NotFound("Result not found")),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Error serving result");
            Err(ApiError::Internal("Error serving result".to_string()))
        }
    }
}

async fn cleanup(State(state): State<AppState>) -> Result<Json<CleanupResponse>, ApiError> {
    let service = state.service.clone();
    let summary = tokio::task::spawn_blocking(move || service.cleanup())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| {
            error!(error = %e, "Cleanup failed");
            ApiError::Internal(e.to_string())
        })?;

    info!(
        inputs_removed = summary.inputs.removed,
        results_removed = summary.results.removed,
        "Cleanup completed"
    );

    Ok(Json(CleanupResponse {
        success: true,
        message: "Cleanup completed".to_string(),
    }))
}
