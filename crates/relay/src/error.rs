//! Error types for the HTTP surface and process startup.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use listings::ListingError;
use outbox::OutboxError;
use projections::ProjectionError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Listing command failed.
    Listing(ListingError),
    /// Outbox read failed.
    Outbox(OutboxError),
    /// Search index read failed.
    Projection(ProjectionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Listing(err) => listing_error_to_response(err),
            ApiError::Outbox(err) => internal(err.to_string()),
            ApiError::Projection(err) => match err {
                ProjectionError::IndexUnavailable(_) => {
                    tracing::warn!(error = %err, "search index unavailable");
                    (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
                }
                _ => internal(err.to_string()),
            },
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn listing_error_to_response(err: ListingError) -> (StatusCode, String) {
    match &err {
        ListingError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        ListingError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ListingError::Duplicate(_) => (StatusCode::CONFLICT, err.to_string()),
        _ => internal(err.to_string()),
    }
}

fn internal(message: String) -> (StatusCode, String) {
    tracing::error!(error = %message, "internal server error");
    (StatusCode::INTERNAL_SERVER_ERROR, message)
}

impl From<ListingError> for ApiError {
    fn from(err: ListingError) -> Self {
        ApiError::Listing(err)
    }
}

impl From<OutboxError> for ApiError {
    fn from(err: OutboxError) -> Self {
        ApiError::Outbox(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}

/// Failures while wiring the process together.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Search index error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics recorder error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}
