use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum AppError {
    #[error("Failed to fetch documentation: {0}")]
    FetchError(String),

    #[error("Failed to parse documentation: {0}")]
    ParseError(String),

    #[error("Schema validation failed: {}", schema_error_detail(.0))]
    SchemaError(Vec<String>),

    #[error("API method '{0}' not found in the knowledge base")]
    NotFoundError(String),

    #[error("A knowledge base refresh is already in progress")]
    AlreadyRefreshing,

    #[error("Refresh cancelled by shutdown")]
    Cancelled,

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Cache error: {0}")]
    CacheError(String),
}

impl AppError {
    /// Short machine-readable tag used in logs, metrics labels and status output.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::FetchError(_) => "fetch_error",
            AppError::ParseError(_) => "parse_error",
            AppError::SchemaError(_) => "schema_error",
            AppError::NotFoundError(_) => "not_found",
            AppError::AlreadyRefreshing => "already_refreshing",
            AppError::Cancelled => "cancelled",
            AppError::ValidationError(_) => "validation_error",
            AppError::CacheError(_) => "cache_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFoundError(key) => {
                tracing::debug!(key = %key, "Method not found");
                StatusCode::NOT_FOUND
            }
            AppError::ValidationError(msg) => {
                tracing::warn!(error = %msg, "Validation error");
                StatusCode::BAD_REQUEST
            }
            AppError::AlreadyRefreshing => {
                tracing::warn!("Refresh rejected, another refresh is in flight");
                StatusCode::CONFLICT
            }
            AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::FetchError(e) => {
                tracing::error!(error = %e, "Document source fetch error");
                StatusCode::BAD_GATEWAY
            }
            AppError::ParseError(e) => {
                tracing::error!(error = %e, "Document source parse error");
                StatusCode::BAD_GATEWAY
            }
            AppError::SchemaError(keys) => {
                tracing::error!(keys = ?keys, "Schema validation error");
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::CacheError(e) => {
                tracing::error!(error = %e, "Cache error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::FetchError(err.to_string())
    }
}

fn schema_error_detail(keys: &[String]) -> String {
    if keys.is_empty() {
        "document source returned no methods".to_string()
    } else {
        format!("invalid methods {}", keys.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
