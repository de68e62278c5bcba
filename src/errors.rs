// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Duplicate key error")]
    DuplicateKey,

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("Upstream auth error: {0}")]
    UpstreamAuth(String),

    #[error("Upstream request error: {0}")]
    UpstreamRequest(String),

    #[error("Reconciliation conflict: {0}")]
    ReconciliationConflict(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Upstream provider details are logged at the call site, never
        // returned to API clients.
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::AuthError => (StatusCode::UNAUTHORIZED, "Authentication failed".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::NotFound(kind) => (StatusCode::NOT_FOUND, format!("{} not found", kind)),
            AppError::DuplicateKey => (StatusCode::CONFLICT, "Duplicate entry".to_string()),
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "Invalid ID format".to_string()),
            AppError::UpstreamAuth(_) | AppError::UpstreamRequest(_) => (
                StatusCode::BAD_GATEWAY,
                "Payment could not be processed, try again".to_string(),
            ),
            AppError::ReconciliationConflict(_) => {
                (StatusCode::NOT_FOUND, "Transaction not found".to_string())
            }
            AppError::Mail(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Mail error".to_string()),
            AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamRequest(format!("HTTP request failed: {}", err))
    }
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        AppError::UpstreamRequest(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
