//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the error
//! returned by HTTP handlers.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use course_ratings_core::ports::PortError;
use course_ratings_core::ServiceError;
use serde_json::json;
use tracing::debug;

use crate::config::ConfigError;

/// Seconds a client should wait after hitting a rate limit.
pub const RETRY_AFTER_SECONDS: u64 = 60;

const INTERNAL_MESSAGE: &str = "Erro interno do servidor. Tente novamente mais tarde.";
const INVALID_BODY_MESSAGE: &str = "Dados da requisição inválidos";

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The shared rate-limit store could not be reached.
    #[error("Redis Error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// HTTP Errors
//=========================================================================================

/// An error response: a status code and a message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Autenticação necessária")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(message) => Self::bad_request(message),
            ServiceError::Duplicate(message) => Self::new(StatusCode::CONFLICT, message),
            ServiceError::RateLimited(message) => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, message)
            }
            ServiceError::NotFound(message) => Self::not_found(message),
            ServiceError::Unauthorized => Self::unauthorized(),
            // The detail was logged where it happened.
            ServiceError::Backend(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
            }
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(reason = %rejection.body_text(), "Rejected request body");
        Self::bad_request(INVALID_BODY_MESSAGE)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        if self.status == StatusCode::TOO_MANY_REQUESTS {
            return (
                self.status,
                [(header::RETRY_AFTER, RETRY_AFTER_SECONDS.to_string())],
                body,
            )
                .into_response();
        }
        (self.status, body).into_response()
    }
}
