//! crates/course_ratings_core/src/error.rs
//!
//! Errors surfaced by the data access service and the session context. The
//! messages of the user-facing variants are shown to students as-is.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or out-of-range input. Nothing was written.
    #[error("{0}")]
    Validation(String),

    /// The uniqueness invariant is already satisfied by an existing record.
    #[error("{0}")]
    Duplicate(String),

    /// Too many actions for this identifier in the current window.
    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    /// The hosted query or auth API failed.
    #[error("Backend error: {0}")]
    Backend(#[source] PortError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

impl From<PortError> for ServiceError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound(what) => Self::NotFound(what),
            PortError::Unauthorized => Self::Unauthorized,
            other => Self::Backend(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
