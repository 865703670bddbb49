//! Customer Manager Error Types
//!
//! Every variant maps to a stable error code and an HTTP status so the
//! transport can render failures without inspecting messages:
//! - `Validation` -> 400 Bad Request
//! - `NotFound` -> 404 Not Found (also used for expired tokens and sessions)
//! - `RateLimited` -> 429 Too Many Requests
//! - `Conflict` / `InvalidState` -> 409 Conflict
//! - dependency and internal failures -> 500 Internal Server Error

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CustomerError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    RateLimited { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    InvalidState { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{message}")]
    Internal { message: String },
}

impl CustomerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Database(_) | Self::Cache(_) | Self::Messaging(_) | Self::Upstream(_) => {
                "DEPENDENCY_ERROR"
            }
            Self::Json(_) | Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::RateLimited { .. } => 429,
            Self::Conflict { .. } | Self::InvalidState { .. } => 409,
            _ => 500,
        }
    }

    /// Whether a caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. }
                | Self::RateLimited { .. }
                | Self::Database(_)
                | Self::Cache(_)
                | Self::Messaging(_)
                | Self::Upstream(_)
        )
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for CustomerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(feature = "amqp")]
impl From<lapin::Error> for CustomerError {
    fn from(err: lapin::Error) -> Self {
        Self::Messaging(err.to_string())
    }
}

impl From<reqwest::Error> for CustomerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CustomerError>;
