//! Error types for the session store

use cm_customer::CustomerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis operation error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Session codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Corrupt value at {key}: {value}")]
    Corrupt { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for CustomerError {
    fn from(err: SessionError) -> Self {
        CustomerError::Cache(err.to_string())
    }
}
