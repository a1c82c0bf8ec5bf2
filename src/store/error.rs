// Strongbox — Store error types

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid name or password")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Too many keys, limit is {0}")]
    QuotaExceeded(usize),

    #[error("Value too large, limit is {0} bytes")]
    PayloadTooLarge(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hashing error: {0}")]
    Hashing(#[from] crate::enclave::EnclaveError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            Self::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
            Self::Database(_) | Self::Json(_) | Self::Hashing(_) => ErrorKind::Internal,
        }
    }
}
