// Strongbox — Top-level error types
//
// Aggregates errors from the store, auth, enclave and config modules into a
// single error enum for the application boundary. Every error reports an
// `ErrorKind` so the gateway can map it without inspecting messages.

use thiserror::Error;

/// Coarse classification shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    /// Bad credentials, or an invalid/expired/revoked token.
    Unauthorized,
    /// Authenticated, but not allowed to perform the operation.
    Forbidden,
    ValidationFailed,
    QuotaExceeded,
    PayloadTooLarge,
    Internal,
}

/// Top-level error type for all Strongbox operations.
#[derive(Debug, Error)]
pub enum StrongboxError {
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Auth error: {0}")]
    Auth(#[from] crate::auth::AuthError),

    #[error("Enclave error: {0}")]
    Enclave(#[from] crate::enclave::EnclaveError),

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Other(String),
}

impl StrongboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::Auth(e) => e.kind(),
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Enclave(_) | Self::Config(_) | Self::Io(_) | Self::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, StrongboxError>;
