// Strongbox — Auth error types

use thiserror::Error;

use crate::enclave::EnclaveError;
use crate::error::ErrorKind;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The single outward answer for every failed authentication.
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Token expiry out of range")]
    ExpiryOutOfRange,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] EnclaveError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated | Self::InvalidToken | Self::Revoked => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Store(e) => e.kind(),
            Self::Crypto(_) | Self::ExpiryOutOfRange => ErrorKind::Internal,
        }
    }

    /// Fold every authentication failure into `Unauthenticated`, keeping
    /// only engine and crypto failures distinct.
    pub(crate) fn collapse(self) -> Self {
        match self {
            Self::Store(e) if e.kind() == ErrorKind::Internal => Self::Store(e),
            Self::Crypto(e) => Self::Crypto(e),
            Self::Forbidden(reason) => Self::Forbidden(reason),
            Self::ExpiryOutOfRange => Self::ExpiryOutOfRange,
            _ => Self::Unauthenticated,
        }
    }
}
