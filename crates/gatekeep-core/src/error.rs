//! Caller-visible failures of the checkpoint core.

use gatekeep_crypto::CryptoError;
use gatekeep_storage::{EnrollmentTokenStatus, StoreError};
use thiserror::Error;

/// Business-rule failures carry a stable [`GateError::code`]. A bad
/// signature is not an error: it is folded into an INVALID result.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("not found")]
    NotFound,

    #[error("invalid signed QR: {0}")]
    InvalidFormat(String),

    #[error("signed QR carries no authorization id")]
    MissingAuthId,

    #[error("organization has no active signing key")]
    CryptoKeyNotFound,

    #[error("enrollment token already used")]
    TokenAlreadyUsed,

    #[error("enrollment token revoked")]
    TokenRevoked,

    #[error("enrollment token expired")]
    TokenExpired,

    #[error("enrollment token in unexpected state {0}")]
    TokenInvalidState(EnrollmentTokenStatus),

    #[error("{0} is required")]
    ValidationRequired(&'static str),

    #[error("enrollment TTL of {0} hours is out of range")]
    InvalidTtl(i64),

    /// Lost a compare-and-swap too many times in a row.
    #[error("concurrent update conflict")]
    Conflict,

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl GateError {
    pub fn code(&self) -> &'static str {
        match self {
            GateError::NotFound => "NOT_FOUND",
            GateError::InvalidFormat(_) => "INVALID_FORMAT",
            GateError::MissingAuthId => "MISSING_AUTH_ID",
            GateError::CryptoKeyNotFound => "CRYPTO_KEY_NOT_FOUND",
            GateError::TokenAlreadyUsed => "TOKEN_ALREADY_USED",
            GateError::TokenRevoked => "TOKEN_REVOKED",
            GateError::TokenExpired => "TOKEN_EXPIRED",
            GateError::TokenInvalidState(_) => "TOKEN_INVALID_STATE",
            GateError::ValidationRequired(_) => "VALIDATION_REQUIRED",
            GateError::InvalidTtl(_) => "INVALID_TTL",
            GateError::Conflict => "CONFLICT",
            GateError::Store(_) => "STORAGE",
            GateError::Crypto(_) => "CRYPTO",
        }
    }
}

impl From<StoreError> for GateError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => GateError::NotFound,
            StoreError::Conflict => GateError::Conflict,
            other => GateError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_codes() {
        assert_eq!(GateError::from(StoreError::NotFound).code(), "NOT_FOUND");
        assert_eq!(GateError::from(StoreError::Conflict).code(), "CONFLICT");
        let backend = GateError::from(StoreError::Backend("disk I/O error".into()));
        assert_eq!(backend.code(), "STORAGE");
        assert_eq!(backend.to_string(), "storage error: backend error: disk I/O error");
    }

    #[test]
    fn test_token_state_message() {
        let err = GateError::TokenInvalidState(EnrollmentTokenStatus::Revoked);
        assert_eq!(err.code(), "TOKEN_INVALID_STATE");
        assert_eq!(err.to_string(), "enrollment token in unexpected state REVOKED");
        assert_eq!(
            GateError::ValidationRequired("document").to_string(),
            "document is required"
        );
    }
}
