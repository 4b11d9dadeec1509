//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid signature format or length.
    #[error("invalid signature: {reason}")]
    InvalidSignature { reason: String },

    /// Invalid public key format or length.
    #[error("invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    /// Invalid private key (seed) format or length.
    #[error("invalid private key: {reason}")]
    InvalidPrivateKey { reason: String },

    /// JWK JSON could not be parsed or describes another key type.
    #[error("invalid JWK: {reason}")]
    InvalidJwk { reason: String },

    /// Malformed base64url or hex input.
    #[error("encoding error: {reason}")]
    Encoding { reason: String },

    #[error("invalid key encryption key: {reason}")]
    InvalidKeyEncryptionKey { reason: String },

    #[error("AEAD encryption failed")]
    SealFailed,

    /// Wrong key, wrong associated data or tampered ciphertext.
    #[error("AEAD decryption failed")]
    OpenFailed,
}

impl CryptoError {
    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            reason: reason.into(),
        }
    }

    pub fn invalid_public_key(reason: impl Into<String>) -> Self {
        Self::InvalidPublicKey {
            reason: reason.into(),
        }
    }

    pub fn invalid_private_key(reason: impl Into<String>) -> Self {
        Self::InvalidPrivateKey {
            reason: reason.into(),
        }
    }

    pub fn invalid_jwk(reason: impl Into<String>) -> Self {
        Self::InvalidJwk {
            reason: reason.into(),
        }
    }

    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::Encoding {
            reason: reason.into(),
        }
    }
}
