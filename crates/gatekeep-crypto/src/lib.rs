//! Signature engine for gatekeep.
//!
//! - One-way hashing of raw access codes and enrollment tokens
//! - Random enrollment token generation
//! - Ed25519 signing and fail-closed verification
//! - JWK export of tenant public keys with RFC 7638 thumbprints
//! - XChaCha20-Poly1305 sealing of tenant private keys at rest

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand_core::RngCore;
use sha2::{Digest, Sha256};

mod ed25519;
mod error;
mod jwk;
mod seal;

pub use ed25519::{verify_ed25519, Ed25519Signer, ED25519_ALGORITHM};
pub use error::CryptoError;
pub use jwk::PublicJwk;
pub use seal::{open, seal, KeyEncryptionKey, SealedKey};

/// Number of random bytes behind an enrollment token.
pub const TOKEN_BYTES: usize = 32;

/// Hash data using SHA-256.
pub fn hash_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hex SHA-256 of a raw code or token. This is the only form that is persisted.
pub fn hash_token(raw: &str) -> String {
    hex::encode(hash_sha256(raw.as_bytes()))
}

/// Fresh enrollment token: 32 random bytes, base64url without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand_core::OsRng.fill_bytes(&mut bytes);
    b64url_encode(bytes)
}

pub fn b64url_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode base64url, tolerating trailing `=` padding.
pub fn b64url_decode(data: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .map_err(|e| CryptoError::encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_hex_sha256() {
        // echo -n "abc" | sha256sum
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert_eq!(b64url_decode(&a).unwrap().len(), TOKEN_BYTES);
    }

    #[test]
    fn test_b64url_decode_accepts_padding() {
        assert_eq!(b64url_decode("YQ==").unwrap(), b"a");
        assert_eq!(b64url_decode("YQ").unwrap(), b"a");
        assert!(b64url_decode("Y*Q").is_err());
    }
}
