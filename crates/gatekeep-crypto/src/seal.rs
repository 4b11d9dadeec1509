//! Sealing of tenant private keys at rest (XChaCha20-Poly1305).

use chacha20poly1305::{aead::Aead, KeyInit};
use rand_core::RngCore;
use zeroize::Zeroizing;

use crate::CryptoError;

/// Key-encryption key protecting every tenant private key.
pub struct KeyEncryptionKey(Zeroizing<[u8; 32]>);

impl KeyEncryptionKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(Zeroizing::new(*bytes))
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(hex::decode(hex_str.trim()).map_err(|e| {
            CryptoError::InvalidKeyEncryptionKey {
                reason: e.to_string(),
            }
        })?);
        let key: [u8; 32] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyEncryptionKey {
                    reason: format!("expected 32 bytes, got {}", bytes.len()),
                })?;
        Ok(Self(Zeroizing::new(key)))
    }

    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        rand_core::OsRng.fill_bytes(key.as_mut());
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyEncryptionKey(..)")
    }
}

/// Nonce and ciphertext of a sealed secret.
#[derive(Clone, Debug)]
pub struct SealedKey {
    pub nonce: [u8; 24],
    pub ciphertext: Vec<u8>,
}

/// AEAD encrypt `plaintext` under `kek`, binding `aad`.
pub fn seal(plaintext: &[u8], kek: &KeyEncryptionKey, aad: &[u8]) -> Result<SealedKey, CryptoError> {
    let key = chacha20poly1305::Key::from(*kek.as_bytes());
    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&key);

    let mut nonce_bytes = [0u8; 24];
    rand_core::OsRng.fill_bytes(&mut nonce_bytes);

    let nonce = chacha20poly1305::XNonce::from(nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            &nonce,
            chacha20poly1305::aead::Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::SealFailed)?;

    Ok(SealedKey {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// AEAD decrypt a sealed secret.
pub fn open(
    nonce: &[u8],
    ciphertext: &[u8],
    kek: &KeyEncryptionKey,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let nonce: [u8; 24] = nonce.try_into().map_err(|_| CryptoError::OpenFailed)?;
    let key = chacha20poly1305::Key::from(*kek.as_bytes());
    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&key);

    let pt = cipher
        .decrypt(
            &chacha20poly1305::XNonce::from(nonce),
            chacha20poly1305::aead::Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::OpenFailed)?;

    Ok(Zeroizing::new(pt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let kek = KeyEncryptionKey::generate();
        let sealed = seal(b"seed bytes", &kek, b"org-1").unwrap();
        assert_ne!(sealed.ciphertext.as_slice(), b"seed bytes");

        let opened = open(&sealed.nonce, &sealed.ciphertext, &kek, b"org-1").unwrap();
        assert_eq!(opened.as_slice(), b"seed bytes");
    }

    #[test]
    fn test_open_is_bound_to_aad_and_key() {
        let kek = KeyEncryptionKey::generate();
        let sealed = seal(b"seed bytes", &kek, b"org-1").unwrap();

        assert!(open(&sealed.nonce, &sealed.ciphertext, &kek, b"org-2").is_err());
        let other = KeyEncryptionKey::generate();
        assert!(open(&sealed.nonce, &sealed.ciphertext, &other, b"org-1").is_err());
        assert!(open(&sealed.nonce[..12], &sealed.ciphertext, &kek, b"org-1").is_err());
    }

    #[test]
    fn test_kek_from_hex() {
        let hex_key = "00".repeat(32);
        let kek = KeyEncryptionKey::from_hex(&hex_key).unwrap();
        assert_eq!(kek.as_bytes(), &[0u8; 32]);
        assert!(KeyEncryptionKey::from_hex("abcd").is_err());
        assert!(KeyEncryptionKey::from_hex(&"zz".repeat(32)).is_err());
        assert_eq!(format!("{kek:?}"), "KeyEncryptionKey(..)");
    }
}
