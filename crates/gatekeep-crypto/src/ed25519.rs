//! Ed25519 signature operations.
//!
//! Tenant keys sign visitor authorizations; checkpoint devices verify them
//! with the public half they received at enrollment.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Algorithm label persisted next to each tenant key.
pub const ED25519_ALGORITHM: &str = "Ed25519";

/// Ed25519 signer.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Create a new signer with a random key.
    #[must_use]
    pub fn random() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create a signer from seed bytes (32 bytes).
    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = seed.try_into().map_err(|_| {
            CryptoError::invalid_private_key(format!(
                "Ed25519 seed must be 32 bytes, got {}",
                seed.len()
            ))
        })?;
        let seed = Zeroizing::new(seed);

        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// The 32-byte seed, for sealing at rest.
    pub fn seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        self.signing_key.sign(data).to_bytes()
    }
}

/// Verify an Ed25519 signature.
///
/// Malformed keys or signatures are errors; a well-formed signature that
/// does not match is `Ok(false)`.
pub fn verify_ed25519(
    public_key: &[u8],
    data: &[u8],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    let pk_bytes: [u8; 32] = public_key.try_into().map_err(|_| {
        CryptoError::invalid_public_key(format!(
            "Ed25519 public key must be 32 bytes, got {}",
            public_key.len()
        ))
    })?;

    let vk = VerifyingKey::from_bytes(&pk_bytes)
        .map_err(|e| CryptoError::invalid_public_key(e.to_string()))?;

    let sig = Signature::from_slice(signature).map_err(|_| {
        CryptoError::invalid_signature(format!(
            "Ed25519 signature must be 64 bytes, got {}",
            signature.len()
        ))
    })?;

    Ok(vk.verify(data, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ed25519_sign_verify() {
        let signer = Ed25519Signer::random();
        let data = b"test message";
        let signature = signer.sign(data);

        assert!(verify_ed25519(&signer.public_key_bytes(), data, &signature).unwrap());
        assert!(!verify_ed25519(&signer.public_key_bytes(), b"other", &signature).unwrap());
    }

    #[test]
    fn test_ed25519_from_seed() {
        let seed = [42u8; 32];
        let signer1 = Ed25519Signer::from_seed(&seed).unwrap();
        let signer2 = Ed25519Signer::from_seed(&seed).unwrap();

        assert_eq!(signer1.public_key_bytes(), signer2.public_key_bytes());
        assert_eq!(*signer1.seed(), seed);
    }

    #[test]
    fn test_ed25519_rejects_bad_lengths() {
        assert!(Ed25519Signer::from_seed(&[0u8; 31]).is_err());

        let signer = Ed25519Signer::random();
        let sig = signer.sign(b"x");
        assert!(matches!(
            verify_ed25519(&[0u8; 16], b"x", &sig),
            Err(CryptoError::InvalidPublicKey { .. })
        ));
        assert!(matches!(
            verify_ed25519(&signer.public_key_bytes(), b"x", &sig[..63]),
            Err(CryptoError::InvalidSignature { .. })
        ));
    }
}
