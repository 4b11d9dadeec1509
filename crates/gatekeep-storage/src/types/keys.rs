//! Tenant signing keys.

use chrono::{DateTime, Utc};

use super::{CryptoKeyId, OrganizationId};

/// Signing key row. At most one row per organization has `is_active` set.
#[derive(Clone, Debug)]
pub struct OrganizationCryptoKey {
    pub id: CryptoKeyId,
    pub organization_id: OrganizationId,
    pub key_id: String,       // JWK thumbprint, handed to devices as `kid`
    pub algorithm: String,    // "Ed25519"
    pub public_jwk: String,   // JWK JSON of the public half
    pub private_key_nonce: Vec<u8>,      // 24-byte XChaCha20 nonce
    pub private_key_ciphertext: Vec<u8>, // sealed 32-byte Ed25519 seed
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a freshly generated active key
#[derive(Clone, Debug)]
pub struct CreateCryptoKeyParams {
    pub organization_id: OrganizationId,
    pub key_id: String,
    pub algorithm: String,
    pub public_jwk: String,
    pub private_key_nonce: Vec<u8>,
    pub private_key_ciphertext: Vec<u8>,
}
