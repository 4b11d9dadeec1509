//! Tenant signing keys: exactly one active Ed25519 keypair per organization,
//! created lazily. Only the public half ever leaves this module as a JWK.

use std::sync::Arc;

use gatekeep_crypto::{open, seal, Ed25519Signer, KeyEncryptionKey, PublicJwk, ED25519_ALGORITHM};
use gatekeep_storage::{
    CreateCryptoKeyParams, OrganizationCryptoKey, OrganizationId, Store, StoreError,
};
use tracing::{info, instrument};

use crate::GateError;

#[derive(Clone)]
pub struct KeyManager {
    store: Arc<dyn Store>,
    kek: Arc<KeyEncryptionKey>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn Store>, kek: Arc<KeyEncryptionKey>) -> Self {
        Self { store, kek }
    }

    /// Active key of the organization, generating one if it has none.
    ///
    /// Concurrent first calls race on the store's one-active-key constraint;
    /// every caller gets the single winner back.
    #[instrument(skip_all, fields(org = %organization_id))]
    pub async fn get_or_create(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationCryptoKey, GateError> {
        match self.store.get_active_crypto_key(organization_id).await {
            Ok(key) => return Ok(key),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let signer = Ed25519Signer::random();
        let jwk = PublicJwk::from_public_bytes(&signer.public_key_bytes());
        let aad = organization_id.to_string();
        let sealed = seal(signer.seed().as_slice(), &self.kek, aad.as_bytes())?;

        let (key, created) = self
            .store
            .insert_crypto_key_if_absent(&CreateCryptoKeyParams {
                organization_id: *organization_id,
                key_id: jwk.thumbprint(),
                algorithm: ED25519_ALGORITHM.to_string(),
                public_jwk: jwk.to_json(),
                private_key_nonce: sealed.nonce.to_vec(),
                private_key_ciphertext: sealed.ciphertext,
            })
            .await?;

        if created {
            info!(key_id = %key.key_id, "generated organization signing key");
        }
        Ok(key)
    }

    /// Public JWK of the active key. Never creates one.
    pub async fn active_public_key(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<(String, PublicJwk), GateError> {
        let key = self.active_key(organization_id).await?;
        let jwk = PublicJwk::from_json(&key.public_jwk)?;
        Ok((key.key_id, jwk))
    }

    /// Unseal the active private key, for issuance workflows.
    pub async fn signer_for(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Ed25519Signer, GateError> {
        let key = self.active_key(organization_id).await?;
        let aad = organization_id.to_string();
        let seed = open(
            &key.private_key_nonce,
            &key.private_key_ciphertext,
            &self.kek,
            aad.as_bytes(),
        )?;
        Ok(Ed25519Signer::from_seed(&seed)?)
    }

    async fn active_key(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationCryptoKey, GateError> {
        self.store
            .get_active_crypto_key(organization_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => GateError::CryptoKeyNotFound,
                other => other.into(),
            })
    }
}
