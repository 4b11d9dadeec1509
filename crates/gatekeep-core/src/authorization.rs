//! Signed authorization verification.
//!
//! Checks run in order and stop at the first failure:
//!
//! 1. wire format and payload decode (typed errors, nothing recorded)
//! 2. authorization id present
//! 3. tenant public key present
//! 4. Ed25519 signature over the payload text -> INVALID
//! 5. claimed window, widened by the online clock skew -> EXPIRED
//! 6. live authorization record still ACTIVE -> REVOKED
//!
//! Every decision from step 4 on is persisted as exactly one access event.
//! The signature alone never admits: a revocation issued after signing wins.

use std::sync::Arc;

use chrono::Utc;
use gatekeep_storage::{
    AccessAction, AccessEvent, AuthorizationId, AuthorizationStatus, OrganizationId, ScanResult,
    Store, StoreError,
};
use tracing::{info, instrument, warn};

use crate::qr::{AuthorizationClaims, QrPayload, SignedQr};
use crate::temporal::is_claimed_window_open;
use crate::{Checkpoint, GateError, KeyManager};

#[derive(Clone, Debug)]
pub struct VerificationOutcome {
    pub result: ScanResult,
    pub event: AccessEvent,
}

#[derive(Clone)]
pub struct AuthorizationVerifier {
    store: Arc<dyn Store>,
    keys: KeyManager,
    clock_skew_minutes: i64,
}

impl AuthorizationVerifier {
    pub fn new(store: Arc<dyn Store>, keys: KeyManager, clock_skew_minutes: i64) -> Self {
        Self {
            store,
            keys,
            clock_skew_minutes,
        }
    }

    #[instrument(skip_all, fields(org = %organization_id, device = %checkpoint.device_id))]
    pub async fn verify(
        &self,
        organization_id: &OrganizationId,
        signed_qr: &str,
        checkpoint: &Checkpoint,
        action: AccessAction,
    ) -> Result<VerificationOutcome, GateError> {
        let qr = SignedQr::parse(signed_qr)?;
        let payload = qr.payload();
        let claimed_id = payload.authorization_id().ok_or(GateError::MissingAuthId)?;
        let public_key = match self.keys.active_public_key(organization_id).await {
            Ok((_, jwk)) => jwk.public_key_bytes().ok(),
            Err(GateError::Crypto(e)) => {
                warn!("stored public key is unusable: {}", e);
                None
            }
            Err(e) => return Err(e),
        };
        let now = Utc::now();

        if !public_key.is_some_and(|key| qr.verify(&key)) {
            warn!("signed QR failed signature verification");
            let event = self
                .record(
                    organization_id,
                    payload,
                    None,
                    checkpoint,
                    action,
                    ScanResult::Invalid,
                    "Invalid signature",
                )
                .await?;
            return Ok(VerificationOutcome {
                result: ScanResult::Invalid,
                event,
            });
        }

        // A well-signed id that is not one of ours resolves to nothing.
        let authorization_id = claimed_id.parse::<AuthorizationId>().ok();

        if !is_claimed_window_open(
            now,
            payload.valid_from(),
            payload.valid_to(),
            self.clock_skew_minutes,
        ) {
            info!("signed QR outside its validity window");
            let event = self
                .record(
                    organization_id,
                    payload,
                    authorization_id,
                    checkpoint,
                    action,
                    ScanResult::Expired,
                    "Outside validity window",
                )
                .await?;
            return Ok(VerificationOutcome {
                result: ScanResult::Expired,
                event,
            });
        }

        let record = match authorization_id {
            Some(id) => match self.store.get_authorization(&id).await {
                Ok(auth) if auth.organization_id == *organization_id => Some(auth),
                Ok(_) | Err(StoreError::NotFound) => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        let Some(record) = record else {
            warn!("signed QR references an unknown authorization");
            self.record(
                organization_id,
                payload,
                None,
                checkpoint,
                action,
                ScanResult::Invalid,
                "Authorization not found",
            )
            .await?;
            return Err(GateError::NotFound);
        };

        let (result, note) = if record.status == AuthorizationStatus::Active {
            (ScanResult::Valid, "Signed authorization verified")
        } else {
            warn!(authorization = %record.id, "signed QR for a revoked authorization");
            (ScanResult::Revoked, "Authorization revoked")
        };
        let event = self
            .record(
                organization_id,
                payload,
                Some(record.id),
                checkpoint,
                action,
                result,
                note,
            )
            .await?;
        Ok(VerificationOutcome { result, event })
    }

    /// Signed QR for a stored authorization, as issuance hands it to the
    /// visitor. The organization key is created on first use. Revocation is
    /// not checked here; verification reports it.
    #[instrument(skip(self))]
    pub async fn issue_qr(&self, authorization_id: &AuthorizationId) -> Result<String, GateError> {
        let auth = self.store.get_authorization(authorization_id).await?;
        self.keys.get_or_create(&auth.organization_id).await?;
        let signer = self.keys.signer_for(&auth.organization_id).await?;
        SignedQr::encode(&QrPayload::for_authorization(&auth), &signer)
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        organization_id: &OrganizationId,
        payload: &QrPayload,
        authorization_id: Option<AuthorizationId>,
        checkpoint: &Checkpoint,
        action: AccessAction,
        result: ScanResult,
        note: &str,
    ) -> Result<AccessEvent, GateError> {
        let mut event = checkpoint.event(*organization_id, action, result, Utc::now());
        event.authorization_id = authorization_id;
        event.person_name = payload.person_name().map(str::to_string);
        event.person_document = payload.person_document().map(str::to_string);
        event.vehicle_plate = payload.vehicle_plate().map(str::to_string);
        event.note = Some(note.to_string());
        Ok(self.store.insert_access_event(&event).await?)
    }
}
