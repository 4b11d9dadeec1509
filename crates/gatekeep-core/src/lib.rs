//! Checkpoint core for gatekeep.
//!
//! Decides whether a visitor may pass a gate, online or offline:
//!
//! - [`AccessCodeValidator`]: hashed, limited-use access codes
//! - [`AuthorizationVerifier`]: Ed25519 signed QR credentials
//! - [`DocumentValidator`]: lookup by visitor document, vehicle exits
//! - [`RevocationFeed`] / [`Denylist`]: incremental revocation sync
//! - [`EventSyncIngestor`]: events recorded while a device was offline
//! - [`EnrollmentService`]: single-use tokens that bootstrap a device
//! - [`OfflineVerifier`]: the device-side verifier built from an enrollment
//!
//! Persistence goes through [`gatekeep_storage::Store`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatekeep_storage::{AccessAction, NewAccessEvent, OrganizationId, ScanResult, Store, UserId};
use serde::{Deserialize, Serialize};

pub mod access_code;
pub mod authorization;
pub mod config;
pub mod document;
pub mod enrollment;
pub mod error;
pub mod keys;
pub mod offline;
pub mod qr;
pub mod revocation;
pub mod sync;
pub mod temporal;

pub use access_code::{access_code_hash, AccessCodeValidator, ScanOutcome};
pub use authorization::{AuthorizationVerifier, VerificationOutcome};
pub use config::{ConfigError, GateConfig};
pub use document::DocumentValidator;
pub use enrollment::{
    DeviceInfo, EnrollmentPreview, EnrollmentResult, EnrollmentService, IssuedEnrollment,
    RequestMeta,
};
pub use error::GateError;
pub use keys::KeyManager;
pub use offline::{EnrollmentBundle, OfflineDecision, OfflineVerifier};
pub use qr::{AuthorizationClaims, QrPayload, SignedQr};
pub use revocation::{Denylist, RevocationDelta, RevocationFeed, REVOCATION_FEED_OVERLAP_SECONDS};
pub use sync::{EventSyncIngestor, PendingAccessEvent};
pub use temporal::is_within_window;

/// Who is scanning, and where.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub operator_id: UserId,
    pub device_id: String,
    pub location: Option<String>,
}

impl Checkpoint {
    /// Online event skeleton; callers fill in the visitor fields.
    pub(crate) fn event(
        &self,
        organization_id: OrganizationId,
        action: AccessAction,
        scan_result: ScanResult,
        now: DateTime<Utc>,
    ) -> NewAccessEvent {
        NewAccessEvent {
            organization_id,
            authorization_id: None,
            action,
            scan_result,
            person_name: None,
            person_document: None,
            vehicle_plate: None,
            operator_id: self.operator_id,
            device_id: self.device_id.clone(),
            offline_validated: false,
            note: None,
            client_event_id: None,
            created_at: now,
            synced_at: None,
        }
    }
}

/// All checkpoint services over one store and configuration.
#[derive(Clone)]
pub struct Gatekeeper {
    pub keys: KeyManager,
    pub access_codes: AccessCodeValidator,
    pub authorizations: AuthorizationVerifier,
    pub documents: DocumentValidator,
    pub revocations: RevocationFeed,
    pub sync: EventSyncIngestor,
    pub enrollment: EnrollmentService,
}

impl Gatekeeper {
    pub fn new(store: Arc<dyn Store>, config: GateConfig) -> Self {
        let config = Arc::new(config);
        let keys = KeyManager::new(store.clone(), config.key_encryption_key.clone());
        Self {
            access_codes: AccessCodeValidator::new(store.clone()),
            authorizations: AuthorizationVerifier::new(
                store.clone(),
                keys.clone(),
                config.online_clock_skew_minutes,
            ),
            documents: DocumentValidator::new(store.clone(), config.online_clock_skew_minutes),
            revocations: RevocationFeed::new(store.clone()),
            sync: EventSyncIngestor::new(store.clone()),
            enrollment: EnrollmentService::new(store, keys.clone(), config),
            keys,
        }
    }
}
