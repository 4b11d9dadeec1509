//! Device-side verification with no connection to the store.
//!
//! A device keeps what enrollment handed it ([`EnrollmentBundle`]) plus a
//! [`Denylist`] fed by the revocation feed. Every failure is a decision, not
//! an error: the device must always show the guard a result.

use chrono::{DateTime, Utc};
use gatekeep_crypto::PublicJwk;
use gatekeep_storage::{AccessAction, AuthorizationId, OrganizationId, ScanResult, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::qr::{AuthorizationClaims, SignedQr};
use crate::revocation::{Denylist, RevocationDelta};
use crate::temporal::is_claimed_window_open;
use crate::{EnrollmentResult, GateError, PendingAccessEvent};

/// What a device persists after enrolling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentBundle {
    pub organization_id: OrganizationId,
    pub public_jwk: PublicJwk,
    pub key_id: String,
    pub clock_skew_tolerance_minutes: i64,
}

impl From<&EnrollmentResult> for EnrollmentBundle {
    fn from(result: &EnrollmentResult) -> Self {
        Self {
            organization_id: result.organization_id,
            public_jwk: result.public_jwk.clone(),
            key_id: result.key_id.clone(),
            clock_skew_tolerance_minutes: result.clock_skew_tolerance_minutes,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineDecision {
    pub result: ScanResult,
    pub authorization_id: Option<AuthorizationId>,
    pub person_name: Option<String>,
    pub person_document: Option<String>,
    pub vehicle_plate: Option<String>,
    pub reason: String,
}

impl OfflineDecision {
    fn rejected(result: ScanResult, reason: impl Into<String>) -> Self {
        Self {
            result,
            authorization_id: None,
            person_name: None,
            person_document: None,
            vehicle_plate: None,
            reason: reason.into(),
        }
    }
}

pub struct OfflineVerifier {
    public_key: [u8; 32],
    bundle: EnrollmentBundle,
    denylist: Denylist,
}

impl OfflineVerifier {
    /// Fails only when the bundle's JWK is unusable.
    pub fn new(bundle: EnrollmentBundle) -> Result<Self, GateError> {
        let public_key = bundle.public_jwk.public_key_bytes()?;
        Ok(Self {
            public_key,
            bundle,
            denylist: Denylist::new(),
        })
    }

    pub fn with_denylist(mut self, denylist: Denylist) -> Self {
        self.denylist = denylist;
        self
    }

    pub fn bundle(&self) -> &EnrollmentBundle {
        &self.bundle
    }

    pub fn apply_revocations(&mut self, delta: &RevocationDelta) {
        self.denylist.apply(delta);
    }

    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    /// Format, signature, window and denylist checks, in that order.
    pub fn verify(&self, signed_qr: &str, now: DateTime<Utc>) -> OfflineDecision {
        let qr = match SignedQr::parse(signed_qr) {
            Ok(qr) => qr,
            Err(e) => {
                debug!("unreadable signed QR: {}", e);
                return OfflineDecision::rejected(ScanResult::Invalid, "Unreadable QR code");
            }
        };
        if !qr.verify(&self.public_key) {
            warn!(key_id = %self.bundle.key_id, "offline signature check failed");
            return OfflineDecision::rejected(ScanResult::Invalid, "Invalid signature");
        }

        let payload = qr.payload();
        let Some(authorization_id) = payload
            .authorization_id()
            .and_then(|id| id.parse::<AuthorizationId>().ok())
        else {
            warn!("signed QR without a usable authorization id");
            return OfflineDecision::rejected(ScanResult::Invalid, "Missing authorization id");
        };

        let (result, reason) = if !is_claimed_window_open(
            now,
            payload.valid_from(),
            payload.valid_to(),
            self.bundle.clock_skew_tolerance_minutes,
        ) {
            (ScanResult::Expired, "Outside validity window")
        } else if self.denylist.is_revoked(&authorization_id) {
            warn!(authorization = %authorization_id, "authorization on local denylist");
            (ScanResult::Revoked, "Authorization revoked")
        } else {
            (ScanResult::Valid, "Verified offline")
        };

        OfflineDecision {
            result,
            authorization_id: Some(authorization_id),
            person_name: payload.person_name().map(str::to_string),
            person_document: payload.person_document().map(str::to_string),
            vehicle_plate: payload.vehicle_plate().map(str::to_string),
            reason: reason.to_string(),
        }
    }

    /// Queue a decision for upload once the device reconnects.
    pub fn to_pending_event(
        &self,
        decision: &OfflineDecision,
        operator_id: UserId,
        device_id: &str,
        action: AccessAction,
        now: DateTime<Utc>,
    ) -> PendingAccessEvent {
        PendingAccessEvent {
            organization_id: self.bundle.organization_id,
            authorization_id: decision.authorization_id,
            action,
            scan_result: decision.result,
            person_name: decision.person_name.clone(),
            person_document: decision.person_document.clone(),
            vehicle_plate: decision.vehicle_plate.clone(),
            operator_id,
            device_id: device_id.to_string(),
            offline_validated: true,
            note: Some(decision.reason.clone()),
            client_event_id: Some(Uuid::new_v4().to_string()),
            occurred_at: Some(now),
        }
    }
}
