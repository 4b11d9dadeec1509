//! Entry by visitor document number, and vehicle exits.

use std::sync::Arc;

use chrono::Utc;
use gatekeep_storage::{
    AccessAction, AccessEvent, AuthorizationStatus, NewAccessEvent, OrganizationId, ScanResult,
    Store, VisitorAuthorization,
};
use tracing::{info, instrument, warn};

use crate::temporal::is_within_window;
use crate::{Checkpoint, GateError};

#[derive(Clone)]
pub struct DocumentValidator {
    store: Arc<dyn Store>,
    clock_skew_minutes: i64,
}

impl DocumentValidator {
    pub fn new(store: Arc<dyn Store>, clock_skew_minutes: i64) -> Self {
        Self {
            store,
            clock_skew_minutes,
        }
    }

    /// Look up the visitor's authorizations by document and record one event.
    ///
    /// An ACTIVE authorization whose window holds admits. Otherwise the
    /// result is REVOKED when every candidate is revoked, EXPIRED if not.
    #[instrument(skip_all, fields(org = %organization_id, device = %checkpoint.device_id))]
    pub async fn validate_document(
        &self,
        organization_id: &OrganizationId,
        document: &str,
        checkpoint: &Checkpoint,
        action: AccessAction,
    ) -> Result<AccessEvent, GateError> {
        let document = document.trim();
        if document.is_empty() {
            return Err(GateError::ValidationRequired("document"));
        }

        let now = Utc::now();
        let candidates = self
            .store
            .list_authorizations_by_document(organization_id, document)
            .await?;

        if candidates.is_empty() {
            warn!("no authorization for document");
            let mut event = checkpoint.event(*organization_id, action, ScanResult::Invalid, now);
            event.person_document = Some(document.to_string());
            event.note = Some("No authorization for document".to_string());
            self.store.insert_access_event(&event).await?;
            return Err(GateError::NotFound);
        }

        let admitted = candidates.iter().find(|auth| {
            auth.status == AuthorizationStatus::Active
                && is_within_window(now, auth.valid_from, auth.valid_to, self.clock_skew_minutes)
        });

        let (auth, result, note) = match admitted {
            Some(auth) => (auth, ScanResult::Valid, "Authorization valid"),
            None if candidates
                .iter()
                .all(|a| a.status == AuthorizationStatus::Revoked) =>
            {
                (&candidates[0], ScanResult::Revoked, "Authorization revoked")
            }
            None => (
                &candidates[0],
                ScanResult::Expired,
                "No authorization valid at this time",
            ),
        };

        if result.admits() {
            info!(authorization = %auth.id, "document admitted");
        } else {
            warn!(authorization = %auth.id, result = %result, "document denied");
        }

        let event = self
            .store
            .insert_access_event(&authorization_event(checkpoint, auth, action, result, note))
            .await?;
        Ok(event)
    }

    /// Record a vehicle leaving. Exits are not gated, only logged.
    #[instrument(skip_all, fields(org = %organization_id, device = %checkpoint.device_id))]
    pub async fn register_vehicle_exit(
        &self,
        organization_id: &OrganizationId,
        plate: &str,
        checkpoint: &Checkpoint,
    ) -> Result<AccessEvent, GateError> {
        let plate = plate.trim();
        if plate.is_empty() {
            return Err(GateError::ValidationRequired("vehicle plate"));
        }

        let mut event = checkpoint.event(
            *organization_id,
            AccessAction::Exit,
            ScanResult::Valid,
            Utc::now(),
        );
        event.vehicle_plate = Some(plate.to_uppercase());
        event.note = Some("Vehicle exit".to_string());
        Ok(self.store.insert_access_event(&event).await?)
    }
}

fn authorization_event(
    checkpoint: &Checkpoint,
    auth: &VisitorAuthorization,
    action: AccessAction,
    result: ScanResult,
    note: &str,
) -> NewAccessEvent {
    let mut event = checkpoint.event(auth.organization_id, action, result, Utc::now());
    event.authorization_id = Some(auth.id);
    event.person_name = Some(auth.person_name.clone());
    event.person_document = Some(auth.person_document.clone());
    event.vehicle_plate = auth.vehicle_plate.clone();
    event.note = Some(note.to_string());
    event
}
