//! Ingestion of access events recorded while a device was offline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatekeep_storage::{
    AccessAction, AccessEvent, AuthorizationId, NewAccessEvent, OrganizationId, ScanResult, Store,
    UserId,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::GateError;

/// An event as a device queues it for upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAccessEvent {
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub authorization_id: Option<AuthorizationId>,
    pub action: AccessAction,
    pub scan_result: ScanResult,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub person_document: Option<String>,
    #[serde(default)]
    pub vehicle_plate: Option<String>,
    pub operator_id: UserId,
    pub device_id: String,
    #[serde(default = "default_offline")]
    pub offline_validated: bool,
    #[serde(default)]
    pub note: Option<String>,
    /// Device-generated id; replays with the same (device, id) are ignored.
    #[serde(default)]
    pub client_event_id: Option<String>,
    /// Device clock when the decision was taken.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

fn default_offline() -> bool {
    true
}

#[derive(Clone)]
pub struct EventSyncIngestor {
    store: Arc<dyn Store>,
}

impl EventSyncIngestor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Persist a batch in one transaction. An empty batch is a no-op.
    #[instrument(skip_all, fields(count = events.len()))]
    pub async fn ingest(
        &self,
        events: &[PendingAccessEvent],
    ) -> Result<Vec<AccessEvent>, GateError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let synced_at = Utc::now();
        let batch: Vec<NewAccessEvent> = events
            .iter()
            .map(|e| NewAccessEvent {
                organization_id: e.organization_id,
                authorization_id: e.authorization_id,
                action: e.action,
                scan_result: e.scan_result,
                person_name: e.person_name.clone(),
                person_document: e.person_document.clone(),
                vehicle_plate: e.vehicle_plate.clone(),
                operator_id: e.operator_id,
                device_id: e.device_id.clone(),
                offline_validated: e.offline_validated,
                note: e.note.clone(),
                client_event_id: e.client_event_id.clone(),
                created_at: e.occurred_at.unwrap_or(synced_at),
                synced_at: Some(synced_at),
            })
            .collect();

        let stored = self.store.insert_access_events(&batch).await?;
        info!(stored = stored.len(), "offline events ingested");
        Ok(stored)
    }
}
