//! Entry/exit decisions recorded by every validation path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccessEventId, AuthorizationId, OrganizationId, UserId};

text_enum! {
    AccessAction as "access action" {
        Entry => "ENTRY",
        Exit => "EXIT",
    }
}

text_enum! {
    /// Outcome of a validation attempt.
    ScanResult as "scan result" {
        Valid => "VALID",
        Invalid => "INVALID",
        Expired => "EXPIRED",
        Revoked => "REVOKED",
        AlreadyUsed => "ALREADY_USED",
    }
}

impl ScanResult {
    /// Only VALID admits the visitor.
    pub fn admits(&self) -> bool {
        matches!(self, ScanResult::Valid)
    }
}

/// Access event record (immutable once written)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessEvent {
    pub id: AccessEventId,
    pub organization_id: OrganizationId,
    pub authorization_id: Option<AuthorizationId>,
    pub action: AccessAction,
    pub scan_result: ScanResult,
    pub person_name: Option<String>,
    pub person_document: Option<String>,
    pub vehicle_plate: Option<String>,
    pub operator_id: UserId,
    pub device_id: String,
    pub offline_validated: bool,
    pub note: Option<String>,
    pub client_event_id: Option<String>, // device-generated id, dedup key with device_id
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Parameters for recording an access event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewAccessEvent {
    pub organization_id: OrganizationId,
    pub authorization_id: Option<AuthorizationId>,
    pub action: AccessAction,
    pub scan_result: ScanResult,
    pub person_name: Option<String>,
    pub person_document: Option<String>,
    pub vehicle_plate: Option<String>,
    pub operator_id: UserId,
    pub device_id: String,
    pub offline_validated: bool,
    pub note: Option<String>,
    pub client_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}
