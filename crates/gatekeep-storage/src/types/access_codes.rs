//! Hashed access codes, their visit requests and the scan audit trail.

use chrono::{DateTime, Utc};

use super::{AccessCodeId, OrganizationId, ScanLogId, ScanResult, UserId, VisitRequestId};

text_enum! {
    /// Entry-limit state machine: ACTIVE -> USED | EXPIRED | REVOKED.
    AccessCodeStatus as "access code status" {
        Active => "ACTIVE",
        Used => "USED",
        Revoked => "REVOKED",
        Expired => "EXPIRED",
    }
}

/// Visit request record (owned by the visit-request workflow).
#[derive(Clone, Debug)]
pub struct VisitRequest {
    pub id: VisitRequestId,
    pub organization_id: OrganizationId,
    pub max_entries: i32,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a visit request
#[derive(Clone, Debug)]
pub struct CreateVisitRequestParams {
    pub organization_id: OrganizationId,
    pub max_entries: i32,
}

/// Access code record. The raw code is never stored, only its hash.
#[derive(Clone, Debug)]
pub struct AccessCode {
    pub id: AccessCodeId,
    pub organization_id: OrganizationId,
    pub visit_request_id: VisitRequestId,
    pub code_hash: String, // hex SHA-256 of the raw code
    pub status: AccessCodeStatus,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub entries_used: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating an access code
#[derive(Clone, Debug)]
pub struct CreateAccessCodeParams {
    pub organization_id: OrganizationId,
    pub visit_request_id: VisitRequestId,
    pub code_hash: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Immutable record of one scan attempt.
#[derive(Clone, Debug)]
pub struct AccessScanLog {
    pub id: ScanLogId,
    pub access_code_id: Option<AccessCodeId>, // None when the code did not resolve
    pub result: ScanResult,
    pub operator_id: UserId,
    pub location: Option<String>,
    pub device: Option<String>,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for appending a scan log entry
#[derive(Clone, Debug)]
pub struct CreateScanLogParams {
    pub access_code_id: Option<AccessCodeId>,
    pub result: ScanResult,
    pub operator_id: UserId,
    pub location: Option<String>,
    pub device: Option<String>,
    pub note: String,
}
