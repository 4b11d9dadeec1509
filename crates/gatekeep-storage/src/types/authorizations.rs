//! Visitor authorizations (issued and revoked by the issuance workflow).

use chrono::{DateTime, Utc};

use super::{AuthorizationId, OrganizationId};

text_enum! {
    AuthorizationStatus as "authorization status" {
        Active => "ACTIVE",
        Revoked => "REVOKED",
    }
}

/// Visitor authorization record
#[derive(Clone, Debug)]
pub struct VisitorAuthorization {
    pub id: AuthorizationId,
    pub organization_id: OrganizationId,
    pub status: AuthorizationStatus,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub person_name: String,
    pub person_document: String,
    pub vehicle_plate: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_color: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a visitor authorization
#[derive(Clone, Debug)]
pub struct CreateAuthorizationParams {
    pub organization_id: OrganizationId,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub person_name: String,
    pub person_document: String,
    pub vehicle_plate: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_color: Option<String>,
}
