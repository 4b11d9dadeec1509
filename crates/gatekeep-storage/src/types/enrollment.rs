//! Device enrollment tokens and their audit trail.

use chrono::{DateTime, Utc};

use super::{EnrollmentAuditId, EnrollmentTokenId, OrganizationId, UserId};

text_enum! {
    /// PENDING -> CONSUMED | REVOKED | EXPIRED
    EnrollmentTokenStatus as "enrollment token status" {
        Pending => "PENDING",
        Consumed => "CONSUMED",
        Revoked => "REVOKED",
        Expired => "EXPIRED",
    }
}

/// Enrollment token record. Only the hash of the raw token is stored.
#[derive(Clone, Debug)]
pub struct EnrollmentToken {
    pub id: EnrollmentTokenId,
    pub organization_id: OrganizationId,
    pub user_id: UserId, // checkpoint operator account being activated
    pub token_hash: String,
    pub status: EnrollmentTokenStatus,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for minting an enrollment token.
///
/// Creating a token revokes every still-PENDING token of the same user.
#[derive(Clone, Debug)]
pub struct CreateEnrollmentTokenParams {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
}

text_enum! {
    EnrollmentAuditAction as "enrollment audit action" {
        Created => "CREATED",
        UrlGenerated => "URL_GENERATED",
        UrlRegenerated => "URL_REGENERATED",
        Consumed => "CONSUMED",
    }
}

/// Immutable enrollment audit entry
#[derive(Clone, Debug)]
pub struct EnrollmentAuditEntry {
    pub id: EnrollmentAuditId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub token_id: Option<EnrollmentTokenId>,
    pub action: EnrollmentAuditAction,
    pub actor_id: Option<UserId>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_platform: Option<String>,
    pub device_model: Option<String>,
    pub app_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for appending an enrollment audit entry
#[derive(Clone, Debug)]
pub struct CreateEnrollmentAuditParams {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub token_id: Option<EnrollmentTokenId>,
    pub action: EnrollmentAuditAction,
    pub actor_id: Option<UserId>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_platform: Option<String>,
    pub device_model: Option<String>,
    pub app_version: Option<String>,
}
