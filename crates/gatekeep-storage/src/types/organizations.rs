//! Tenant and account records consumed by the checkpoint core.
//!
//! Both are owned by the administration workflows; this crate only models
//! the fields enrollment needs (display names and the account status).

use chrono::{DateTime, Utc};

use super::{OrganizationId, UserId};

/// Organization (tenant) record
#[derive(Clone, Debug)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating an organization
#[derive(Clone, Debug)]
pub struct CreateOrganizationParams {
    pub name: String,
}

text_enum! {
    /// Account lifecycle as seen by device enrollment.
    UserStatus as "user status" {
        /// Created by an administrator, device not yet enrolled.
        PreRegistered => "PRE_REGISTERED",
        Active => "ACTIVE",
        Disabled => "DISABLED",
    }
}

/// Account record (checkpoint operators are regular accounts)
#[derive(Clone, Debug)]
pub struct User {
    pub id: UserId,
    pub organization_id: OrganizationId,
    pub display_name: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating an account
#[derive(Clone, Debug)]
pub struct CreateUserParams {
    pub organization_id: OrganizationId,
    pub display_name: String,
    pub status: UserStatus,
}
