//! The Store trait that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// The storage trait `gatekeep-core` depends on.
///
/// Every mutation that can race (entry counting, key creation, token
/// consumption) is a single conditional write on the backend side; callers
/// see [`StoreError::Conflict`] when they lose.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Organizations & users ──────────────────────────

    async fn create_organization(
        &self,
        params: &CreateOrganizationParams,
    ) -> Result<Organization, StoreError>;

    async fn get_organization(&self, id: &OrganizationId) -> Result<Organization, StoreError>;

    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError>;

    async fn get_user(&self, id: &UserId) -> Result<User, StoreError>;

    /// Flip the account to ACTIVE. Returns false when it already was.
    async fn activate_user(&self, id: &UserId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    // ───────────────────────────────────── Visit requests & access codes ──────────────────

    async fn create_visit_request(
        &self,
        params: &CreateVisitRequestParams,
    ) -> Result<VisitRequest, StoreError>;

    async fn get_visit_request(&self, id: &VisitRequestId) -> Result<VisitRequest, StoreError>;

    /// Create an access code (ACTIVE, zero entries). Duplicate hashes fail with AlreadyExists.
    async fn create_access_code(
        &self,
        params: &CreateAccessCodeParams,
    ) -> Result<AccessCode, StoreError>;

    async fn get_access_code(&self, id: &AccessCodeId) -> Result<AccessCode, StoreError>;

    /// Look up a code by the hex SHA-256 of its raw value.
    async fn get_access_code_by_hash(&self, code_hash: &str) -> Result<AccessCode, StoreError>;

    /// Unconditionally set the status (used for EXPIRED transitions).
    async fn set_access_code_status(
        &self,
        id: &AccessCodeId,
        status: AccessCodeStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Count one entry if the code is still ACTIVE with `expected_entries`
    /// used; flips to USED once `max_entries` is reached. Conflict otherwise.
    async fn record_code_entry(
        &self,
        id: &AccessCodeId,
        expected_entries: i32,
        max_entries: i32,
        at: DateTime<Utc>,
    ) -> Result<AccessCode, StoreError>;

    async fn insert_scan_log(&self, params: &CreateScanLogParams)
        -> Result<AccessScanLog, StoreError>;

    /// Scan logs in insertion order, optionally restricted to one code.
    async fn list_scan_logs(
        &self,
        access_code_id: Option<AccessCodeId>,
    ) -> Result<Vec<AccessScanLog>, StoreError>;

    // ───────────────────────────────────── Authorizations ─────────────────────────────────

    async fn create_authorization(
        &self,
        params: &CreateAuthorizationParams,
    ) -> Result<VisitorAuthorization, StoreError>;

    async fn get_authorization(
        &self,
        id: &AuthorizationId,
    ) -> Result<VisitorAuthorization, StoreError>;

    /// All authorizations of the organization for a person document, newest first.
    async fn list_authorizations_by_document(
        &self,
        organization_id: &OrganizationId,
        person_document: &str,
    ) -> Result<Vec<VisitorAuthorization>, StoreError>;

    /// Stamps `revoked_at` with the store's own clock at the update.
    async fn revoke_authorization(&self, id: &AuthorizationId) -> Result<(), StoreError>;

    /// Ids of revoked authorizations, optionally only those revoked after `since`.
    async fn list_revoked_authorizations(
        &self,
        organization_id: &OrganizationId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuthorizationId>, StoreError>;

    // ───────────────────────────────────── Access events ──────────────────────────────────

    async fn insert_access_event(&self, event: &NewAccessEvent)
        -> Result<AccessEvent, StoreError>;

    /// Insert a batch in one transaction. Events whose (device_id,
    /// client_event_id) already exist are not duplicated; the stored row is
    /// returned in their place.
    async fn insert_access_events(
        &self,
        events: &[NewAccessEvent],
    ) -> Result<Vec<AccessEvent>, StoreError>;

    async fn list_access_events(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AccessEvent>, StoreError>;

    // ───────────────────────────────────── Signing keys ───────────────────────────────────

    async fn get_active_crypto_key(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationCryptoKey, StoreError>;

    /// Insert the key as active unless the organization already has one.
    /// Returns the active key and whether this call created it.
    async fn insert_crypto_key_if_absent(
        &self,
        params: &CreateCryptoKeyParams,
    ) -> Result<(OrganizationCryptoKey, bool), StoreError>;

    async fn list_crypto_keys(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<OrganizationCryptoKey>, StoreError>;

    // ───────────────────────────────────── Enrollment ─────────────────────────────────────

    /// Create a PENDING token, revoking the user's other PENDING tokens in the
    /// same transaction. Returns the token and how many were revoked.
    async fn create_enrollment_token(
        &self,
        params: &CreateEnrollmentTokenParams,
    ) -> Result<(EnrollmentToken, u64), StoreError>;

    async fn get_enrollment_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<EnrollmentToken, StoreError>;

    async fn list_enrollment_tokens(&self, user_id: &UserId)
        -> Result<Vec<EnrollmentToken>, StoreError>;

    /// PENDING -> CONSUMED. Conflict if the token is no longer PENDING.
    async fn consume_enrollment_token(
        &self,
        id: &EnrollmentTokenId,
        at: DateTime<Utc>,
    ) -> Result<EnrollmentToken, StoreError>;

    /// PENDING -> EXPIRED. No-op for tokens in any other state.
    async fn expire_enrollment_token(
        &self,
        id: &EnrollmentTokenId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn insert_enrollment_audit(
        &self,
        params: &CreateEnrollmentAuditParams,
    ) -> Result<EnrollmentAuditEntry, StoreError>;

    async fn list_enrollment_audit(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<EnrollmentAuditEntry>, StoreError>;
}
