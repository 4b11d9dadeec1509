//! Device enrollment: single-use tokens that activate a checkpoint operator
//! and hand the device its tenant's public key material.
//!
//! PENDING -> CONSUMED | REVOKED | EXPIRED. Only the SHA-256 of the raw
//! token is stored; the raw token lives in the enrollment URL.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use gatekeep_crypto::{generate_token, hash_token, PublicJwk};
use gatekeep_storage::{
    CreateEnrollmentAuditParams, CreateEnrollmentTokenParams, EnrollmentAuditAction,
    EnrollmentToken, EnrollmentTokenId, EnrollmentTokenStatus, OrganizationId, Store, StoreError,
    UserId,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{GateConfig, GateError, KeyManager};

/// What the enrolling device reports about itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Network metadata of the request, for the audit trail.
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A freshly minted token. The raw token is not recoverable afterwards.
#[derive(Clone)]
pub struct IssuedEnrollment {
    pub token_id: EnrollmentTokenId,
    pub raw_token: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
    /// PENDING tokens of the same operator revoked by this issuance.
    pub superseded: u64,
}

impl std::fmt::Debug for IssuedEnrollment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedEnrollment")
            .field("token_id", &self.token_id)
            .field("expires_at", &self.expires_at)
            .field("superseded", &self.superseded)
            .finish_non_exhaustive()
    }
}

/// Confirmation screen data; reading it changes nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentPreview {
    pub operator_name: String,
    pub organization_name: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResult {
    pub operator_id: UserId,
    pub operator_name: String,
    pub organization_id: OrganizationId,
    pub organization_name: String,
    pub public_jwk: PublicJwk,
    pub key_id: String,
    /// Tolerance the device applies to every offline verification.
    pub clock_skew_tolerance_minutes: i64,
}

#[derive(Clone)]
pub struct EnrollmentService {
    store: Arc<dyn Store>,
    keys: KeyManager,
    config: Arc<GateConfig>,
}

impl EnrollmentService {
    pub fn new(store: Arc<dyn Store>, keys: KeyManager, config: Arc<GateConfig>) -> Self {
        Self {
            store,
            keys,
            config,
        }
    }

    /// Mint the first enrollment URL for an operator account.
    #[instrument(skip_all, fields(user = %user_id))]
    pub async fn issue(
        &self,
        user_id: &UserId,
        actor_id: Option<UserId>,
        meta: &RequestMeta,
    ) -> Result<IssuedEnrollment, GateError> {
        self.mint(
            user_id,
            actor_id,
            meta,
            &[
                EnrollmentAuditAction::Created,
                EnrollmentAuditAction::UrlGenerated,
            ],
        )
        .await
    }

    /// Replace a lost or stale URL. Still-PENDING tokens of the operator are
    /// revoked in the same transaction that stores the new one.
    #[instrument(skip_all, fields(user = %user_id))]
    pub async fn regenerate(
        &self,
        user_id: &UserId,
        actor_id: Option<UserId>,
        meta: &RequestMeta,
    ) -> Result<IssuedEnrollment, GateError> {
        self.mint(
            user_id,
            actor_id,
            meta,
            &[EnrollmentAuditAction::UrlRegenerated],
        )
        .await
    }

    /// Check a raw token without touching its state.
    #[instrument(skip_all)]
    pub async fn validate_only(&self, raw_token: &str) -> Result<EnrollmentPreview, GateError> {
        let token = self.lookup(raw_token).await?;
        check_usable(&token, Utc::now())?;

        let user = self.store.get_user(&token.user_id).await?;
        let organization = self.store.get_organization(&token.organization_id).await?;
        Ok(EnrollmentPreview {
            operator_name: user.display_name,
            organization_name: organization.name,
            expires_at: token.expires_at,
        })
    }

    /// Consume the token, make sure the tenant has a signing key, activate the
    /// operator and return what the device needs to verify offline.
    #[instrument(skip_all)]
    pub async fn enroll(
        &self,
        raw_token: &str,
        device: &DeviceInfo,
        meta: &RequestMeta,
    ) -> Result<EnrollmentResult, GateError> {
        let now = Utc::now();
        let token = self.lookup(raw_token).await?;
        if let Err(e) = check_usable(&token, now) {
            if matches!(e, GateError::TokenExpired)
                && token.status == EnrollmentTokenStatus::Pending
            {
                self.store.expire_enrollment_token(&token.id, now).await?;
            }
            warn!(token = %token.id, code = e.code(), "enrollment token rejected");
            return Err(e);
        }

        let token = match self.store.consume_enrollment_token(&token.id, now).await {
            Ok(consumed) => consumed,
            Err(StoreError::Conflict) => {
                // Lost the race against another enrollment with the same token.
                let current = self
                    .store
                    .get_enrollment_token_by_hash(&token.token_hash)
                    .await?;
                warn!(token = %token.id, status = %current.status, "enrollment token reuse");
                return Err(match current.status {
                    EnrollmentTokenStatus::Consumed => GateError::TokenAlreadyUsed,
                    other => GateError::TokenInvalidState(other),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let key = self.keys.get_or_create(&token.organization_id).await?;
        let public_jwk = PublicJwk::from_json(&key.public_jwk)?;

        if self.store.activate_user(&token.user_id, now).await? {
            info!(user = %token.user_id, "operator account activated");
        }

        self.store
            .insert_enrollment_audit(&CreateEnrollmentAuditParams {
                organization_id: token.organization_id,
                user_id: token.user_id,
                token_id: Some(token.id),
                action: EnrollmentAuditAction::Consumed,
                actor_id: Some(token.user_id),
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
                device_platform: device.platform.clone(),
                device_model: device.model.clone(),
                app_version: device.app_version.clone(),
            })
            .await?;

        let user = self.store.get_user(&token.user_id).await?;
        let organization = self.store.get_organization(&token.organization_id).await?;
        info!(token = %token.id, key_id = %key.key_id, "device enrolled");

        Ok(EnrollmentResult {
            operator_id: user.id,
            operator_name: user.display_name,
            organization_id: organization.id,
            organization_name: organization.name,
            public_jwk,
            key_id: key.key_id,
            clock_skew_tolerance_minutes: self.config.offline_clock_skew_minutes,
        })
    }

    async fn mint(
        &self,
        user_id: &UserId,
        actor_id: Option<UserId>,
        meta: &RequestMeta,
        actions: &[EnrollmentAuditAction],
    ) -> Result<IssuedEnrollment, GateError> {
        let expires_at = Duration::try_hours(self.config.enrollment_ttl_hours)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or(GateError::InvalidTtl(self.config.enrollment_ttl_hours))?;
        let user = self.store.get_user(user_id).await?;
        let raw_token = generate_token();

        let (token, superseded) = self
            .store
            .create_enrollment_token(&CreateEnrollmentTokenParams {
                organization_id: user.organization_id,
                user_id: user.id,
                token_hash: hash_token(&raw_token),
                expires_at,
                created_by: actor_id,
            })
            .await?;

        for action in actions {
            self.store
                .insert_enrollment_audit(&CreateEnrollmentAuditParams {
                    organization_id: user.organization_id,
                    user_id: user.id,
                    token_id: Some(token.id),
                    action: *action,
                    actor_id,
                    ip_address: meta.ip_address.clone(),
                    user_agent: meta.user_agent.clone(),
                    device_platform: None,
                    device_model: None,
                    app_version: None,
                })
                .await?;
        }

        if superseded > 0 {
            info!(superseded, "revoked pending enrollment tokens");
        }
        info!(token = %token.id, expires_at = %token.expires_at, "enrollment token issued");

        Ok(IssuedEnrollment {
            token_id: token.id,
            url: format!("{}?token={}", self.config.enrollment_base_url, raw_token),
            raw_token,
            expires_at: token.expires_at,
            superseded,
        })
    }

    async fn lookup(&self, raw_token: &str) -> Result<EnrollmentToken, GateError> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(GateError::ValidationRequired("enrollment token"));
        }
        self.store
            .get_enrollment_token_by_hash(&hash_token(raw_token))
            .await
            .map_err(|e| {
                if matches!(e, StoreError::NotFound) {
                    warn!("unknown enrollment token");
                }
                e.into()
            })
    }
}

fn check_usable(token: &EnrollmentToken, now: DateTime<Utc>) -> Result<(), GateError> {
    match token.status {
        EnrollmentTokenStatus::Consumed => Err(GateError::TokenAlreadyUsed),
        EnrollmentTokenStatus::Revoked => Err(GateError::TokenRevoked),
        EnrollmentTokenStatus::Expired => Err(GateError::TokenExpired),
        EnrollmentTokenStatus::Pending if now > token.expires_at => Err(GateError::TokenExpired),
        EnrollmentTokenStatus::Pending => Ok(()),
    }
}
