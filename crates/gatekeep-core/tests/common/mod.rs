//! Shared fixtures: a fresh in-memory database per test, seeded with one
//! organization and one pre-registered checkpoint operator.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use gatekeep_core::{access_code_hash, Checkpoint, GateConfig, Gatekeeper, QrPayload, SignedQr};
use gatekeep_crypto::KeyEncryptionKey;
use gatekeep_storage::{
    AccessCode, CreateAccessCodeParams, CreateAuthorizationParams, CreateOrganizationParams,
    CreateUserParams, CreateVisitRequestParams, Organization, Store, User, UserStatus,
    VisitorAuthorization,
};
use gatekeep_store_sqlite::SqliteStore;

pub struct TestHarness {
    pub store: Arc<SqliteStore>,
    pub gate: Gatekeeper,
    pub org: Organization,
    pub operator: User,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut GateConfig)) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let mut config = GateConfig::new(KeyEncryptionKey::generate());
        tweak(&mut config);
        let gate = Gatekeeper::new(store.clone(), config);

        let org = store
            .create_organization(&CreateOrganizationParams {
                name: "Riverside Towers".to_string(),
            })
            .await
            .unwrap();
        let operator = store
            .create_user(&CreateUserParams {
                organization_id: org.id,
                display_name: "Night porter".to_string(),
                status: UserStatus::PreRegistered,
            })
            .await
            .unwrap();

        Self {
            store,
            gate,
            org,
            operator,
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            operator_id: self.operator.id,
            device_id: "gate-1".to_string(),
            location: Some("North gate".to_string()),
        }
    }

    /// Issue a code for a visit allowing `max_entries`, valid around now.
    pub async fn access_code(&self, raw: &str, max_entries: i32) -> AccessCode {
        self.access_code_between(
            raw,
            max_entries,
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::hours(1),
        )
        .await
    }

    pub async fn access_code_between(
        &self,
        raw: &str,
        max_entries: i32,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> AccessCode {
        let visit = self
            .store
            .create_visit_request(&CreateVisitRequestParams {
                organization_id: self.org.id,
                max_entries,
            })
            .await
            .unwrap();
        self.store
            .create_access_code(&CreateAccessCodeParams {
                organization_id: self.org.id,
                visit_request_id: visit.id,
                code_hash: access_code_hash(raw),
                valid_from,
                valid_until,
            })
            .await
            .unwrap()
    }

    pub async fn authorization(
        &self,
        document: &str,
        hours_from: i64,
        hours_to: i64,
    ) -> VisitorAuthorization {
        self.store
            .create_authorization(&CreateAuthorizationParams {
                organization_id: self.org.id,
                valid_from: Utc::now() + Duration::hours(hours_from),
                valid_to: Utc::now() + Duration::hours(hours_to),
                person_name: "Ana Souza".to_string(),
                person_document: document.to_string(),
                vehicle_plate: Some("ABC1D23".to_string()),
                vehicle_model: None,
                vehicle_color: None,
            })
            .await
            .unwrap()
    }

    /// Sign the authorization with the organization's key, creating it if needed.
    pub async fn signed_qr(&self, auth: &VisitorAuthorization) -> String {
        self.gate.keys.get_or_create(&self.org.id).await.unwrap();
        let signer = self.gate.keys.signer_for(&self.org.id).await.unwrap();
        SignedQr::encode(&QrPayload::for_authorization(auth), &signer).unwrap()
    }
}
