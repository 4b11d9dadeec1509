use std::sync::Arc;

use chrono::{Duration, Utc};
use gatekeep_storage::{
    AccessAction, AccessCodeStatus, CreateAccessCodeParams, CreateAuthorizationParams,
    CreateCryptoKeyParams, CreateEnrollmentAuditParams, CreateEnrollmentTokenParams,
    CreateOrganizationParams, CreateScanLogParams, CreateUserParams, CreateVisitRequestParams,
    EnrollmentAuditAction, EnrollmentTokenStatus, NewAccessEvent, Organization, ScanResult, Store,
    StoreError, User, UserId, UserStatus,
};
use gatekeep_store_sqlite::SqliteStore;

async fn seed(s: &SqliteStore) -> (Organization, User) {
    let org = s
        .create_organization(&CreateOrganizationParams {
            name: "Riverside Towers".to_string(),
        })
        .await
        .unwrap();
    let user = s
        .create_user(&CreateUserParams {
            organization_id: org.id,
            display_name: "Night porter".to_string(),
            status: UserStatus::PreRegistered,
        })
        .await
        .unwrap();
    (org, user)
}

fn key_params(org: &Organization, key_id: &str) -> CreateCryptoKeyParams {
    CreateCryptoKeyParams {
        organization_id: org.id,
        key_id: key_id.to_string(),
        algorithm: "Ed25519".to_string(),
        public_jwk: format!(r#"{{"kty":"OKP","crv":"Ed25519","x":"{key_id}"}}"#),
        private_key_nonce: vec![1u8; 24],
        private_key_ciphertext: vec![2u8; 48],
    }
}

fn event(org: &Organization, operator: UserId, client_id: Option<&str>) -> NewAccessEvent {
    NewAccessEvent {
        organization_id: org.id,
        authorization_id: None,
        action: AccessAction::Entry,
        scan_result: ScanResult::Valid,
        person_name: Some("Ana".to_string()),
        person_document: Some("123".to_string()),
        vehicle_plate: None,
        operator_id: operator,
        device_id: "gate-1".to_string(),
        offline_validated: true,
        note: None,
        client_event_id: client_id.map(str::to_string),
        created_at: Utc::now() - Duration::minutes(30),
        synced_at: Some(Utc::now()),
    }
}

#[tokio::test]
async fn entry_counter_is_compare_and_swap() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let (org, _) = seed(&s).await;
    let visit = s
        .create_visit_request(&CreateVisitRequestParams {
            organization_id: org.id,
            max_entries: 2,
        })
        .await
        .unwrap();
    let code = s
        .create_access_code(&CreateAccessCodeParams {
            organization_id: org.id,
            visit_request_id: visit.id,
            code_hash: "abc".to_string(),
            valid_from: Utc::now() - Duration::hours(1),
            valid_until: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();
    assert_eq!(code.status, AccessCodeStatus::Active);
    assert_eq!(code.entries_used, 0);

    let after_first = s.record_code_entry(&code.id, 0, 2, Utc::now()).await.unwrap();
    assert_eq!(after_first.entries_used, 1);
    assert_eq!(after_first.status, AccessCodeStatus::Active);

    // Stale expectation loses.
    assert!(matches!(
        s.record_code_entry(&code.id, 0, 2, Utc::now()).await,
        Err(StoreError::Conflict)
    ));

    let after_second = s.record_code_entry(&code.id, 1, 2, Utc::now()).await.unwrap();
    assert_eq!(after_second.entries_used, 2);
    assert_eq!(after_second.status, AccessCodeStatus::Used);

    // USED codes never count again.
    assert!(matches!(
        s.record_code_entry(&code.id, 2, 2, Utc::now()).await,
        Err(StoreError::Conflict)
    ));

    let by_hash = s.get_access_code_by_hash("abc").await.unwrap();
    assert_eq!(by_hash.id, code.id);
    assert!(matches!(
        s.get_access_code_by_hash("nope").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn duplicate_code_hash_is_rejected() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let (org, _) = seed(&s).await;
    let visit = s
        .create_visit_request(&CreateVisitRequestParams {
            organization_id: org.id,
            max_entries: 1,
        })
        .await
        .unwrap();
    let params = CreateAccessCodeParams {
        organization_id: org.id,
        visit_request_id: visit.id,
        code_hash: "same".to_string(),
        valid_from: Utc::now(),
        valid_until: Utc::now() + Duration::hours(1),
    };
    s.create_access_code(&params).await.unwrap();
    assert!(matches!(
        s.create_access_code(&params).await,
        Err(StoreError::AlreadyExists)
    ));
}

#[tokio::test]
async fn scan_logs_accept_unresolved_codes() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let (_, user) = seed(&s).await;
    let log = s
        .insert_scan_log(&CreateScanLogParams {
            access_code_id: None,
            result: ScanResult::Invalid,
            operator_id: user.id,
            location: Some("North gate".to_string()),
            device: None,
            note: "code not found".to_string(),
        })
        .await
        .unwrap();
    assert!(log.access_code_id.is_none());
    assert_eq!(log.result, ScanResult::Invalid);
    assert_eq!(s.list_scan_logs(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn only_one_active_key_per_organization() {
    let s = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let (org, _) = seed(&s).await;

    let tasks = (0..8).map(|i| {
        let s = s.clone();
        let params = key_params(&org, &format!("kid-{i}"));
        tokio::spawn(async move { s.insert_crypto_key_if_absent(&params).await })
    });
    let results = futures::future::join_all(tasks).await;

    let mut created = 0;
    let mut winners = Vec::new();
    for r in results {
        let (key, was_created) = r.unwrap().unwrap();
        if was_created {
            created += 1;
        }
        winners.push(key.key_id);
    }
    assert_eq!(created, 1);
    winners.dedup();
    assert_eq!(winners.len(), 1);

    let keys = s.list_crypto_keys(&org.id).await.unwrap();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].is_active);
    assert_eq!(keys[0].private_key_nonce, vec![1u8; 24]);
}

#[tokio::test]
async fn revoked_since_filters_on_revocation_time() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let (org, _) = seed(&s).await;

    let mut ids = Vec::new();
    for doc in ["1", "2", "3"] {
        let auth = s
            .create_authorization(&CreateAuthorizationParams {
                organization_id: org.id,
                valid_from: Utc::now(),
                valid_to: Utc::now() + Duration::days(1),
                person_name: format!("visitor {doc}"),
                person_document: doc.to_string(),
                vehicle_plate: None,
                vehicle_model: None,
                vehicle_color: None,
            })
            .await
            .unwrap();
        ids.push(auth.id);
    }

    let before = Utc::now();
    s.revoke_authorization(&ids[0]).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let between = Utc::now();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    s.revoke_authorization(&ids[1]).await.unwrap();

    let first = s.get_authorization(&ids[0]).await.unwrap();
    let stamped = first.revoked_at.unwrap();
    assert!(stamped >= before - Duration::milliseconds(1) && stamped <= between);

    let all = s.list_revoked_authorizations(&org.id, None).await.unwrap();
    assert_eq!(all, vec![ids[0], ids[1]]);

    let since = s
        .list_revoked_authorizations(&org.id, Some(between))
        .await
        .unwrap();
    assert_eq!(since, vec![ids[1]]);

    // Re-revoking keeps the original timestamp.
    s.revoke_authorization(&ids[0]).await.unwrap();
    let again = s.get_authorization(&ids[0]).await.unwrap();
    assert_eq!(again.revoked_at, Some(stamped));
    let since = s
        .list_revoked_authorizations(&org.id, Some(between))
        .await
        .unwrap();
    assert_eq!(since, vec![ids[1]]);

    assert!(matches!(
        s.revoke_authorization(&gatekeep_storage::AuthorizationId::new())
            .await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn event_batch_deduplicates_client_ids() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let (org, user) = seed(&s).await;

    let batch = vec![
        event(&org, user.id, Some("e-1")),
        event(&org, user.id, Some("e-2")),
        event(&org, user.id, None),
    ];
    let first = s.insert_access_events(&batch).await.unwrap();
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|e| e.synced_at.is_some()));

    let replay = s.insert_access_events(&batch).await.unwrap();
    assert_eq!(replay[0].id, first[0].id);
    assert_eq!(replay[1].id, first[1].id);
    assert_ne!(replay[2].id, first[2].id);

    assert_eq!(s.list_access_events(&org.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn enrollment_token_lifecycle() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let (org, user) = seed(&s).await;
    let params = |hash: &str| CreateEnrollmentTokenParams {
        organization_id: org.id,
        user_id: user.id,
        token_hash: hash.to_string(),
        expires_at: Utc::now() + Duration::hours(24),
        created_by: None,
    };

    let (first, revoked) = s.create_enrollment_token(&params("h1")).await.unwrap();
    assert_eq!(revoked, 0);
    assert_eq!(first.status, EnrollmentTokenStatus::Pending);

    let (second, revoked) = s.create_enrollment_token(&params("h2")).await.unwrap();
    assert_eq!(revoked, 1);
    let first = s.get_enrollment_token_by_hash("h1").await.unwrap();
    assert_eq!(first.status, EnrollmentTokenStatus::Revoked);

    let consumed = s
        .consume_enrollment_token(&second.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(consumed.status, EnrollmentTokenStatus::Consumed);
    assert!(consumed.consumed_at.is_some());
    assert!(matches!(
        s.consume_enrollment_token(&second.id, Utc::now()).await,
        Err(StoreError::Conflict)
    ));

    // Expiry only touches PENDING tokens.
    s.expire_enrollment_token(&second.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(
        s.get_enrollment_token_by_hash("h2").await.unwrap().status,
        EnrollmentTokenStatus::Consumed
    );

    assert!(s.activate_user(&user.id, Utc::now()).await.unwrap());
    assert!(!s.activate_user(&user.id, Utc::now()).await.unwrap());
    assert_eq!(s.get_user(&user.id).await.unwrap().status, UserStatus::Active);

    s.insert_enrollment_audit(&CreateEnrollmentAuditParams {
        organization_id: org.id,
        user_id: user.id,
        token_id: Some(second.id),
        action: EnrollmentAuditAction::Consumed,
        actor_id: None,
        ip_address: Some("10.0.0.7".to_string()),
        user_agent: Some("gate-app/1.2".to_string()),
        device_platform: Some("android".to_string()),
        device_model: Some("Pixel 7".to_string()),
        app_version: Some("1.2.0".to_string()),
    })
    .await
    .unwrap();
    let audit = s.list_enrollment_audit(&user.id).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, EnrollmentAuditAction::Consumed);
    assert_eq!(audit[0].device_model.as_deref(), Some("Pixel 7"));
    assert_eq!(s.list_enrollment_tokens(&user.id).await.unwrap().len(), 2);
}
