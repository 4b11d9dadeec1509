//! Entry by document number and vehicle exits.

mod common;

use common::TestHarness;
use gatekeep_core::GateError;
use gatekeep_storage::{AccessAction, ScanResult, Store};

#[tokio::test]
async fn test_active_authorization_in_window_admits() {
    let h = TestHarness::new().await;
    // An older, closed authorization must not shadow the current one.
    h.authorization("123.456.789-00", -48, -24).await;
    let current = h.authorization("123.456.789-00", -1, 4).await;

    let event = h
        .gate
        .documents
        .validate_document(&h.org.id, " 123.456.789-00 ", &h.checkpoint(), AccessAction::Entry)
        .await
        .unwrap();
    assert_eq!(event.scan_result, ScanResult::Valid);
    assert_eq!(event.authorization_id, Some(current.id));
    assert_eq!(event.person_name.as_deref(), Some("Ana Souza"));
}

#[tokio::test]
async fn test_all_revoked_is_revoked_otherwise_expired() {
    let h = TestHarness::new().await;
    let only = h.authorization("555", -1, 4).await;
    h.store.revoke_authorization(&only.id).await.unwrap();

    let event = h
        .gate
        .documents
        .validate_document(&h.org.id, "555", &h.checkpoint(), AccessAction::Entry)
        .await
        .unwrap();
    assert_eq!(event.scan_result, ScanResult::Revoked);

    // A second, merely out-of-window authorization turns the answer into EXPIRED.
    h.authorization("555", 24, 48).await;
    let event = h
        .gate
        .documents
        .validate_document(&h.org.id, "555", &h.checkpoint(), AccessAction::Entry)
        .await
        .unwrap();
    assert_eq!(event.scan_result, ScanResult::Expired);
}

#[tokio::test]
async fn test_unknown_document_is_recorded_then_not_found() {
    let h = TestHarness::new().await;

    let err = h
        .gate
        .documents
        .validate_document(&h.org.id, "000", &h.checkpoint(), AccessAction::Entry)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::NotFound));

    let events = h.store.list_access_events(&h.org.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].scan_result, ScanResult::Invalid);
    assert_eq!(events[0].person_document.as_deref(), Some("000"));
}

#[tokio::test]
async fn test_blank_inputs_are_rejected_without_events() {
    let h = TestHarness::new().await;

    let err = h
        .gate
        .documents
        .validate_document(&h.org.id, "   ", &h.checkpoint(), AccessAction::Entry)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::ValidationRequired("document")));

    let err = h
        .gate
        .documents
        .register_vehicle_exit(&h.org.id, "", &h.checkpoint())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_REQUIRED");

    assert!(h.store.list_access_events(&h.org.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vehicle_exit_is_logged() {
    let h = TestHarness::new().await;

    let event = h
        .gate
        .documents
        .register_vehicle_exit(&h.org.id, "abc1d23", &h.checkpoint())
        .await
        .unwrap();
    assert_eq!(event.action, AccessAction::Exit);
    assert_eq!(event.scan_result, ScanResult::Valid);
    assert_eq!(event.vehicle_plate.as_deref(), Some("ABC1D23"));
    assert_eq!(event.device_id, "gate-1");
}
