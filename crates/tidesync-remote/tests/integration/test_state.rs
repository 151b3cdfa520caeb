//! Current-state lookups and health probing

use chrono::{TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use tidesync_core::ports::{IRemoteStore, RemoteError};
use tidesync_remote::MODIFIED_AT_HEADER;

use crate::common::{key, mount_health, mount_status, setup_remote_mock};

#[tokio::test]
async fn test_current_state_reads_body_and_marker() {
    let (server, store) = setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/records/notes/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(MODIFIED_AT_HEADER, "2026-03-01T12:30:00Z")
                .set_body_bytes(b"{\"title\":\"remote\"}".to_vec()),
        )
        .mount(&server)
        .await;

    let record = store
        .get_current_state(&key("notes/1"))
        .await
        .unwrap()
        .expect("record exists");

    assert_eq!(record.entity, key("notes/1"));
    assert_eq!(record.data, b"{\"title\":\"remote\"}");
    assert_eq!(
        record.modified_at,
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn test_current_state_of_missing_entity_is_none() {
    let (server, store) = setup_remote_mock().await;
    mount_status(&server, "GET", "/records/notes/none", 404).await;

    assert!(store
        .get_current_state(&key("notes/none"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_current_state_without_marker_is_rejected() {
    let (server, store) = setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/records/notes/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let err = store.get_current_state(&key("notes/1")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Rejected { status: 200, .. }));
}

#[tokio::test]
async fn test_current_state_outage_is_unavailable() {
    let (server, store) = setup_remote_mock().await;
    mount_status(&server, "GET", "/records/notes/1", 503).await;

    assert!(store
        .get_current_state(&key("notes/1"))
        .await
        .unwrap_err()
        .is_unavailable());
}

#[tokio::test]
async fn test_health_probe() {
    let (server, store) = setup_remote_mock().await;
    assert!(!store.is_reachable().await, "no health route mounted yet");

    mount_health(&server, 200).await;
    assert!(store.is_reachable().await);
}

#[tokio::test]
async fn test_health_probe_unreachable_server() {
    let (server, store) = setup_remote_mock().await;
    drop(server);

    assert!(!store.is_reachable().await);
}
