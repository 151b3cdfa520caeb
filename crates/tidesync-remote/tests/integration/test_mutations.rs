//! Mutation requests and failure classification

use std::time::Duration;

use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use tidesync_core::ports::{IRemoteStore, RemoteError};
use tidesync_remote::{HttpRemoteStore, RecordClient};

use crate::common::{key, mount_status, setup_remote_mock};

#[tokio::test]
async fn test_create_posts_raw_payload() {
    let (server, store) = setup_remote_mock().await;

    Mock::given(method("POST"))
        .and(path("/records/notes/1"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(b"{\"title\":\"a\"}".to_vec()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    store
        .create(&key("notes/1"), b"{\"title\":\"a\"}")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_puts_patch() {
    let (server, store) = setup_remote_mock().await;

    Mock::given(method("PUT"))
        .and(path("/records/notes/1"))
        .and(body_bytes(b"patch".to_vec()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store.update(&key("notes/1"), b"patch").await.unwrap();
}

#[tokio::test]
async fn test_delete_of_missing_entity_succeeds() {
    let (server, store) = setup_remote_mock().await;
    mount_status(&server, "DELETE", "/records/notes/gone", 404).await;

    assert!(store.delete(&key("notes/gone")).await.is_ok());
}

#[tokio::test]
async fn test_bulk_insert_targets_collection_endpoint() {
    let (server, store) = setup_remote_mock().await;

    Mock::given(method("POST"))
        .and(path("/collections/contacts/bulk"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    store
        .bulk_insert(&key("contacts"), b"[{\"n\":1},{\"n\":2}]")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejection_carries_status_and_body() {
    let (server, store) = setup_remote_mock().await;

    Mock::given(method("POST"))
        .and(path("/records/notes/1"))
        .respond_with(ResponseTemplate::new(409).set_body_string("version mismatch"))
        .mount(&server)
        .await;

    let err = store.create(&key("notes/1"), b"x").await.unwrap_err();
    assert_eq!(err, RemoteError::rejected(409, "version mismatch"));
}

#[tokio::test]
async fn test_server_error_is_a_rejection() {
    let (server, store) = setup_remote_mock().await;
    mount_status(&server, "PUT", "/records/notes/1", 500).await;

    let err = store.update(&key("notes/1"), b"x").await.unwrap_err();
    assert!(matches!(err, RemoteError::Rejected { status: 500, .. }));
}

#[tokio::test]
async fn test_throttling_is_unavailable() {
    let (server, store) = setup_remote_mock().await;

    Mock::given(method("POST"))
        .and(path("/records/notes/1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let err = store.create(&key("notes/1"), b"x").await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_service_unavailable_is_unavailable() {
    let (server, store) = setup_remote_mock().await;
    mount_status(&server, "DELETE", "/records/notes/1", 503).await;

    assert!(store.delete(&key("notes/1")).await.unwrap_err().is_unavailable());
}

#[tokio::test]
async fn test_timeout_is_unavailable() {
    let (server, _) = setup_remote_mock().await;

    Mock::given(method("POST"))
        .and(path("/records/notes/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = RecordClient::new(&server.uri(), Duration::from_millis(200)).unwrap();
    let store = HttpRemoteStore::from_client(client);

    let err = store.create(&key("notes/slow"), b"x").await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    let (server, store) = setup_remote_mock().await;
    drop(server);

    let err = store.create(&key("notes/1"), b"x").await.unwrap_err();
    assert!(err.is_unavailable());
}
