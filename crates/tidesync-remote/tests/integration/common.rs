//! Shared test helpers for remote store integration tests

#![allow(dead_code)]

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tidesync_core::domain::EntityKey;
use tidesync_remote::{HttpRemoteStore, RecordClient};

/// Starts a mock server and returns a store pointing at it
pub async fn setup_remote_mock() -> (MockServer, HttpRemoteStore) {
    let server = MockServer::start().await;
    let client = RecordClient::new(&server.uri(), Duration::from_secs(5))
        .expect("mock server URI is valid");
    (server, HttpRemoteStore::from_client(client))
}

/// Mounts `GET /health` answering `status`
pub async fn mount_health(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Mounts one response for `verb` on `route`
pub async fn mount_status(server: &MockServer, verb: &str, route: &str, status: u16) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub fn key(entity: &str) -> EntityKey {
    EntityKey::new(entity).unwrap()
}
