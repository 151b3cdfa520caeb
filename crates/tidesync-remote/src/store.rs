//! HTTP implementation of the remote store port
//!
//! | operation           | request                                      |
//! |---------------------|----------------------------------------------|
//! | `create`            | `POST   /records/{entity}`                   |
//! | `update`            | `PUT    /records/{entity}`                   |
//! | `delete`            | `DELETE /records/{entity}` (404 is success)  |
//! | `bulk_insert`       | `POST   /collections/{collection}/bulk`      |
//! | `get_current_state` | `GET    /records/{entity}` (404 is `None`)   |
//! | `is_reachable`      | `GET    /health`                             |
//!
//! Mutation bodies are sent verbatim as `application/octet-stream`. The
//! current-state body is the record content; its modification marker is
//! read from the [`MODIFIED_AT_HEADER`] response header.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use tidesync_core::config::RemoteConfig;
use tidesync_core::domain::EntityKey;
use tidesync_core::ports::{IRemoteStore, RemoteError, RemoteRecord, RemoteResult};

use crate::client::{classify_transport, error_from_response, RecordClient};
use crate::MODIFIED_AT_HEADER;

const OCTET_STREAM: &str = "application/octet-stream";

/// Remote store reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: RecordClient,
}

impl HttpRemoteStore {
    /// Builds a store from the `remote` configuration section
    ///
    /// # Errors
    ///
    /// Fails if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> anyhow::Result<Self> {
        let client = RecordClient::new(&config.base_url, config.timeout())?;
        Ok(Self { client })
    }

    pub fn from_client(client: RecordClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RecordClient {
        &self.client
    }

    /// Sends a mutation and treats any 2xx as applied
    async fn send_mutation(&self, method: Method, url: Url, body: Option<&[u8]>) -> RemoteResult<()> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, OCTET_STREAM)
                .body(body.to_vec());
        }

        let response = self.client.send(request).await?;
        let status = response.status();
        if status.is_success() {
            debug!(%method, %url, status = status.as_u16(), "Mutation applied");
            return Ok(());
        }
        if method == Method::DELETE && status == StatusCode::NOT_FOUND {
            debug!(%url, "Entity already absent, delete treated as applied");
            return Ok(());
        }
        Err(error_from_response(response).await)
    }
}

#[async_trait]
impl IRemoteStore for HttpRemoteStore {
    #[instrument(skip(self, payload), fields(entity = %entity, bytes = payload.len()))]
    async fn create(&self, entity: &EntityKey, payload: &[u8]) -> RemoteResult<()> {
        self.send_mutation(Method::POST, self.client.record_url(entity), Some(payload))
            .await
    }

    #[instrument(skip(self, patch), fields(entity = %entity, bytes = patch.len()))]
    async fn update(&self, entity: &EntityKey, patch: &[u8]) -> RemoteResult<()> {
        self.send_mutation(Method::PUT, self.client.record_url(entity), Some(patch))
            .await
    }

    #[instrument(skip(self), fields(entity = %entity))]
    async fn delete(&self, entity: &EntityKey) -> RemoteResult<()> {
        self.send_mutation(Method::DELETE, self.client.record_url(entity), None)
            .await
    }

    #[instrument(skip(self, records), fields(collection = %collection, bytes = records.len()))]
    async fn bulk_insert(&self, collection: &EntityKey, records: &[u8]) -> RemoteResult<()> {
        self.send_mutation(Method::POST, self.client.bulk_url(collection), Some(records))
            .await
    }

    #[instrument(skip(self), fields(entity = %entity))]
    async fn get_current_state(&self, entity: &EntityKey) -> RemoteResult<Option<RemoteRecord>> {
        let request = self
            .client
            .request(Method::GET, self.client.record_url(entity));
        let response = self.client.send(request).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!("Entity absent on remote");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let modified_at = response
            .headers()
            .get(MODIFIED_AT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let Some(modified_at) = modified_at else {
            warn!(status = status.as_u16(), "Current state lacks a valid modification marker");
            return Err(RemoteError::rejected(
                status.as_u16(),
                format!("missing or invalid {MODIFIED_AT_HEADER} header"),
            ));
        };

        let data = response
            .bytes()
            .await
            .map_err(|e| classify_transport(&e))?
            .to_vec();

        Ok(Some(RemoteRecord {
            entity: entity.clone(),
            data,
            modified_at,
        }))
    }

    async fn is_reachable(&self) -> bool {
        let request = self
            .client
            .request(Method::GET, self.client.health_url());
        match self.client.send(request).await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Health probe failed");
                false
            }
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                false
            }
        }
    }
}
