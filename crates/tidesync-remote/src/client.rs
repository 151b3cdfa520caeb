//! Record store HTTP client
//!
//! Thin wrapper over `reqwest::Client` that builds endpoint URLs from
//! entity keys and classifies failures into [`RemoteError`]s.
//!
//! ## Classification
//!
//! | failure                                  | result        |
//! |------------------------------------------|---------------|
//! | connect error, timeout, broken body      | `Unavailable` |
//! | 429 Too Many Requests, 503 Unavailable   | `Unavailable` |
//! | any other non-success status             | `Rejected`    |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tidesync_remote::client::RecordClient;
//!
//! # fn example() -> anyhow::Result<()> {
//! let client = RecordClient::new("http://127.0.0.1:8080", Duration::from_secs(30))?;
//! let url = client.health_url();
//! assert_eq!(url.as_str(), "http://127.0.0.1:8080/health");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use tidesync_core::domain::EntityKey;
use tidesync_core::ports::{RemoteError, RemoteResult};

/// Longest response body excerpt kept in an error message
const MAX_ERROR_BODY: usize = 256;

/// HTTP client for the record store API
#[derive(Debug, Clone)]
pub struct RecordClient {
    client: Client,
    base_url: Url,
}

impl RecordClient {
    /// Creates a client for `base_url` with a per-request `timeout`
    ///
    /// # Errors
    ///
    /// Fails if the URL does not parse or cannot carry a path.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid remote base URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("Remote base URL cannot carry a path: {base_url}");
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        debug!(base_url = %base_url, timeout_secs = timeout.as_secs(), "Record client created");
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/records/{entity}`; each `/`-separated part of the key is
    /// its own percent-encoded path segment
    pub fn record_url(&self, entity: &EntityKey) -> Url {
        let mut segments = vec!["records"];
        segments.extend(entity.as_str().split('/'));
        self.url_for(&segments)
    }

    /// `{base}/collections/{collection}/bulk`
    pub fn bulk_url(&self, collection: &EntityKey) -> Url {
        let mut segments = vec!["collections"];
        segments.extend(collection.as_str().split('/'));
        segments.push("bulk");
        self.url_for(&segments)
    }

    /// `{base}/health`
    pub fn health_url(&self) -> Url {
        self.url_for(&["health"])
    }

    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Creates a request builder for `method` and `url`
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Sends a request; transport failures become `Unavailable`
    ///
    /// The response is returned whatever its status.
    pub async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        request.send().await.map_err(|e| classify_transport(&e))
    }
}

/// Maps a transport-level failure
pub fn classify_transport(err: &reqwest::Error) -> RemoteError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else {
        "transport"
    };
    debug!(kind, error = %err, "Remote transport failure");
    RemoteError::unavailable(format!("{kind} error: {err}"))
}

/// Maps a non-success status and its body excerpt
pub fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let message = excerpt(body, status);
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            RemoteError::unavailable(format!("{}: {}", status.as_u16(), message))
        }
        _ => RemoteError::rejected(status.as_u16(), message),
    }
}

/// Consumes a non-success response into its classified error
pub async fn error_from_response(response: Response) -> RemoteError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        if let Some(retry_after) = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
        {
            warn!(retry_after, "Remote is throttling requests");
        }
    }
    let body = response.text().await.unwrap_or_default();
    classify_status(status, &body)
}

fn excerpt(body: &str, status: StatusCode) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string();
    }
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
