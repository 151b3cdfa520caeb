//! TideSync Remote - HTTP remote store adapter
//!
//! Provides async client for:
//! - Record mutations (`POST`/`PUT`/`DELETE /records/{entity}`)
//! - Collection bulk inserts (`POST /collections/{collection}/bulk`)
//! - Current-state lookups used by conflict detection
//! - A health probe used by the connectivity monitor
//!
//! ## Modules
//!
//! - [`client`] - HTTP client, URL construction and response classification
//! - [`store`] - `IRemoteStore` implementation over the client

pub mod client;
pub mod store;

pub use client::RecordClient;
pub use store::HttpRemoteStore;

/// Header carrying the remote modification marker (RFC 3339)
pub const MODIFIED_AT_HEADER: &str = "X-Modified-At";
