//! TideSync Codec - Payload compression
//!
//! zlib compression for queued payloads. All work runs on the blocking
//! thread pool and is bounded by a configurable timeout so a pathological
//! payload can never stall the worker loop.

pub mod codec;
pub mod error;

pub use codec::{CompressionCodec, CompressionStats};
pub use error::CodecError;
