//! zlib compression codec
//!
//! ## Contract
//!
//! - `decompress(compress(x)) == x` for every payload, including empty.
//! - An empty payload compresses to an empty payload (no zlib framing).
//! - A disabled codec is the identity in both directions and reports a
//!   compression ratio of 0.
//! - Decompression stops with [`CodecError::TooLarge`] once the output
//!   passes the codec's ceiling.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::{debug, trace};

use tidesync_core::config::CompressionConfig;

use crate::error::CodecError;

/// Outcome of a single compression call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionStats {
    pub original_size: usize,
    pub compressed_size: usize,
    /// `1 - compressed / original`; 0 when the original is empty
    pub compression_ratio: f64,
    pub elapsed: Duration,
}

impl CompressionStats {
    fn new(original_size: usize, compressed_size: usize, elapsed: Duration) -> Self {
        let compression_ratio = if original_size == 0 {
            0.0
        } else {
            1.0 - (compressed_size as f64 / original_size as f64)
        };
        Self {
            original_size,
            compressed_size,
            compression_ratio,
            elapsed,
        }
    }

    /// Returns true if compression actually shrank the payload
    pub fn is_beneficial(&self) -> bool {
        self.compressed_size < self.original_size
    }
}

/// Time-bounded zlib codec
#[derive(Debug, Clone)]
pub struct CompressionCodec {
    enabled: bool,
    level: u32,
    timeout: Duration,
    max_output: usize,
}

impl CompressionCodec {
    /// Builds a codec with the default decompression ceiling
    pub fn new(enabled: bool, level: u32, timeout: Duration) -> Self {
        Self {
            enabled,
            level: level.min(9),
            timeout,
            max_output: CompressionConfig::default().max_decompressed_bytes,
        }
    }

    pub fn from_config(config: &CompressionConfig) -> Self {
        Self::new(config.enabled, config.level, config.timeout())
            .with_max_output(config.max_decompressed_bytes)
    }

    /// Sets the largest payload `decompress` will produce
    pub fn with_max_output(self, max_output: usize) -> Self {
        Self { max_output, ..self }
    }

    pub fn max_output(&self) -> usize {
        self.max_output
    }

    /// Returns a copy of this codec with the enabled flag overridden
    ///
    /// Items compressed before compression was switched off still need a
    /// working decoder.
    pub fn with_enabled(&self, enabled: bool) -> Self {
        Self {
            enabled,
            ..self.clone()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Compresses `payload`, returning the compressed bytes and statistics
    pub async fn compress(&self, payload: Vec<u8>) -> Result<(Vec<u8>, CompressionStats), CodecError> {
        let started = Instant::now();
        let original_size = payload.len();

        if !self.enabled || payload.is_empty() {
            let mut stats = CompressionStats::new(original_size, original_size, started.elapsed());
            stats.compression_ratio = 0.0;
            return Ok((payload, stats));
        }

        let level = Compression::new(self.level);
        let compressed = self
            .run_blocking(move || {
                let mut encoder = ZlibEncoder::new(Vec::with_capacity(payload.len() / 2), level);
                encoder.write_all(&payload)?;
                encoder.finish()
            })
            .await?;

        let stats = CompressionStats::new(original_size, compressed.len(), started.elapsed());
        debug!(
            original_size,
            compressed_size = stats.compressed_size,
            ratio = stats.compression_ratio,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Payload compressed"
        );
        Ok((compressed, stats))
    }

    /// Restores a payload produced by [`CompressionCodec::compress`]
    pub async fn decompress(&self, compressed: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        if !self.enabled || compressed.is_empty() {
            return Ok(compressed);
        }

        let compressed_size = compressed.len();
        let limit = self.max_output;
        let payload = self
            .run_blocking(move || {
                // One byte past the limit tells an exact fit from an overflow
                let cap = (limit as u64).saturating_add(1);
                let mut decoder = ZlibDecoder::new(compressed.as_slice()).take(cap);
                let mut out = Vec::with_capacity((compressed.len() * 2).min(limit));
                decoder.read_to_end(&mut out)?;
                Ok(out)
            })
            .await?;
        if payload.len() > limit {
            return Err(CodecError::TooLarge { limit });
        }

        trace!(compressed_size, size = payload.len(), "Payload decompressed");
        Ok(payload)
    }

    async fn run_blocking<F>(&self, work: F) -> Result<Vec<u8>, CodecError>
    where
        F: FnOnce() -> std::io::Result<Vec<u8>> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(work);
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join_err)) => Err(CodecError::Join(join_err.to_string())),
            Err(_) => Err(CodecError::Timeout(self.timeout)),
        }
    }
}

impl Default for CompressionCodec {
    fn default() -> Self {
        Self::from_config(&CompressionConfig::default())
    }
}
