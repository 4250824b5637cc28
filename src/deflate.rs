//! Pluggable compression, decompression, and checksum backends.
//!
//! The pipeline depends only on the [`Compressor`], [`Decompressor`], and
//! [`Checksum`] traits, never on a concrete algorithm. The default
//! implementations wrap flate2's raw deflate codec and crc32fast, which is
//! what the wire format calls for; the traits exist so tests and alternative
//! backends (e.g. zlib-ng, libdeflate) can slot in without touching the
//! pipeline.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{BgzfError, Result};

/// Compression level for block encoding (0 = stored, 9 = best).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// Create a level, validating the 0..=9 range.
    pub fn new(level: u32) -> Result<Self> {
        if level > 9 {
            return Err(BgzfError::Pipeline(format!(
                "compression level {} out of range 0..=9",
                level
            )));
        }
        Ok(CompressionLevel(level))
    }

    /// Fastest compression (level 1).
    pub fn fast() -> Self {
        CompressionLevel(1)
    }

    /// Best compression (level 9).
    pub fn best() -> Self {
        CompressionLevel(9)
    }

    /// The numeric level.
    pub fn level(self) -> u32 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel(6)
    }
}

impl From<CompressionLevel> for Compression {
    fn from(level: CompressionLevel) -> Self {
        Compression::new(level.0)
    }
}

/// Checksum over uncompressed payload bytes.
pub trait Checksum: Send + Sync {
    /// Compute the checksum of `data`.
    fn checksum(&self, data: &[u8]) -> u32;
}

/// Opaque block compressor.
pub trait Compressor: Send + Sync {
    /// Compress `data` at the given level.
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;
}

/// Opaque block decompressor.
pub trait Decompressor: Send + Sync {
    /// Decompress `data`, failing if the output would exceed `max_len` bytes
    /// or the input is corrupt.
    fn decompress(&self, data: &[u8], max_len: usize) -> Result<Vec<u8>>;
}

/// CRC32 checksum via crc32fast.
#[derive(Debug, Default, Clone, Copy)]
pub struct Crc32;

impl Checksum for Crc32 {
    fn checksum(&self, data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}

/// Raw deflate compressor via flate2.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), level.into());
        encoder
            .write_all(data)
            .map_err(|e| BgzfError::Deflate(e.to_string()))?;
        encoder.finish().map_err(|e| BgzfError::Deflate(e.to_string()))
    }
}

/// Raw deflate decompressor via flate2.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeflateDecompressor;

impl Decompressor for DeflateDecompressor {
    fn decompress(&self, data: &[u8], max_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(max_len);
        // Read one byte past the cap so overruns are detected rather than
        // silently clipped.
        let mut decoder = DeflateDecoder::new(data).take(max_len as u64 + 1);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| BgzfError::Deflate(e.to_string()))?;
        if out.len() > max_len {
            return Err(BgzfError::Deflate(format!(
                "payload inflated past the declared {} bytes",
                max_len
            )));
        }
        Ok(out)
    }
}
