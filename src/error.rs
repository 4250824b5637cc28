//! Error types for parbgzf

use thiserror::Error;

/// Result type alias for parbgzf operations
pub type Result<T> = std::result::Result<T, BgzfError>;

/// Error types that can occur while encoding or decoding BGZF streams
#[derive(Debug, Error)]
pub enum BgzfError {
    /// I/O error from the underlying source or sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed block header, extra field, or declared size
    #[error("invalid BGZF block at offset {offset}: {msg}")]
    Format {
        /// Compressed byte offset of the offending block
        offset: u64,
        /// Error message
        msg: String,
    },

    /// Footer CRC32 disagrees with the recomputed checksum of the payload
    #[error("checksum mismatch at offset {offset}: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        /// Compressed byte offset of the bad block
        offset: u64,
        /// CRC32 stored in the block footer
        expected: u32,
        /// CRC32 recomputed from the decompressed payload
        actual: u32,
    },

    /// Input ended mid-block, or without the end-of-stream marker when one
    /// was required
    #[error("truncated BGZF stream at offset {offset}")]
    TruncatedStream {
        /// Compressed byte offset where the stream ended
        offset: u64,
    },

    /// DEFLATE compression or decompression failure (corrupt payload)
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Random-access seek failure: index miss or non-seekable source
    #[error("seek error: {0}")]
    Seek(String),

    /// A payload larger than the per-block maximum was presented for
    /// single-block compression. Callers must chunk their input.
    #[error("payload of {len} bytes exceeds per-block maximum of {max}")]
    CapacityExceeded {
        /// Length of the rejected payload
        len: usize,
        /// Maximum uncompressed bytes per block
        max: usize,
    },

    /// Internal pipeline contract violation
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// The worker pool has shut down and can no longer accept operations
    #[error("worker pool has shut down")]
    Shutdown,
}

impl From<BgzfError> for std::io::Error {
    fn from(err: BgzfError) -> Self {
        match err {
            BgzfError::Io(e) => e,
            BgzfError::TruncatedStream { .. } => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err)
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
