//! The parallel block pipeline: operations, worker pool, and sequencer.
//!
//! Stages communicate by moving [`Operation`] records through bounded
//! channels. The worker pool executes compress/decompress stages in any
//! order; the [`Sequencer`] restores strict stream order at the boundary.

pub mod op;
pub mod pool;
pub mod sequencer;

pub use op::{CompletedOp, OpKind, Operation};
pub use pool::WorkerPool;
pub use sequencer::Sequencer;

use std::sync::Arc;

use crate::deflate::{
    Checksum, CompressionLevel, Compressor, Crc32, Decompressor, DeflateCompressor,
    DeflateDecompressor,
};

/// Tunables for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of worker threads executing compress/decompress operations.
    pub worker_threads: usize,
    /// Bound on the ready-queue and on operations in flight. Backpressure:
    /// producers block once this many operations are outstanding.
    pub queue_capacity: usize,
    /// Deflate level for block encoding.
    pub compression_level: CompressionLevel,
    /// Whether the writer appends the end-of-stream marker on finish.
    pub write_eof_marker: bool,
    /// Whether a missing end-of-stream marker is a hard decode error rather
    /// than a tolerated status.
    pub require_eof_marker: bool,
    /// Record an index entry roughly every this-many uncompressed bytes
    /// while writing. `None` disables index building.
    pub index_granularity: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        PipelineConfig {
            worker_threads: threads,
            queue_capacity: threads * 2,
            compression_level: CompressionLevel::default(),
            write_eof_marker: true,
            require_eof_marker: false,
            index_granularity: None,
        }
    }
}

impl PipelineConfig {
    /// Set the worker thread count.
    pub fn worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n.max(1);
        self
    }

    /// Set the ready-queue / in-flight bound.
    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n.max(1);
        self
    }

    /// Set the compression level.
    pub fn compression_level(mut self, level: CompressionLevel) -> Self {
        self.compression_level = level;
        self
    }

    /// Control end-of-stream marker emission on write.
    pub fn write_eof_marker(mut self, yes: bool) -> Self {
        self.write_eof_marker = yes;
        self
    }

    /// Treat a missing end-of-stream marker as a hard error on read.
    pub fn require_eof_marker(mut self, yes: bool) -> Self {
        self.require_eof_marker = yes;
        self
    }

    /// Record index entries at roughly this uncompressed-byte granularity.
    pub fn index_granularity(mut self, granularity: Option<u64>) -> Self {
        self.index_granularity = granularity;
        self
    }
}

/// The compression, decompression, and checksum backends the pipeline runs.
#[derive(Clone)]
pub struct Codecs {
    /// Block compressor.
    pub compressor: Arc<dyn Compressor>,
    /// Block decompressor.
    pub decompressor: Arc<dyn Decompressor>,
    /// Payload checksum.
    pub checksum: Arc<dyn Checksum>,
}

impl Default for Codecs {
    fn default() -> Self {
        Codecs {
            compressor: Arc::new(DeflateCompressor),
            decompressor: Arc::new(DeflateDecompressor),
            checksum: Arc::new(Crc32),
        }
    }
}

impl std::fmt::Debug for Codecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codecs").finish_non_exhaustive()
    }
}
