//! # parbgzf
//!
//! Parallel BGZF compression and decompression for randomly seekable
//! compressed streams.
//!
//! BGZF wraps deflate in a series of independent blocks of at most 64 KiB,
//! each carrying its own size, CRC32, and uncompressed length. Because
//! every block decodes on its own, blocks can be compressed and
//! decompressed concurrently, and any position in the uncompressed data
//! can be addressed by a [`VirtualOffset`] without touching earlier bytes.
//!
//! ## Quick start
//!
//! ```no_run
//! use parbgzf::{BgzfReader, BgzfWriter};
//! use std::io::{Read, Write};
//!
//! # fn main() -> parbgzf::Result<()> {
//! let mut writer = BgzfWriter::from_path("data.bgz")?;
//! writer.write_all(b"records go here")?;
//! writer.finish()?;
//!
//! let mut reader = BgzfReader::from_path("data.bgz")?;
//! let mut data = Vec::new();
//! reader.read_to_end(&mut data)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The streaming types run a three-stage pipeline: a serial boundary stage
//! splits or gathers blocks in stream order, a [`pipeline::WorkerPool`]
//! transforms blocks in any order, and a [`pipeline::Sequencer`] restores
//! stream order at the far boundary. Output is byte-identical for any
//! worker count. [`buffer`] offers a whole-buffer alternative over rayon.

#![warn(missing_docs)]

pub mod block;
pub mod buffer;
pub mod deflate;
pub mod error;
pub mod index;
pub mod offset;
pub mod pipeline;
pub mod reader;
pub mod writer;

pub use block::{DEFAULT_CHUNK_SIZE, EOF_BLOCK, MAX_BLOCK_SIZE, MAX_PAYLOAD};
pub use buffer::{compress_parallel, decompress_parallel};
pub use deflate::CompressionLevel;
pub use error::{BgzfError, Result};
pub use index::OffsetIndex;
pub use offset::VirtualOffset;
pub use pipeline::PipelineConfig;
pub use reader::{BgzfReader, EofStatus};
pub use writer::BgzfWriter;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
