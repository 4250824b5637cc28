//! Streaming BGZF encoder with parallel block compression.
//!
//! Incoming bytes accumulate into fixed-size chunks, each chunk becomes one
//! compress operation on the worker pool, and the sequencer restores input
//! order before encoded blocks are appended to the sink. The compressed
//! output is therefore byte-identical for any worker count.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::block::{DEFAULT_CHUNK_SIZE, EOF_BLOCK};
use crate::error::{BgzfError, Result};
use crate::index::OffsetIndex;
use crate::offset::VirtualOffset;
use crate::pipeline::{Codecs, CompletedOp, Operation, PipelineConfig, Sequencer, WorkerPool};

/// Streaming writer producing a BGZF-compressed byte stream.
///
/// Data written through [`Write`] is split into chunks of at most
/// [`DEFAULT_CHUNK_SIZE`] bytes, compressed concurrently, and emitted as
/// complete blocks in input order. [`finish`](BgzfWriter::finish) appends
/// the end-of-stream marker; dropping the writer finishes it on a best
/// effort basis, so call `finish` explicitly to observe errors.
///
/// # Example
///
/// ```no_run
/// use parbgzf::BgzfWriter;
/// use std::io::Write;
///
/// # fn main() -> parbgzf::Result<()> {
/// let mut writer = BgzfWriter::from_path("records.bgz")?;
/// writer.write_all(b"some record data")?;
/// writer.finish()?;
/// # Ok(())
/// # }
/// ```
pub struct BgzfWriter<W: Write> {
    inner: Option<W>,
    pool: WorkerPool,
    sequencer: Sequencer<CompletedOp>,
    capacity: usize,
    next_seq: u64,
    in_flight: usize,
    /// Uncompressed bytes not yet submitted as a chunk.
    buf: Vec<u8>,
    chunk_size: usize,
    write_eof_marker: bool,
    index_granularity: Option<u64>,
    index: OffsetIndex,
    /// Uncompressed position of the next block to append.
    upos: u64,
    /// Uncompressed position of the most recent index entry.
    last_indexed: Option<u64>,
    /// Compressed bytes appended so far.
    coffset: u64,
    finished: bool,
    failed: bool,
}

impl<W: Write> BgzfWriter<W> {
    /// Create a writer with the default pipeline configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, PipelineConfig::default())
    }

    /// Create a writer with an explicit pipeline configuration.
    pub fn with_config(inner: W, config: PipelineConfig) -> Self {
        Self::with_codecs(inner, config, Codecs::default())
    }

    /// Create a writer with explicit codec backends.
    pub fn with_codecs(inner: W, config: PipelineConfig, codecs: Codecs) -> Self {
        let pool = WorkerPool::new(&config, codecs);
        let capacity = pool.capacity();
        BgzfWriter {
            inner: Some(inner),
            pool,
            sequencer: Sequencer::new(),
            capacity,
            next_seq: 0,
            in_flight: 0,
            buf: Vec::with_capacity(DEFAULT_CHUNK_SIZE),
            chunk_size: DEFAULT_CHUNK_SIZE,
            write_eof_marker: config.write_eof_marker,
            index_granularity: config.index_granularity,
            index: OffsetIndex::new(),
            upos: 0,
            last_indexed: None,
            coffset: 0,
            finished: false,
            failed: false,
        }
    }

    /// Offset index recorded so far. Complete only after
    /// [`finish`](BgzfWriter::finish).
    pub fn index(&self) -> &OffsetIndex {
        &self.index
    }

    /// Virtual offset the next written byte will occupy. Drains pending
    /// compressions to settle the compressed position.
    pub fn tell_virtual(&mut self) -> Result<VirtualOffset> {
        self.drain_all()?;
        Ok(VirtualOffset::new(self.coffset, self.buf.len() as u16))
    }

    /// Compress any buffered bytes, append all pending blocks, and write
    /// the end-of-stream marker. Idempotent; later writes are rejected.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.flush_block()?;
        self.drain_all()?;
        if self.write_eof_marker {
            let inner = self.inner.as_mut().ok_or(BgzfError::Shutdown)?;
            inner.write_all(&EOF_BLOCK)?;
            self.coffset += EOF_BLOCK.len() as u64;
        }
        if let Some(inner) = self.inner.as_mut() {
            inner.flush()?;
        }
        self.finished = true;
        Ok(())
    }

    /// Finish the stream and return the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        self.inner.take().ok_or(BgzfError::Shutdown)
    }

    /// Finish the stream and return the sink together with the offset
    /// index recorded during compression.
    pub fn into_parts(mut self) -> Result<(W, OffsetIndex)> {
        self.finish()?;
        let inner = self.inner.take().ok_or(BgzfError::Shutdown)?;
        Ok((inner, std::mem::take(&mut self.index)))
    }

    /// Submit the buffered partial chunk as its own block.
    fn flush_block(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk_size));
            self.submit_chunk(chunk)?;
        }
        Ok(())
    }

    fn submit_chunk(&mut self, chunk: Vec<u8>) -> Result<()> {
        if self.failed {
            return Err(BgzfError::Pipeline(
                "stream aborted by a previous encode error".to_string(),
            ));
        }
        // Keep unpolled operations within the pool bound so submit and the
        // workers' publishes can never both block.
        while self.in_flight + self.sequencer.pending() >= self.capacity {
            self.drain_one()?;
        }
        self.pool.submit(Operation::compress(self.next_seq, chunk))?;
        self.next_seq += 1;
        self.in_flight += 1;
        self.write_ready()
    }

    /// Block for one completion and hand it to the sequencer.
    fn drain_one(&mut self) -> Result<()> {
        let done = self.pool.poll_completed()?;
        self.in_flight -= 1;
        self.sequencer.release(done.seq, done)?;
        self.write_ready()
    }

    fn drain_all(&mut self) -> Result<()> {
        while self.in_flight > 0 {
            self.drain_one()?;
        }
        self.write_ready()
    }

    /// Append every in-order completed block to the sink.
    ///
    /// After a failure nothing more may reach the sink: a block appended
    /// past the failed sequence position would leave a silent gap.
    fn write_ready(&mut self) -> Result<()> {
        if self.failed {
            return Err(BgzfError::Pipeline(
                "stream aborted by a previous encode error".to_string(),
            ));
        }
        while let Some((_, done)) = self.sequencer.try_next() {
            let encoded = match done.result {
                Ok(encoded) => encoded,
                Err(e) => {
                    self.failed = true;
                    self.pool.cancel();
                    return Err(e);
                }
            };
            self.append_block(&encoded, done.uncompressed_len)?;
        }
        Ok(())
    }

    fn append_block(&mut self, encoded: &[u8], uncompressed_len: usize) -> Result<()> {
        if let Some(granularity) = self.index_granularity {
            let due = match self.last_indexed {
                None => true,
                Some(last) => self.upos - last >= granularity,
            };
            if due {
                self.index
                    .push(self.upos, VirtualOffset::new(self.coffset, 0))?;
                self.last_indexed = Some(self.upos);
            }
        }
        let inner = self.inner.as_mut().ok_or(BgzfError::Shutdown)?;
        inner.write_all(encoded)?;
        self.coffset += encoded.len() as u64;
        self.upos += uncompressed_len as u64;
        Ok(())
    }
}

impl BgzfWriter<BufWriter<File>> {
    /// Create a BGZF file at a path with the default configuration.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "write after finish on a BGZF stream",
            ));
        }
        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.chunk_size {
            let rest = self.buf.split_off(self.chunk_size);
            let chunk = std::mem::replace(&mut self.buf, rest);
            self.submit_chunk(chunk)?;
        }
        Ok(data.len())
    }

    /// Force buffered bytes out as a (possibly short) block and flush the
    /// sink. Flushing mid-stream fragments blocks; prefer letting chunks
    /// fill naturally.
    fn flush(&mut self) -> io::Result<()> {
        self.flush_block()?;
        self.drain_all()?;
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| io::Error::from(BgzfError::Shutdown))?;
        inner.flush()
    }
}

impl<W: Write> Drop for BgzfWriter<W> {
    fn drop(&mut self) {
        if !self.finished && !self.failed {
            let _ = self.finish();
        }
    }
}
