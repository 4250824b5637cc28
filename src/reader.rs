//! Streaming BGZF decoder with parallel block decompression.
//!
//! The reader stage walks raw block boundaries in stream order (cheap: the
//! header's BC subfield gives each block's size without inflating anything),
//! assigns each block a sequence number, and feeds it to the worker pool.
//! Workers inflate blocks in any order; the sequencer hands decompressed
//! chunks back strictly in sequence, so the bytes produced by [`Read`] are
//! identical to a serial decode for any pool size.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::block::{self, FOOTER_SIZE, HEADER_SIZE};
use crate::error::{BgzfError, Result};
use crate::index::OffsetIndex;
use crate::offset::VirtualOffset;
use crate::pipeline::{Codecs, CompletedOp, Operation, PipelineConfig, Sequencer, WorkerPool};

/// How the logical end of a stream was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofStatus {
    /// The stream has not ended yet.
    Pending,
    /// The end-of-stream marker block was seen.
    Marker,
    /// Physical end of input without a marker. All prior bytes were intact;
    /// many producers simply omit the marker.
    Truncated,
}

/// Streaming reader for BGZF-compressed byte streams.
///
/// Decompression runs on the worker pool configured via [`PipelineConfig`];
/// output byte order is always identical to input block order.
///
/// # Example
///
/// ```no_run
/// use parbgzf::BgzfReader;
/// use std::io::Read;
///
/// # fn main() -> parbgzf::Result<()> {
/// let mut reader = BgzfReader::from_path("records.bgz")?;
/// let mut data = Vec::new();
/// reader.read_to_end(&mut data)?;
/// # Ok(())
/// # }
/// ```
pub struct BgzfReader<R> {
    inner: R,
    pool: WorkerPool,
    sequencer: Sequencer<CompletedOp>,
    capacity: usize,
    require_eof_marker: bool,
    /// Sequence number for the next submitted block.
    next_seq: u64,
    /// Operations submitted but not yet polled back from the pool.
    in_flight: usize,
    source_done: bool,
    eof: EofStatus,
    /// Compressed offset of the next unread block.
    coffset: u64,
    /// Current in-order decompressed chunk being served.
    chunk: Vec<u8>,
    chunk_pos: usize,
    /// Compressed offset of the block backing `chunk`, and its encoded size.
    chunk_offset: u64,
    chunk_encoded_len: usize,
    /// Bytes to discard at the front of the next chunk (set by seeks).
    pending_skip: usize,
    failed: bool,
}

impl<R: Read> BgzfReader<R> {
    /// Create a reader with the default pipeline configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, PipelineConfig::default())
    }

    /// Create a reader with an explicit pipeline configuration.
    pub fn with_config(inner: R, config: PipelineConfig) -> Self {
        Self::with_codecs(inner, config, Codecs::default())
    }

    /// Create a reader with explicit codec backends.
    pub fn with_codecs(inner: R, config: PipelineConfig, codecs: Codecs) -> Self {
        let pool = WorkerPool::new(&config, codecs);
        let capacity = pool.capacity();
        BgzfReader {
            inner,
            pool,
            sequencer: Sequencer::new(),
            capacity,
            require_eof_marker: config.require_eof_marker,
            next_seq: 0,
            in_flight: 0,
            source_done: false,
            eof: EofStatus::Pending,
            coffset: 0,
            chunk: Vec::new(),
            chunk_pos: 0,
            chunk_offset: 0,
            chunk_encoded_len: 0,
            pending_skip: 0,
            failed: false,
        }
    }

    /// How the stream ended, once reads return 0 bytes.
    pub fn eof_status(&self) -> EofStatus {
        self.eof
    }

    /// Virtual offset of the next byte [`Read`] will yield.
    pub fn tell_virtual(&self) -> VirtualOffset {
        if self.chunk.is_empty() {
            VirtualOffset::new(self.chunk_offset, self.pending_skip as u16)
        } else if self.chunk_pos < self.chunk.len() {
            VirtualOffset::new(self.chunk_offset, self.chunk_pos as u16)
        } else {
            VirtualOffset::new(self.chunk_offset + self.chunk_encoded_len as u64, 0)
        }
    }

    /// Consume the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Pull the next raw block off the source. `Ok(None)` means the logical
    /// or physical end of the stream was reached.
    fn read_raw_block(&mut self) -> Result<Option<(u64, Vec<u8>)>> {
        let offset = self.coffset;

        let mut header = [0u8; HEADER_SIZE];
        let n = read_fully(&mut self.inner, &mut header)?;
        if n == 0 {
            return Ok(None);
        }
        if n < HEADER_SIZE {
            return Err(BgzfError::TruncatedStream { offset });
        }

        let payload_len = block::decode_header(&header, offset)?;
        let total = HEADER_SIZE + payload_len + FOOTER_SIZE;
        let mut data = vec![0u8; total];
        data[..HEADER_SIZE].copy_from_slice(&header);
        let rest = read_fully(&mut self.inner, &mut data[HEADER_SIZE..])?;
        if rest < total - HEADER_SIZE {
            return Err(BgzfError::TruncatedStream { offset });
        }
        self.coffset += total as u64;

        let mut footer = [0u8; FOOTER_SIZE];
        footer.copy_from_slice(&data[total - FOOTER_SIZE..]);
        let (_, uncompressed_len) = block::decode_footer(&footer);
        if uncompressed_len == 0 {
            // End-of-stream marker: terminates iteration, never surfaced.
            self.eof = EofStatus::Marker;
            return Ok(None);
        }

        Ok(Some((offset, data)))
    }

    /// Keep the pool supplied with decompress operations, up to the
    /// in-flight bound.
    fn pump(&mut self) -> Result<()> {
        while !self.source_done && self.in_flight + self.sequencer.pending() < self.capacity {
            match self.read_raw_block()? {
                Some((offset, data)) => {
                    // Raw read done; the operation advances to Decompress.
                    self.pool
                        .submit(Operation::decompress(self.next_seq, offset, data))?;
                    self.next_seq += 1;
                    self.in_flight += 1;
                }
                None => self.source_done = true,
            }
        }
        Ok(())
    }

    /// Install the next in-order decompressed chunk. `Ok(false)` means the
    /// stream is exhausted.
    fn next_chunk(&mut self) -> Result<bool> {
        if self.failed {
            return Err(BgzfError::Pipeline(
                "stream aborted by a previous decode error".to_string(),
            ));
        }
        loop {
            self.pump()?;

            if let Some((_, done)) = self.sequencer.try_next() {
                let data = match done.result {
                    Ok(data) => data,
                    Err(e) => {
                        // The error surfaces at its stream position. Later
                        // in-flight blocks finish on their own (the bound
                        // caps them) so a seek can still drain and recover.
                        self.failed = true;
                        return Err(e);
                    }
                };
                self.chunk = data;
                self.chunk_pos = 0;
                self.chunk_offset = done.offset;
                self.chunk_encoded_len = done.encoded_len;
                if self.pending_skip > 0 {
                    let skip = std::mem::take(&mut self.pending_skip);
                    if skip > self.chunk.len() {
                        self.failed = true;
                        return Err(BgzfError::Seek(format!(
                            "virtual offset points {} bytes into a {}-byte block",
                            skip,
                            self.chunk.len()
                        )));
                    }
                    self.chunk_pos = skip;
                    if self.chunk_pos == self.chunk.len() {
                        continue;
                    }
                }
                return Ok(true);
            }

            if self.in_flight == 0 {
                // pump() stops only on a full queue or an exhausted source;
                // with nothing in flight the source must be exhausted.
                if self.eof != EofStatus::Marker {
                    self.eof = EofStatus::Truncated;
                    if self.require_eof_marker {
                        self.failed = true;
                        return Err(BgzfError::TruncatedStream {
                            offset: self.coffset,
                        });
                    }
                }
                return Ok(false);
            }

            let done = self.pool.poll_completed()?;
            self.in_flight -= 1;
            self.sequencer.release(done.seq, done)?;
        }
    }
}

impl BgzfReader<BufReader<File>> {
    /// Open a BGZF file from a path with the default configuration.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> Read for BgzfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.chunk_pos >= self.chunk.len() {
            match self.next_chunk() {
                Ok(true) => {}
                Ok(false) => return Ok(0),
                Err(e) => return Err(e.into()),
            }
        }
        let available = &self.chunk[self.chunk_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.chunk_pos += n;
        Ok(n)
    }
}

impl<R: Read + Seek> BgzfReader<R> {
    /// Reposition to a virtual offset: the compressed component must point
    /// at a block header, and the intra-block component is skipped within
    /// that block's decompressed payload.
    ///
    /// In-flight results for the old position are discarded, and a decode
    /// error observed at the old position no longer poisons the stream.
    pub fn seek_virtual(&mut self, voffset: VirtualOffset) -> Result<()> {
        self.discard_in_flight()?;
        self.inner
            .seek(SeekFrom::Start(voffset.compressed()))
            .map_err(|e| BgzfError::Seek(format!("source does not support seeking: {}", e)))?;
        self.coffset = voffset.compressed();
        self.source_done = false;
        // A decode failure poisons only the abandoned position.
        self.failed = false;
        self.eof = EofStatus::Pending;
        self.chunk = Vec::new();
        self.chunk_pos = 0;
        self.chunk_offset = voffset.compressed();
        self.chunk_encoded_len = 0;
        self.pending_skip = voffset.within_block() as usize;
        Ok(())
    }

    /// Seek to an uncompressed byte position using an index built during
    /// compression: jump to the greatest indexed entry at or before
    /// `target`, then discard the remaining delta.
    pub fn seek_uncompressed(&mut self, index: &OffsetIndex, target: u64) -> Result<()> {
        let (upos, voffset) = index.query(target).ok_or_else(|| {
            BgzfError::Seek(format!("target {} precedes the first index entry", target))
        })?;
        self.seek_virtual(voffset)?;

        let mut remaining = target - upos;
        let mut scratch = [0u8; 8192];
        while remaining > 0 {
            let want = remaining.min(scratch.len() as u64) as usize;
            let n = Read::read(self, &mut scratch[..want]).map_err(BgzfError::Io)?;
            if n == 0 {
                return Err(BgzfError::Seek(format!(
                    "target {} lies beyond the end of the stream",
                    target
                )));
            }
            remaining -= n as u64;
        }
        Ok(())
    }

    fn discard_in_flight(&mut self) -> Result<()> {
        while self.in_flight > 0 {
            // Results for the abandoned position are dropped.
            let _ = self.pool.poll_completed()?;
            self.in_flight -= 1;
        }
        self.sequencer.reset(self.next_seq);
        Ok(())
    }
}

/// Read until `buf` is full or the source reports end of input, returning
/// the number of bytes read. Distinguishes clean EOF (0) from a partial
/// fill, which `read_exact` cannot.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::BgzfWriter;
    use std::io::{Cursor, Write};

    fn encode(data: &[u8], config: PipelineConfig) -> Vec<u8> {
        let mut writer = BgzfWriter::with_config(Vec::new(), config);
        writer.write_all(data).unwrap();
        writer.into_inner().unwrap()
    }

    #[test]
    fn test_empty_stream_reads_zero() {
        let encoded = encode(b"", PipelineConfig::default());
        let mut reader = BgzfReader::new(Cursor::new(encoded));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(reader.eof_status(), EofStatus::Marker);
    }

    #[test]
    fn test_round_trip_small() {
        let data = b"hello bgzf".to_vec();
        let encoded = encode(&data, PipelineConfig::default());
        let mut reader = BgzfReader::new(Cursor::new(encoded));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_truncated_header_is_error() {
        let encoded = encode(b"payload", PipelineConfig::default());
        // Cut inside the first block's header.
        let mut reader = BgzfReader::new(Cursor::new(encoded[..10].to_vec()));
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_missing_marker_is_status_not_error() {
        let encoded = encode(b"tolerant", PipelineConfig::default().write_eof_marker(false));
        let mut reader = BgzfReader::new(Cursor::new(encoded));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"tolerant");
        assert_eq!(reader.eof_status(), EofStatus::Truncated);
    }

    #[test]
    fn test_missing_marker_hard_error_when_required() {
        let encoded = encode(b"strict", PipelineConfig::default().write_eof_marker(false));
        let config = PipelineConfig::default().require_eof_marker(true);
        let mut reader = BgzfReader::with_config(Cursor::new(encoded), config);
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }

    #[test]
    fn test_tell_virtual_tracks_position() {
        let data = b"0123456789".to_vec();
        let encoded = encode(&data, PipelineConfig::default());
        let mut reader = BgzfReader::new(Cursor::new(encoded));
        assert_eq!(reader.tell_virtual(), VirtualOffset::new(0, 0));
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.tell_virtual(), VirtualOffset::new(0, 4));
    }

    #[test]
    fn test_seek_virtual_to_block_start() {
        let data = b"abcdefghij".to_vec();
        let encoded = encode(&data, PipelineConfig::default());
        let mut reader = BgzfReader::new(Cursor::new(encoded));
        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all, data);

        reader.seek_virtual(VirtualOffset::new(0, 3)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, &data[3..]);
    }

    #[test]
    fn test_seek_recovers_after_decode_error() {
        use crate::block::DEFAULT_CHUNK_SIZE;

        let data: Vec<u8> = (0..DEFAULT_CHUNK_SIZE * 3 + 500)
            .map(|i| (i % 239) as u8)
            .collect();
        let mut encoded = encode(&data, PipelineConfig::default());
        let first_block_len =
            u16::from_le_bytes([encoded[16], encoded[17]]) as usize + 1;
        // Corrupt the first block's payload; later blocks stay intact.
        encoded[HEADER_SIZE + 4] ^= 0xff;

        let config = PipelineConfig::default().worker_threads(1).queue_capacity(4);
        let mut reader = BgzfReader::with_config(Cursor::new(encoded), config);
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
        // The failure is sticky until a seek abandons the position.
        let mut buf = [0u8; 8];
        assert!(Read::read(&mut reader, &mut buf).is_err());

        reader
            .seek_virtual(VirtualOffset::new(first_block_len as u64, 0))
            .unwrap();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, data[DEFAULT_CHUNK_SIZE..]);
    }

    #[test]
    fn test_seek_past_block_payload_is_seek_error() {
        let encoded = encode(b"tiny", PipelineConfig::default());
        let mut reader = BgzfReader::new(Cursor::new(encoded));
        reader.seek_virtual(VirtualOffset::new(0, 100)).unwrap();
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }
}
