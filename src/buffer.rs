//! Whole-buffer compression and decompression over rayon.
//!
//! These helpers trade the streaming pipeline's bounded memory for
//! simplicity: the entire input is split into independent block-sized
//! pieces and transformed with `par_iter`, so peak memory is proportional
//! to the buffer sizes. Output matches the streaming API byte for byte.

use rayon::prelude::*;

use crate::block::{self, DEFAULT_CHUNK_SIZE, EOF_BLOCK, FOOTER_SIZE, HEADER_SIZE};
use crate::deflate::{CompressionLevel, Crc32, DeflateCompressor, DeflateDecompressor};
use crate::error::{BgzfError, Result};
use crate::pipeline::pool::{deflate_chunk, inflate_block};

/// Compress a whole buffer into a complete BGZF stream, end-of-stream
/// marker included.
pub fn compress_parallel(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let blocks: Vec<Vec<u8>> = data
        .par_chunks(DEFAULT_CHUNK_SIZE)
        .map(|chunk| deflate_chunk(chunk, &DeflateCompressor, &Crc32, level))
        .collect::<Result<_>>()?;

    let total: usize = blocks.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total + EOF_BLOCK.len());
    for encoded in &blocks {
        out.extend_from_slice(encoded);
    }
    out.extend_from_slice(&EOF_BLOCK);
    Ok(out)
}

/// Decompress a whole BGZF stream held in memory.
///
/// Decoding stops at the end-of-stream marker; trailing bytes after it are
/// ignored. A buffer ending cleanly between blocks but without a marker is
/// accepted, the same tolerance the streaming reader applies by default.
pub fn decompress_parallel(data: &[u8]) -> Result<Vec<u8>> {
    let spans = split_blocks(data)?;

    let chunks: Vec<Vec<u8>> = spans
        .par_iter()
        .map(|&(offset, len)| {
            let raw = &data[offset as usize..offset as usize + len];
            inflate_block(offset, raw, &DeflateDecompressor, &Crc32)
        })
        .collect::<Result<_>>()?;

    let total: usize = chunks.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for chunk in &chunks {
        out.extend_from_slice(chunk);
    }
    Ok(out)
}

/// Walk block boundaries, returning (offset, total size) for every
/// non-marker block before the end-of-stream marker.
fn split_blocks(data: &[u8]) -> Result<Vec<(u64, usize)>> {
    let mut spans = Vec::new();
    let mut offset = 0usize;
    while offset < data.len() {
        if data.len() - offset < HEADER_SIZE {
            return Err(BgzfError::TruncatedStream {
                offset: offset as u64,
            });
        }
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&data[offset..offset + HEADER_SIZE]);
        let payload_len = block::decode_header(&header, offset as u64)?;
        let total = HEADER_SIZE + payload_len + FOOTER_SIZE;
        if data.len() - offset < total {
            return Err(BgzfError::TruncatedStream {
                offset: offset as u64,
            });
        }
        let mut footer = [0u8; FOOTER_SIZE];
        footer.copy_from_slice(&data[offset + total - FOOTER_SIZE..offset + total]);
        let (_, uncompressed_len) = block::decode_footer(&footer);
        if uncompressed_len == 0 {
            break;
        }
        spans.push((offset as u64, total));
        offset += total;
    }
    Ok(spans)
}
