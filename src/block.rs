//! BGZF wire format: block layout constants and header/footer codecs.
//!
//! A BGZF stream is a series of independent gzip members ("blocks"), each
//! carrying a `BC` extra subfield that records the total encoded block size.
//! That size field is what makes the format splittable: a reader can walk
//! block boundaries without inflating anything.
//!
//! Block layout:
//!
//! - Header (18 bytes): gzip magic `1f 8b`, CM=8 (deflate), FLG=4 (FEXTRA),
//!   MTIME (4 bytes, zero), XFL, OS=255, XLEN=6, then the extra subfield
//!   SI1='B', SI2='C', SLEN=2, BSIZE (u16 LE) = total block size - 1.
//! - Payload: raw deflate bytes.
//! - Footer (8 bytes): CRC32 of the uncompressed payload (u32 LE), then the
//!   uncompressed length ISIZE (u32 LE).
//!
//! A block whose uncompressed length is zero is the end-of-stream marker.

use crate::error::{BgzfError, Result};

/// Maximum total encoded size of one block (header + payload + footer)
pub const MAX_BLOCK_SIZE: usize = 65536;

/// Encoded block header size in bytes
pub const HEADER_SIZE: usize = 18;

/// Encoded block footer size in bytes
pub const FOOTER_SIZE: usize = 8;

/// Maximum uncompressed payload bytes a single block may declare
pub const MAX_PAYLOAD: usize = MAX_BLOCK_SIZE - HEADER_SIZE - FOOTER_SIZE;

/// Default uncompressed bytes per block when writing (64 KB minus slack).
///
/// Deflate can expand incompressible input by a few bytes per 16 KB stored
/// block. Chunking at 0xff00 guarantees the encoded block fits within
/// [`MAX_BLOCK_SIZE`] even for random data, which is why every mainstream
/// BGZF writer uses this figure rather than [`MAX_PAYLOAD`].
pub const DEFAULT_CHUNK_SIZE: usize = 0xff00;

/// Gzip magic bytes (ID1, ID2)
pub const MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The canonical 28-byte end-of-stream block: an empty payload with BSIZE=27.
pub const EOF_BLOCK: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, // magic, CM=deflate, FLG=FEXTRA
    0x00, 0x00, 0x00, 0x00, // MTIME
    0x00, 0xff, // XFL, OS=unknown
    0x06, 0x00, // XLEN=6
    0x42, 0x43, 0x02, 0x00, // SI1='B', SI2='C', SLEN=2
    0x1b, 0x00, // BSIZE=27
    0x03, 0x00, // empty deflate stream
    0x00, 0x00, 0x00, 0x00, // CRC32=0
    0x00, 0x00, 0x00, 0x00, // ISIZE=0
];

/// Check whether the first two bytes of a stream look like a gzip member.
pub fn is_bgzf(magic: &[u8; 2]) -> bool {
    *magic == MAGIC
}

/// Encode the 18-byte block header for a block of `block_size` total
/// encoded bytes.
///
/// # Errors
///
/// Returns [`BgzfError::Format`] if `block_size` exceeds [`MAX_BLOCK_SIZE`]
/// or is smaller than an empty block.
pub fn encode_header(block_size: usize) -> Result<[u8; HEADER_SIZE]> {
    if block_size > MAX_BLOCK_SIZE || block_size < HEADER_SIZE + FOOTER_SIZE {
        return Err(BgzfError::Format {
            offset: 0,
            msg: format!("encoded block size {} outside valid range", block_size),
        });
    }

    let bsize = (block_size - 1) as u16;
    let mut header = [0u8; HEADER_SIZE];
    header[0] = MAGIC[0];
    header[1] = MAGIC[1];
    header[2] = 0x08; // CM: deflate
    header[3] = 0x04; // FLG: FEXTRA
    // MTIME (4..8) left zero
    // XFL (8) left zero
    header[9] = 0xff; // OS: unknown
    header[10..12].copy_from_slice(&6u16.to_le_bytes()); // XLEN
    header[12] = b'B';
    header[13] = b'C';
    header[14..16].copy_from_slice(&2u16.to_le_bytes()); // SLEN
    header[16..18].copy_from_slice(&bsize.to_le_bytes());
    Ok(header)
}

/// Decode an 18-byte block header, returning the compressed payload length.
///
/// `offset` is the compressed-stream position of the header, used only for
/// error context.
///
/// # Errors
///
/// Returns [`BgzfError::Format`] on a magic mismatch, a missing extra field,
/// an unrecognized subfield, or a declared size outside the valid range.
pub fn decode_header(header: &[u8; HEADER_SIZE], offset: u64) -> Result<usize> {
    if header[0] != MAGIC[0] || header[1] != MAGIC[1] {
        return Err(BgzfError::Format {
            offset,
            msg: format!(
                "bad magic bytes [{:#04x}, {:#04x}]",
                header[0], header[1]
            ),
        });
    }
    if header[2] != 0x08 {
        return Err(BgzfError::Format {
            offset,
            msg: format!("unsupported compression method {}", header[2]),
        });
    }
    if header[3] & 0x04 == 0 {
        return Err(BgzfError::Format {
            offset,
            msg: "FEXTRA flag not set; not a BGZF block".to_string(),
        });
    }

    let xlen = u16::from_le_bytes([header[10], header[11]]);
    if xlen != 6 {
        return Err(BgzfError::Format {
            offset,
            msg: format!("unexpected extra field length {}", xlen),
        });
    }
    if header[12] != b'B' || header[13] != b'C' {
        return Err(BgzfError::Format {
            offset,
            msg: "missing BC subfield".to_string(),
        });
    }
    let slen = u16::from_le_bytes([header[14], header[15]]);
    if slen != 2 {
        return Err(BgzfError::Format {
            offset,
            msg: format!("unexpected BC subfield length {}", slen),
        });
    }

    let block_size = u16::from_le_bytes([header[16], header[17]]) as usize + 1;
    if block_size < HEADER_SIZE + FOOTER_SIZE {
        return Err(BgzfError::Format {
            offset,
            msg: format!("declared block size {} smaller than header + footer", block_size),
        });
    }

    Ok(block_size - HEADER_SIZE - FOOTER_SIZE)
}

/// Encode the 8-byte block footer.
pub fn encode_footer(crc: u32, uncompressed_len: u32) -> [u8; FOOTER_SIZE] {
    let mut footer = [0u8; FOOTER_SIZE];
    footer[0..4].copy_from_slice(&crc.to_le_bytes());
    footer[4..8].copy_from_slice(&uncompressed_len.to_le_bytes());
    footer
}

/// Decode the 8-byte block footer into `(crc, uncompressed_len)`.
pub fn decode_footer(footer: &[u8; FOOTER_SIZE]) -> (u32, u32) {
    let crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
    let isize = u32::from_le_bytes([footer[4], footer[5], footer[6], footer[7]]);
    (crc, isize)
}

/// Assemble a complete encoded block from a compressed payload and its
/// footer fields.
///
/// # Errors
///
/// Returns [`BgzfError::Format`] if the finished block would exceed
/// [`MAX_BLOCK_SIZE`], which can only happen for near-incompressible payloads
/// longer than [`DEFAULT_CHUNK_SIZE`].
pub fn encode_block(compressed: &[u8], crc: u32, uncompressed_len: u32) -> Result<Vec<u8>> {
    let block_size = HEADER_SIZE + compressed.len() + FOOTER_SIZE;
    let header = encode_header(block_size)?;

    let mut block = Vec::with_capacity(block_size);
    block.extend_from_slice(&header);
    block.extend_from_slice(compressed);
    block.extend_from_slice(&encode_footer(crc, uncompressed_len));
    Ok(block)
}

/// One encoded block, validated against the wire format.
///
/// Owns the complete encoded bytes (header + compressed payload + footer)
/// and exposes the footer fields without decompressing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Vec<u8>,
}

impl Block {
    /// Validate and wrap an encoded block.
    ///
    /// `offset` is the block's compressed-stream position, used for error
    /// context.
    ///
    /// # Errors
    ///
    /// Returns [`BgzfError::Format`] if the header is malformed, the declared
    /// size disagrees with `data.len()`, or the declared uncompressed length
    /// exceeds [`MAX_PAYLOAD`].
    pub fn from_encoded(data: Vec<u8>, offset: u64) -> Result<Self> {
        if data.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(BgzfError::Format {
                offset,
                msg: format!("block of {} bytes is shorter than header + footer", data.len()),
            });
        }
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&data[..HEADER_SIZE]);
        let payload_len = decode_header(&header, offset)?;
        if HEADER_SIZE + payload_len + FOOTER_SIZE != data.len() {
            return Err(BgzfError::Format {
                offset,
                msg: format!(
                    "declared block size {} does not match actual size {}",
                    HEADER_SIZE + payload_len + FOOTER_SIZE,
                    data.len()
                ),
            });
        }
        let block = Block { data };
        if block.uncompressed_len() as usize > MAX_PAYLOAD {
            return Err(BgzfError::Format {
                offset,
                msg: format!(
                    "declared uncompressed length {} exceeds maximum payload {}",
                    block.uncompressed_len(),
                    MAX_PAYLOAD
                ),
            });
        }
        Ok(block)
    }

    /// The complete encoded bytes.
    pub fn encoded(&self) -> &[u8] {
        &self.data
    }

    /// Total encoded length in bytes.
    pub fn encoded_len(&self) -> usize {
        self.data.len()
    }

    /// The compressed payload slice (between header and footer).
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_SIZE..self.data.len() - FOOTER_SIZE]
    }

    /// CRC32 of the uncompressed payload, as stored in the footer.
    pub fn crc(&self) -> u32 {
        self.footer().0
    }

    /// Uncompressed payload length, as stored in the footer.
    pub fn uncompressed_len(&self) -> u32 {
        self.footer().1
    }

    /// Whether this block is an end-of-stream marker (empty payload).
    pub fn is_eof(&self) -> bool {
        self.uncompressed_len() == 0
    }

    /// Consume the block, returning the encoded bytes.
    pub fn into_encoded(self) -> Vec<u8> {
        self.data
    }

    fn footer(&self) -> (u32, u32) {
        let start = self.data.len() - FOOTER_SIZE;
        let mut footer = [0u8; FOOTER_SIZE];
        footer.copy_from_slice(&self.data[start..]);
        decode_footer(&footer)
    }
}
