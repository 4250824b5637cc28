//! Virtual offsets for random access into BGZF streams.
//!
//! A virtual offset packs two coordinates into one `u64`:
//!
//! - High 48 bits: byte offset of a block header in the compressed stream
//! - Low 16 bits: byte offset within that block's uncompressed payload
//!
//! Because a block's uncompressed payload never exceeds
//! [`MAX_PAYLOAD`](crate::block::MAX_PAYLOAD), 16 bits always suffice for the
//! intra-block component. Virtual offsets order the same way the stream does,
//! so they compare directly.

use std::fmt;

/// Composite (compressed offset, intra-block offset) coordinate.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Compose a virtual offset from its two components.
    pub fn new(compressed: u64, within_block: u16) -> Self {
        VirtualOffset((compressed << 16) | u64::from(within_block))
    }

    /// Wrap a raw 64-bit virtual offset.
    pub fn from_raw(raw: u64) -> Self {
        VirtualOffset(raw)
    }

    /// The raw 64-bit representation.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Byte offset of the block header in the compressed stream.
    pub fn compressed(self) -> u64 {
        self.0 >> 16
    }

    /// Byte offset within the block's uncompressed payload.
    pub fn within_block(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl fmt::Debug for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VirtualOffset({}:{})",
            self.compressed(),
            self.within_block()
        )
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.compressed(), self.within_block())
    }
}
