//! Mapping from uncompressed positions to virtual offsets.

use crate::error::{BgzfError, Result};
use crate::offset::VirtualOffset;

/// Sparse index over a compressed stream: each entry records that
/// uncompressed position `upos` begins at virtual offset `voffset`.
///
/// Entries are recorded by [`BgzfWriter`](crate::BgzfWriter) at block
/// boundaries when `index_granularity` is set, and consumed by
/// [`BgzfReader::seek_uncompressed`](crate::BgzfReader::seek_uncompressed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetIndex {
    entries: Vec<(u64, VirtualOffset)>,
}

impl OffsetIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        OffsetIndex::default()
    }

    /// Append an entry. Both components must be strictly greater than the
    /// previous entry's, except that the first entry may sit anywhere.
    pub fn push(&mut self, upos: u64, voffset: VirtualOffset) -> Result<()> {
        if let Some(&(last_upos, last_voffset)) = self.entries.last() {
            if upos <= last_upos || voffset <= last_voffset {
                return Err(BgzfError::Format {
                    offset: voffset.compressed(),
                    msg: format!(
                        "index entry ({}, {}) does not advance past ({}, {})",
                        upos, voffset, last_upos, last_voffset
                    ),
                });
            }
        }
        self.entries.push((upos, voffset));
        Ok(())
    }

    /// Greatest entry whose uncompressed position is at or before `target`,
    /// or `None` if the index is empty or every entry lies beyond it.
    pub fn query(&self, target: u64) -> Option<(u64, VirtualOffset)> {
        let idx = self.entries.partition_point(|&(upos, _)| upos <= target);
        if idx == 0 {
            None
        } else {
            Some(self.entries[idx - 1])
        }
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded entries in ascending order.
    pub fn entries(&self) -> &[(u64, VirtualOffset)] {
        &self.entries
    }
}
