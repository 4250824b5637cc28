//! Pipeline operations and the stage state machine.
//!
//! Every unit of work flowing through the pipeline is an [`Operation`]: a
//! sequence-numbered record tagged with an [`OpKind`]. Operations advance
//! through a fixed stage order, `Read` then `Decompress` on the decode side
//! and `Compress` then `Write` on the encode side. The transition function
//! is pure: the next kind depends only on the current kind and whether the
//! current stage succeeded, never on which thread ran it.
//!
//! Buffer ownership transfers with the operation at each stage boundary, so
//! no buffer is ever visible to two threads at once. A pool stage consumes
//! the operation and publishes a [`CompletedOp`] carrying the stage product
//! and the advanced kind.

use crate::error::Result;

/// The kind of work an operation currently represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Pull the next raw block from the underlying source (reader stage).
    Read,
    /// Inflate a raw block's payload (pool stage).
    Decompress,
    /// Deflate a payload chunk into an encoded block (pool stage).
    Compress,
    /// Append an encoded block to the underlying sink (writer stage).
    Write,
    /// Completed slot; the operation is spent and eligible for destruction.
    None,
}

impl OpKind {
    /// The stage transition function.
    ///
    /// A successful stage advances to the next kind in pipeline order; a
    /// failed stage is terminal. No kind ever skips a stage.
    pub fn advance(self, ok: bool) -> OpKind {
        if !ok {
            return OpKind::None;
        }
        match self {
            OpKind::Read => OpKind::Decompress,
            OpKind::Decompress => OpKind::None,
            OpKind::Compress => OpKind::Write,
            OpKind::Write => OpKind::None,
            OpKind::None => OpKind::None,
        }
    }

    /// Whether the worker pool executes this kind (as opposed to the
    /// reader/writer boundary stages).
    pub fn is_pool_work(self) -> bool {
        matches!(self, OpKind::Decompress | OpKind::Compress)
    }
}

/// A sequence-numbered unit of pipeline work.
///
/// The `input` buffer is owned exclusively by the operation; the pool stage
/// consumes it and publishes its product in a [`CompletedOp`].
#[derive(Debug)]
pub struct Operation {
    /// Monotonic stream-order index.
    pub seq: u64,
    /// Current stage.
    pub kind: OpKind,
    /// Compressed-stream byte offset of the block (decode side); zero until
    /// assigned by the writer stage on the encode side.
    pub offset: u64,
    /// Stage input buffer.
    pub input: Vec<u8>,
}

impl Operation {
    /// A decompress operation over one raw encoded block.
    pub fn decompress(seq: u64, offset: u64, raw_block: Vec<u8>) -> Self {
        Operation {
            seq,
            kind: OpKind::Decompress,
            offset,
            input: raw_block,
        }
    }

    /// A compress operation over one uncompressed payload chunk.
    pub fn compress(seq: u64, payload: Vec<u8>) -> Self {
        Operation {
            seq,
            kind: OpKind::Compress,
            offset: 0,
            input: payload,
        }
    }
}

/// The published result of a pool-executed operation.
#[derive(Debug)]
pub struct CompletedOp {
    /// Sequence number of the originating operation.
    pub seq: u64,
    /// The operation's kind after the stage transition: the next stage for
    /// the boundary to run, or [`OpKind::None`] when terminal.
    pub kind: OpKind,
    /// Compressed-stream byte offset of the block (decode side).
    pub offset: u64,
    /// Encoded size of the block: input length for decompress operations,
    /// output length for compress operations.
    pub encoded_len: usize,
    /// Uncompressed payload length.
    pub uncompressed_len: usize,
    /// The stage product, or the error that terminated the operation.
    pub result: Result<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_side_transitions() {
        assert_eq!(OpKind::Read.advance(true), OpKind::Decompress);
        assert_eq!(OpKind::Decompress.advance(true), OpKind::None);
    }

    #[test]
    fn test_encode_side_transitions() {
        assert_eq!(OpKind::Compress.advance(true), OpKind::Write);
        assert_eq!(OpKind::Write.advance(true), OpKind::None);
    }

    #[test]
    fn test_failure_is_terminal() {
        for kind in [
            OpKind::Read,
            OpKind::Decompress,
            OpKind::Compress,
            OpKind::Write,
        ] {
            assert_eq!(kind.advance(false), OpKind::None);
        }
        assert_eq!(OpKind::None.advance(true), OpKind::None);
    }

    #[test]
    fn test_pool_work_kinds() {
        assert!(OpKind::Decompress.is_pool_work());
        assert!(OpKind::Compress.is_pool_work());
        assert!(!OpKind::Read.is_pool_work());
        assert!(!OpKind::Write.is_pool_work());
        assert!(!OpKind::None.is_pool_work());
    }
}
