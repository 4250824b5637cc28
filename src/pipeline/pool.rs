//! Bounded worker pool executing compress and decompress operations.
//!
//! N worker threads pull ready operations from a shared bounded queue,
//! run the stage-appropriate transform through the pluggable codecs, and
//! publish results to a bounded completion queue. The pool enforces no
//! ordering; that is the sequencer's job. Backpressure comes from the
//! channel bounds: `submit` blocks once `capacity` operations are queued,
//! and workers block publishing once `capacity` results are unconsumed.
//!
//! Callers must keep the number of unpolled operations at or below
//! [`WorkerPool::capacity`]; the reader and writer front-ends do. Within
//! that bound every in-flight operation has a completion slot, so the
//! pipeline cannot deadlock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use super::op::{CompletedOp, OpKind, Operation};
use super::{Codecs, PipelineConfig};
use crate::block::{self, FOOTER_SIZE, HEADER_SIZE, MAX_PAYLOAD};
use crate::deflate::{Checksum, CompressionLevel, Compressor, Decompressor};
use crate::error::{BgzfError, Result};

/// A fixed-size pool of worker threads with bounded queues.
pub struct WorkerPool {
    ready_tx: Option<Sender<Operation>>,
    done_rx: Receiver<CompletedOp>,
    cancel: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    capacity: usize,
}

impl WorkerPool {
    /// Spawn `config.worker_threads` workers running the given codecs.
    pub fn new(config: &PipelineConfig, codecs: Codecs) -> Self {
        let threads = config.worker_threads.max(1);
        let capacity = config.queue_capacity.max(threads);
        let level = config.compression_level;

        let (ready_tx, ready_rx) = bounded::<Operation>(capacity);
        let (done_tx, done_rx) = bounded::<CompletedOp>(capacity);
        let cancel = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(threads);
        for _ in 0..threads {
            let ready_rx = ready_rx.clone();
            let done_tx = done_tx.clone();
            let cancel = Arc::clone(&cancel);
            let codecs = codecs.clone();
            handles.push(std::thread::spawn(move || {
                worker_loop(&ready_rx, &done_tx, &cancel, &codecs, level);
            }));
        }

        WorkerPool {
            ready_tx: Some(ready_tx),
            done_rx,
            cancel,
            handles,
            capacity,
        }
    }

    /// The in-flight operation bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue an operation for execution, blocking while the ready-queue is
    /// full.
    ///
    /// # Errors
    ///
    /// Returns [`BgzfError::Pipeline`] for operations the pool cannot
    /// execute, or [`BgzfError::Shutdown`] if the pool has shut down.
    pub fn submit(&self, op: Operation) -> Result<()> {
        if !op.kind.is_pool_work() {
            return Err(BgzfError::Pipeline(format!(
                "operation kind {:?} is not executed by the worker pool",
                op.kind
            )));
        }
        let tx = self.ready_tx.as_ref().ok_or(BgzfError::Shutdown)?;
        tx.send(op).map_err(|_| BgzfError::Shutdown)
    }

    /// Take one completed operation, blocking until a worker publishes one.
    pub fn poll_completed(&self) -> Result<CompletedOp> {
        self.done_rx.recv().map_err(|_| BgzfError::Shutdown)
    }

    /// Take one completed operation without blocking.
    pub fn try_poll_completed(&self) -> Option<CompletedOp> {
        self.done_rx.try_recv().ok()
    }

    /// Raise the cooperative cancel flag. In-flight transforms finish;
    /// queued operations complete with [`BgzfError::Shutdown`] without
    /// running, so every submitted operation still produces exactly one
    /// completion.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Drain in-flight operations and release all worker threads.
    pub fn shutdown(mut self) {
        self.drain_and_join();
    }

    fn drain_and_join(&mut self) {
        // Disconnecting the ready-queue tells idle workers to exit.
        self.ready_tx.take();
        for handle in self.handles.drain(..) {
            // Keep the completion queue draining so a worker blocked on a
            // full queue can publish and exit.
            while !handle.is_finished() {
                match self.done_rx.recv_timeout(Duration::from_millis(1)) {
                    Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            let _ = handle.join();
        }
        while self.done_rx.try_recv().is_ok() {}
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel();
        self.drain_and_join();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

fn worker_loop(
    ready_rx: &Receiver<Operation>,
    done_tx: &Sender<CompletedOp>,
    cancel: &AtomicBool,
    codecs: &Codecs,
    level: CompressionLevel,
) {
    while let Ok(op) = ready_rx.recv() {
        // Cancellation is checked between operations, never mid-transform.
        // Cancelled operations still publish so callers counting unpolled
        // operations see one completion per submit.
        if cancel.load(Ordering::Relaxed) {
            let completed = CompletedOp {
                seq: op.seq,
                kind: OpKind::None,
                offset: op.offset,
                encoded_len: 0,
                uncompressed_len: 0,
                result: Err(BgzfError::Shutdown),
            };
            if done_tx.send(completed).is_err() {
                break;
            }
            continue;
        }
        let completed = execute(
            op,
            &*codecs.compressor,
            &*codecs.decompressor,
            &*codecs.checksum,
            level,
        );
        if done_tx.send(completed).is_err() {
            break;
        }
    }
}

/// Run one pool stage, consuming the operation and publishing its
/// transition.
fn execute(
    op: Operation,
    compressor: &dyn Compressor,
    decompressor: &dyn Decompressor,
    checksum: &dyn Checksum,
    level: CompressionLevel,
) -> CompletedOp {
    let outcome = match op.kind {
        OpKind::Decompress => inflate_block(op.offset, &op.input, decompressor, checksum),
        OpKind::Compress => deflate_chunk(&op.input, compressor, checksum, level),
        kind => Err(BgzfError::Pipeline(format!(
            "operation kind {:?} reached a pool worker",
            kind
        ))),
    };

    match outcome {
        Ok(output) => {
            let (encoded_len, uncompressed_len) = match op.kind {
                OpKind::Decompress => (op.input.len(), output.len()),
                _ => (output.len(), op.input.len()),
            };
            CompletedOp {
                seq: op.seq,
                kind: op.kind.advance(true),
                offset: op.offset,
                encoded_len,
                uncompressed_len,
                result: Ok(output),
            }
        }
        Err(e) => CompletedOp {
            seq: op.seq,
            kind: op.kind.advance(false),
            offset: op.offset,
            encoded_len: 0,
            uncompressed_len: 0,
            result: Err(e),
        },
    }
}

/// Inflate one complete encoded block and verify its footer.
pub(crate) fn inflate_block(
    offset: u64,
    raw: &[u8],
    decompressor: &dyn Decompressor,
    checksum: &dyn Checksum,
) -> Result<Vec<u8>> {
    if raw.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(BgzfError::Format {
            offset,
            msg: format!("block of {} bytes is shorter than header + footer", raw.len()),
        });
    }
    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&raw[..HEADER_SIZE]);
    let payload_len = block::decode_header(&header, offset)?;
    if raw.len() != HEADER_SIZE + payload_len + FOOTER_SIZE {
        return Err(BgzfError::Format {
            offset,
            msg: format!(
                "declared block size {} does not match buffered size {}",
                HEADER_SIZE + payload_len + FOOTER_SIZE,
                raw.len()
            ),
        });
    }

    let mut footer = [0u8; FOOTER_SIZE];
    footer.copy_from_slice(&raw[raw.len() - FOOTER_SIZE..]);
    let (crc, isize) = block::decode_footer(&footer);
    if isize as usize > MAX_PAYLOAD {
        return Err(BgzfError::Format {
            offset,
            msg: format!(
                "declared uncompressed length {} exceeds maximum payload {}",
                isize, MAX_PAYLOAD
            ),
        });
    }

    let payload = &raw[HEADER_SIZE..raw.len() - FOOTER_SIZE];
    let out = decompressor.decompress(payload, isize as usize)?;
    if out.len() != isize as usize {
        return Err(BgzfError::Format {
            offset,
            msg: format!(
                "payload inflated to {} bytes but footer declares {}",
                out.len(),
                isize
            ),
        });
    }

    let actual = checksum.checksum(&out);
    if actual != crc {
        return Err(BgzfError::ChecksumMismatch {
            offset,
            expected: crc,
            actual,
        });
    }

    Ok(out)
}

/// Deflate one payload chunk into a complete encoded block.
pub(crate) fn deflate_chunk(
    payload: &[u8],
    compressor: &dyn Compressor,
    checksum: &dyn Checksum,
    level: CompressionLevel,
) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(BgzfError::CapacityExceeded {
            len: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let compressed = compressor.compress(payload, level)?;
    let crc = checksum.checksum(payload);
    block::encode_block(&compressed, crc, payload.len() as u32)
}
