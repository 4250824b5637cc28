//! Reordering completed operations back into strict stream order.
//!
//! Workers finish in arbitrary order; the sequencer buffers their results
//! keyed by sequence number and releases them strictly in order. For any two
//! sequence numbers s1 < s2, the value for s1 is always delivered before the
//! value for s2, regardless of completion order. Entries leave the buffer the
//! instant the lowest pending sequence number is reached, so the buffer never
//! grows past the pipeline's in-flight bound.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::{BgzfError, Result};

/// Bounded reorder buffer mapping sequence number to completed result.
#[derive(Debug)]
pub struct Sequencer<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
}

#[derive(Debug)]
struct State<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
    cancelled: bool,
}

impl<T> Sequencer<T> {
    /// A sequencer expecting sequence numbers from 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// A sequencer expecting sequence numbers from `next`.
    pub fn starting_at(next: u64) -> Self {
        Sequencer {
            state: Mutex::new(State {
                next,
                pending: BTreeMap::new(),
                cancelled: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand a completed result to the sequencer. Callable from any thread in
    /// any order.
    ///
    /// # Errors
    ///
    /// Returns [`BgzfError::Pipeline`] if `seq` was already consumed or
    /// already released: sequence numbers are assigned exactly once.
    pub fn release(&self, seq: u64, value: T) -> Result<()> {
        let mut state = self.lock();
        if seq < state.next || state.pending.insert(seq, value).is_some() {
            return Err(BgzfError::Pipeline(format!(
                "duplicate or stale sequence number {}",
                seq
            )));
        }
        self.cond.notify_all();
        Ok(())
    }

    /// Pop the next-in-order result if it is already available.
    pub fn try_next(&self) -> Option<(u64, T)> {
        let mut state = self.lock();
        let seq = state.next;
        let value = state.pending.remove(&seq)?;
        state.next += 1;
        Some((seq, value))
    }

    /// Pop the next-in-order result, blocking until it is released.
    ///
    /// Returns `None` if the sequencer is cancelled while waiting.
    pub fn next_ready(&self) -> Option<(u64, T)> {
        let mut state = self.lock();
        loop {
            if state.cancelled {
                return None;
            }
            let seq = state.next;
            if let Some(value) = state.pending.remove(&seq) {
                state.next += 1;
                return Some((seq, value));
            }
            state = self
                .cond
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Wake blocked consumers and discard nothing: buffered entries remain
    /// until [`reset`](Self::reset).
    pub fn cancel(&self) {
        self.lock().cancelled = true;
        self.cond.notify_all();
    }

    /// Discard all buffered entries and restart expecting `next`.
    pub fn reset(&self, next: u64) {
        let mut state = self.lock();
        state.pending.clear();
        state.next = next;
        state.cancelled = false;
        self.cond.notify_all();
    }

    /// Number of buffered out-of-order entries.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// The sequence number the next pop will yield.
    pub fn next_seq(&self) -> u64 {
        self.lock().next
    }
}

impl<T> Default for Sequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}
