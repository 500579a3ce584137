// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared download state guarded by one mutex and one condition variable.
//!
//! Workers publish decoded chunks and failures here; the cursor blocks on
//! the condition variable until the chunk it needs shows up or the result
//! set fails. Every state change is followed by a broadcast.
//!
//! ## Retry accounting
//!
//! Failures are counted across the whole result set, not per chunk. A
//! failure is retried (the chunk goes back to the *front* of the queue) only
//! when all of these hold:
//!
//! - the error is retryable (transport)
//! - the result set has seen fewer than `max_retries` failures
//! - no terminal error has been recorded yet
//!
//! Otherwise the failure becomes the result set's terminal error. Every
//! failure report is kept in the failure log, including ones that arrive
//! after the result set is already terminal.

use crate::error::Error;
use crate::reader::chunks::decoder::DecodedChunk;
use crate::types::chunk::DownloadState;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};

/// One recorded download failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    /// Failures of this chunk so far, including this one.
    pub attempt: u32,
    pub error: Error,
}

/// What the pipeline does after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    Retry,
    Terminal,
}

#[derive(Debug)]
pub(crate) struct StoreState {
    /// Decoded chunks not yet taken by the cursor.
    decoded: HashMap<usize, DecodedChunk>,
    states: Vec<DownloadState>,
    /// Chunk indices waiting for a worker, lowest first except for retries.
    pub(crate) queue: VecDeque<usize>,
    pub(crate) in_flight: usize,
    /// The chunk the cursor needs next; always schedulable.
    pub(crate) wanted: usize,
    failures: u32,
    failure_log: Vec<ChunkFailure>,
    terminal: Option<Error>,
    closed: bool,
}

impl StoreState {
    fn new(chunk_count: usize) -> Self {
        Self {
            decoded: HashMap::new(),
            states: vec![DownloadState::Pending; chunk_count],
            queue: (0..chunk_count).collect(),
            in_flight: 0,
            wanted: 0,
            failures: 0,
            failure_log: Vec::new(),
            terminal: None,
            closed: false,
        }
    }

    /// Decoded chunks held in memory.
    pub(crate) fn resident(&self) -> usize {
        self.decoded.len()
    }

    pub(crate) fn state(&self, idx: usize) -> Option<DownloadState> {
        self.states.get(idx).copied()
    }

    pub(crate) fn terminal(&self) -> Option<&Error> {
        self.terminal.as_ref()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether new downloads may start.
    pub(crate) fn accepting(&self) -> bool {
        !self.closed && self.terminal.is_none()
    }

    pub(crate) fn failures(&self) -> &[ChunkFailure] {
        &self.failure_log
    }

    /// Pop the next chunk to download and mark it in flight.
    pub(crate) fn claim(&mut self) -> Option<usize> {
        let idx = self.queue.pop_front()?;
        self.states[idx] = DownloadState::InFlight;
        self.in_flight += 1;
        Some(idx)
    }

    /// Store a decoded chunk. Dropped if the store was closed meanwhile.
    pub(crate) fn publish(&mut self, idx: usize, chunk: DecodedChunk) {
        self.in_flight -= 1;
        if self.closed {
            return;
        }
        self.states[idx] = DownloadState::Done;
        self.decoded.insert(idx, chunk);
    }

    /// Detach a decoded chunk for the cursor.
    pub(crate) fn take(&mut self, idx: usize) -> Option<DecodedChunk> {
        let chunk = self.decoded.remove(&idx)?;
        self.states[idx] = DownloadState::Consumed;
        Some(chunk)
    }

    /// Record a failed download and decide whether to retry it.
    pub(crate) fn record_failure(
        &mut self,
        idx: usize,
        error: Error,
        max_retries: u32,
    ) -> RetryDecision {
        self.in_flight -= 1;
        self.failures += 1;
        let attempt = self
            .failure_log
            .iter()
            .filter(|f| f.chunk_index == idx)
            .count() as u32
            + 1;
        self.failure_log.push(ChunkFailure {
            chunk_index: idx,
            attempt,
            error: error.clone(),
        });

        let retry = self.accepting()
            && error.is_retryable()
            && !error.is_cancellation()
            && self.failures < max_retries;
        if retry {
            self.states[idx] = DownloadState::Pending;
            self.queue.push_front(idx);
            return RetryDecision::Retry;
        }

        self.states[idx] = DownloadState::Failed(attempt);
        if self.terminal.is_none() && !self.closed {
            self.terminal = Some(error);
        }
        RetryDecision::Terminal
    }

    /// Drop everything held and stop scheduling.
    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.queue.clear();
        self.decoded.clear();
    }
}

/// Monitor around [`StoreState`].
#[derive(Debug)]
pub(crate) struct ChunkStore {
    state: Mutex<StoreState>,
    changed: Condvar,
}

impl ChunkStore {
    pub(crate) fn new(chunk_count: usize) -> Self {
        Self {
            state: Mutex::new(StoreState::new(chunk_count)),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock()
    }

    /// Release the lock until the next broadcast.
    pub(crate) fn wait(&self, guard: &mut MutexGuard<'_, StoreState>) {
        self.changed.wait(guard);
    }

    pub(crate) fn notify_all(&self) {
        self.changed.notify_all();
    }
}
