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

//! Download workers for the chunk pipeline.
//!
//! Each claimed chunk runs as one tokio task on the pipeline's runtime,
//! watched by a second task that records the outcome even if the first one
//! panics. There are never more than `worker_count` downloads at once. A finishing task schedules its
//! own replacement before it exits, so the worker budget stays full for as
//! long as there is queued work and memory headroom.
//!
//! ## Scheduling rule
//!
//! A chunk is claimed while all of these hold:
//!
//! | Condition | Why it can stop scheduling |
//! |---|---|
//! | `in_flight < worker_count` | worker budget exhausted |
//! | queue not empty | every chunk claimed |
//! | `in_flight + resident < max_resident`, or the head is the chunk the cursor waits for | memory bound |
//! | no terminal error, not closed | result set failed or was reset |
//!
//! Scheduling runs at start, on every task completion, and whenever the
//! cursor takes a chunk.

use crate::error::{Error, Result};
use crate::reader::chunks::chunk_downloader::ChunkDownloader;
use crate::reader::chunks::chunk_store::{ChunkStore, RetryDecision, StoreState};
use crate::reader::chunks::decoder::DecodedChunk;
use crate::types::chunk::ChunkDescriptor;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Everything a download task needs, shared by the cursor and all tasks.
#[derive(Debug)]
pub(crate) struct DownloadContext {
    pub(crate) store: ChunkStore,
    pub(crate) chunks: Vec<ChunkDescriptor>,
    pub(crate) downloader: ChunkDownloader,
    pub(crate) worker_count: usize,
    pub(crate) max_resident: usize,
    pub(crate) max_retries: u32,
    pub(crate) cancel: CancellationToken,
    pub(crate) deadline: Option<Instant>,
    pub(crate) runtime: Handle,
}

impl DownloadContext {
    /// Stop all work and release every decoded chunk still held.
    pub(crate) fn shutdown(&self) {
        self.cancel.cancel();
        let mut state = self.store.lock();
        if !state.is_closed() {
            debug!(
                "Shutting down chunk pipeline: {} in flight, {} resident",
                state.in_flight,
                state.resident()
            );
        }
        state.close();
        drop(state);
        self.store.notify_all();
    }
}

/// Claim and spawn downloads while the scheduling rule allows.
///
/// Must be called with the store lock held.
pub(crate) fn schedule_downloads(ctx: &Arc<DownloadContext>, state: &mut StoreState) {
    while state.accepting() && state.in_flight < ctx.worker_count {
        let Some(&head) = state.queue.front() else {
            break;
        };
        let occupied = state.in_flight + state.resident();
        if occupied >= ctx.max_resident && head != state.wanted {
            trace!(
                "Memory limit reached: {}/{} chunks occupied, pausing downloads",
                occupied,
                ctx.max_resident
            );
            break;
        }
        let Some(idx) = state.claim() else {
            break;
        };

        trace!(
            "Scheduling download for chunk {}: in_flight={}/{}, resident={}, cursor_at={}",
            idx,
            state.in_flight,
            ctx.worker_count,
            state.resident(),
            state.wanted
        );
        let task_ctx = Arc::clone(ctx);
        let download = ctx.runtime.spawn({
            let task_ctx = Arc::clone(ctx);
            async move { run_download(&task_ctx, idx).await }
        });
        // The outcome is always recorded, even when the download task dies.
        ctx.runtime.spawn(async move {
            let result = match download.await {
                Ok(result) => result,
                Err(join_err) => Err(join_failure(idx, join_err)),
            };
            complete_download(&task_ctx, idx, result);
        });
    }
}

/// One download attempt, bounded by cancellation and the deadline.
async fn run_download(ctx: &DownloadContext, idx: usize) -> Result<DecodedChunk> {
    let chunk = &ctx.chunks[idx];
    let download = async {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(Error::cancelled()),
            result = ctx.downloader.download(chunk, &ctx.cancel) => result,
        }
    };

    let result = match ctx.deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, download).await {
            Ok(result) => result,
            Err(_) => Err(Error::deadline_exceeded()),
        },
        None => download.await,
    };
    result.map_err(|e| e.with_chunk_index(idx))
}

/// Terminal error for a download task that panicked or was aborted.
fn join_failure(idx: usize, join_err: JoinError) -> Error {
    if join_err.is_panic() {
        warn!("Download task for chunk {} panicked", idx);
        Error::decode(format!("download task for chunk {} panicked", idx)).with_chunk_index(idx)
    } else {
        Error::cancelled().with_chunk_index(idx)
    }
}

/// Record the outcome, schedule the replacement, and wake the cursor.
fn complete_download(ctx: &Arc<DownloadContext>, idx: usize, result: Result<DecodedChunk>) {
    let mut state = ctx.store.lock();
    match result {
        Ok(chunk) => {
            trace!("Chunk {} ready ({} rows)", idx, chunk.row_count());
            state.publish(idx, chunk);
        }
        Err(e) => match state.record_failure(idx, e.clone(), ctx.max_retries) {
            RetryDecision::Retry => {
                warn!(
                    "Chunk {} download failed, retrying ({} failures so far): {}",
                    idx,
                    state.failures().len(),
                    e
                );
            }
            RetryDecision::Terminal if e.is_cancellation() || state.is_closed() => {
                debug!("Chunk {} download stopped: {}", idx, e);
            }
            RetryDecision::Terminal => {
                error!("Failed to download chunk {}: {}", idx, e);
            }
        },
    }
    schedule_downloads(ctx, &mut state);
    drop(state);
    ctx.store.notify_all();
}
