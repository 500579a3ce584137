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

//! ChunkPipeline: the in-order cursor over a chunked result set.
//!
//! ## Architecture
//!
//! ```text
//!                  +--------------------+
//!   start() -----> |  DownloadContext   | <--- download tasks (<= worker_count)
//!                  |  ChunkStore        |        fetch -> decode -> publish
//!                  |  (mutex + condvar) |        schedule replacement
//!                  +--------------------+
//!                            ^
//!                            | take(idx) / wait
//!   next() / next_batches() -+
//! ```
//!
//! Downloads finish in any order; the cursor always yields chunk `i` before
//! chunk `i + 1`, with the inline batch (if any) ahead of chunk 0. `next()`
//! blocks the calling thread, so async callers should drive it from
//! `spawn_blocking`.

use crate::client::ChunkFetcher;
use crate::error::{Error, Result};
use crate::reader::chunks::chunk_downloader::ChunkDownloader;
use crate::reader::chunks::chunk_store::{ChunkFailure, ChunkStore};
use crate::reader::chunks::convert::ConvertOptions;
use crate::reader::chunks::decoder::{ChunkDecoder, DecodedChunk};
use crate::reader::chunks::download_workers::{schedule_downloads, DownloadContext};
use crate::reader::chunks::raw_batch::{count_rows, ArrowBatchHandle, BatchLedger};
use crate::reader::inline::InlineBatch;
use crate::types::chunk::{ChunkAuth, ChunkDescriptor, DecodeMode, PipelineConfig, ResultFormat};
use crate::types::location::Location;
use crate::types::response::QueryResultData;
use crate::types::row_type::RowType;
use crate::types::value::ChunkRow;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// What the control plane told us about a result set's data.
#[derive(Debug, Clone)]
pub struct ChunkSource {
    pub chunks: Vec<ChunkDescriptor>,
    pub row_type: RowType,
    pub format: ResultFormat,
    pub auth: ChunkAuth,
    /// Session timezone for TIMESTAMP_LTZ.
    pub location: Location,
    pub inline: Option<InlineBatch>,
    /// Total rows the server declared across the inline batch and all chunks.
    pub total_rows: Option<u64>,
}

impl ChunkSource {
    pub fn from_response(data: &QueryResultData) -> Self {
        let timezone = data.parameter("TIMEZONE");
        Self {
            chunks: data.chunk_descriptors(),
            row_type: data.row_type(),
            format: data.result_format(),
            auth: data.chunk_auth(),
            location: Location::from_session_timezone(timezone.as_deref()),
            inline: InlineBatch::from_response(data),
            total_rows: u64::try_from(data.total).ok(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (position, chunk) in self.chunks.iter().enumerate() {
            if chunk.index != position {
                return Err(Error::invalid_argument(format!(
                    "chunk at position {} has index {}",
                    position, chunk.index
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn decoder(&self, config: &PipelineConfig, ledger: Arc<BatchLedger>) -> Result<ChunkDecoder> {
        ChunkDecoder::new(
            self.row_type.clone(),
            self.format,
            config.decode_mode,
            ConvertOptions {
                higher_precision: config.higher_precision,
                validate_utf8: config.validate_utf8,
                location: self.location,
            },
            ledger,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Active,
    Exhausted,
    Reset,
}

/// In-order cursor over the rows (or raw batches) of a result set.
#[derive(Debug)]
pub struct ChunkPipeline {
    ctx: Arc<DownloadContext>,
    row_type: RowType,
    mode: DecodeMode,
    ledger: Arc<BatchLedger>,
    inline: Option<DecodedChunk>,
    current: std::vec::IntoIter<ChunkRow>,
    next_chunk: usize,
    rows_delivered: u64,
    total_rows: Option<u64>,
    failed: Option<Error>,
    cursor: CursorState,
}

impl ChunkPipeline {
    /// Decode the inline batch and start downloading.
    ///
    /// Download tasks run on `runtime`. Cancelling `cancel` stops them and
    /// makes the cursor return [`Error::Cancelled`]; the token is not
    /// cancelled by `reset()` or drop, which use a child token.
    pub fn start(
        source: ChunkSource,
        config: &PipelineConfig,
        fetcher: Arc<dyn ChunkFetcher>,
        cancel: &CancellationToken,
        runtime: Handle,
    ) -> Result<Self> {
        source.validate()?;
        let ledger = BatchLedger::new();
        let decoder = source.decoder(config, Arc::clone(&ledger))?;
        let inline = source.inline.map(|b| b.decode(&decoder)).transpose()?;

        let worker_count = config.effective_worker_count();
        let max_resident = config.effective_max_chunks_in_memory();
        debug!(
            "Starting chunk pipeline: {} chunks, {} workers, max {} chunks in memory, max_retries={}, mode={:?}",
            source.chunks.len(),
            worker_count,
            max_resident,
            config.max_retries,
            config.decode_mode
        );

        let ctx = Arc::new(DownloadContext {
            store: ChunkStore::new(source.chunks.len()),
            chunks: source.chunks,
            downloader: ChunkDownloader::new(fetcher, &source.auth, config.request_timeout, decoder),
            worker_count,
            max_resident,
            max_retries: config.max_retries,
            cancel: cancel.child_token(),
            deadline: config.deadline,
            runtime,
        });
        {
            let mut state = ctx.store.lock();
            schedule_downloads(&ctx, &mut state);
        }

        Ok(Self {
            ctx,
            row_type: source.row_type,
            mode: config.decode_mode,
            ledger,
            inline,
            current: Vec::new().into_iter(),
            next_chunk: 0,
            rows_delivered: 0,
            total_rows: source.total_rows,
            failed: None,
            cursor: CursorState::Active,
        })
    }

    /// The next row, `Ok(None)` at the end of the result set.
    ///
    /// After an error every later call returns the same error.
    pub fn next(&mut self) -> Result<Option<ChunkRow>> {
        self.check_usable(DecodeMode::Rows)?;
        loop {
            if let Some(row) = self.current.next() {
                self.rows_delivered += 1;
                return Ok(Some(row));
            }
            match self.advance()? {
                Some(DecodedChunk::Rows(rows)) => self.current = rows.into_iter(),
                Some(DecodedChunk::Batches(_)) => {
                    return Err(Error::invalid_state("decoded raw batches in row mode"))
                }
                None => return Ok(None),
            }
        }
    }

    /// The next chunk's record batches in raw-batch mode.
    ///
    /// The caller owns the returned handles and releases them by dropping.
    pub fn next_batches(&mut self) -> Result<Option<Vec<ArrowBatchHandle>>> {
        self.check_usable(DecodeMode::RawBatches)?;
        match self.advance()? {
            Some(DecodedChunk::Batches(handles)) => {
                self.rows_delivered += count_rows(&handles) as u64;
                Ok(Some(handles))
            }
            Some(DecodedChunk::Rows(_)) => Err(Error::invalid_state("decoded rows in raw batch mode")),
            None => Ok(None),
        }
    }

    /// Iterate rows until the end or the first error.
    pub fn rows(&mut self) -> Rows<'_> {
        Rows {
            pipeline: self,
            done: false,
        }
    }

    /// Stop downloading and release every chunk held by the pipeline.
    ///
    /// Handles already returned by `next_batches()` stay valid. Any later
    /// `next()` returns [`Error::InvalidState`].
    pub fn reset(&mut self) {
        if self.cursor == CursorState::Reset {
            return;
        }
        debug!(
            "Resetting chunk pipeline after {} rows",
            self.rows_delivered
        );
        self.cursor = CursorState::Reset;
        self.current = Vec::new().into_iter();
        self.inline = None;
        self.ctx.shutdown();
    }

    pub fn rows_delivered(&self) -> u64 {
        self.rows_delivered
    }

    pub fn total_rows(&self) -> Option<u64> {
        self.total_rows
    }

    pub fn chunk_count(&self) -> usize {
        self.ctx.chunks.len()
    }

    pub fn row_type(&self) -> &RowType {
        &self.row_type
    }

    /// Ledger of raw batch handles created by this pipeline.
    pub fn ledger(&self) -> &Arc<BatchLedger> {
        &self.ledger
    }

    /// Every download failure seen so far, retried or not.
    pub fn failures(&self) -> Vec<ChunkFailure> {
        self.ctx.store.lock().failures().to_vec()
    }

    fn check_usable(&self, mode: DecodeMode) -> Result<()> {
        if self.cursor == CursorState::Reset {
            return Err(Error::invalid_state("result set was reset"));
        }
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if self.mode != mode {
            return Err(Error::invalid_state(match self.mode {
                DecodeMode::Rows => "result set decodes rows; use next()",
                DecodeMode::RawBatches => "result set decodes raw batches; use next_batches()",
            }));
        }
        Ok(())
    }

    /// The next decoded chunk in order, `None` at the end.
    fn advance(&mut self) -> Result<Option<DecodedChunk>> {
        if let Some(inline) = self.inline.take() {
            return Ok(Some(inline));
        }
        if self.next_chunk >= self.ctx.chunks.len() {
            self.finish();
            return Ok(None);
        }
        match self.wait_for_chunk(self.next_chunk) {
            Ok(chunk) => {
                self.next_chunk += 1;
                Ok(Some(chunk))
            }
            Err(e) => {
                self.failed = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Block until chunk `idx` is decoded or the result set fails.
    ///
    /// A chunk that already arrived is delivered even if a later chunk has
    /// failed, so every row before the failing chunk reaches the caller.
    fn wait_for_chunk(&self, idx: usize) -> Result<DecodedChunk> {
        let mut state = self.ctx.store.lock();
        state.wanted = idx;
        schedule_downloads(&self.ctx, &mut state);
        loop {
            if let Some(chunk) = state.take(idx) {
                // a resident slot just freed up
                schedule_downloads(&self.ctx, &mut state);
                return Ok(chunk);
            }
            if let Some(err) = state.terminal() {
                return Err(err.clone());
            }
            if state.is_closed() {
                return Err(Error::invalid_state("chunk pipeline is closed"));
            }
            trace!(
                "Waiting for chunk {} ({} in flight, {} resident)",
                idx,
                state.in_flight,
                state.resident()
            );
            self.ctx.store.wait(&mut state);
        }
    }

    fn finish(&mut self) {
        if self.cursor != CursorState::Active {
            return;
        }
        self.cursor = CursorState::Exhausted;
        match self.total_rows {
            Some(total) if total != self.rows_delivered => warn!(
                "Result set ended after {} rows, server declared {}",
                self.rows_delivered, total
            ),
            _ => debug!("No more chunks; {} rows delivered", self.rows_delivered),
        }
    }
}

impl Drop for ChunkPipeline {
    fn drop(&mut self) {
        self.ctx.shutdown();
    }
}

/// Row iterator over a [`ChunkPipeline`]; stops after the first error.
#[derive(Debug)]
pub struct Rows<'a> {
    pipeline: &'a mut ChunkPipeline,
    done: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<ChunkRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.pipeline.next() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
