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

//! Bulk access to a result set as independently fetchable Arrow batches.
//!
//! No download workers run here. Each [`ArrowBatch`] downloads and decodes
//! its own chunk when the caller asks, so callers can fan the fetches out
//! however they like.

use crate::client::ChunkFetcher;
use crate::error::{Error, Result};
use crate::reader::chunks::chunk_downloader::ChunkDownloader;
use crate::reader::chunks::decoder::DecodedChunk;
use crate::reader::chunks::pipeline::ChunkSource;
use crate::reader::chunks::raw_batch::{count_rows, ArrowBatchHandle, BatchLedger};
use crate::types::chunk::{ChunkDescriptor, DecodeMode, PipelineConfig, ResultFormat};
use crate::types::location::Location;
use crate::types::row_type::RowType;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// All batches of one Arrow result set: the inline batch first, then one per chunk.
#[derive(Debug)]
pub struct ArrowBatches {
    batches: Vec<ArrowBatch>,
    row_type: RowType,
    ledger: Arc<BatchLedger>,
}

impl ArrowBatches {
    pub fn new(
        source: ChunkSource,
        config: &PipelineConfig,
        fetcher: Arc<dyn ChunkFetcher>,
    ) -> Result<Self> {
        if source.format != ResultFormat::Arrow {
            return Err(Error::invalid_argument(
                "Arrow batches require an Arrow result set",
            ));
        }
        source.validate()?;

        let ledger = BatchLedger::new();
        let raw_config = PipelineConfig {
            decode_mode: DecodeMode::RawBatches,
            ..config.clone()
        };
        let decoder = source.decoder(&raw_config, Arc::clone(&ledger))?;
        let downloader = Arc::new(ChunkDownloader::new(
            fetcher,
            &source.auth,
            config.request_timeout,
            decoder,
        ));

        let mut batches = Vec::with_capacity(source.chunks.len() + 1);
        if let Some(inline) = source.inline {
            let records = match inline.decode(downloader.decoder())? {
                DecodedChunk::Batches(handles) => handles,
                DecodedChunk::Rows(_) => {
                    return Err(Error::invalid_state("inline batch decoded as rows"))
                }
            };
            batches.push(ArrowBatch {
                chunk: None,
                row_count: count_rows(&records),
                records: Some(records),
                fetched: false,
                location: source.location,
                downloader: Arc::clone(&downloader),
                deadline: config.deadline,
            });
        }
        for chunk in source.chunks {
            batches.push(ArrowBatch {
                row_count: chunk.row_count,
                chunk: Some(chunk),
                records: None,
                fetched: false,
                location: source.location,
                downloader: Arc::clone(&downloader),
                deadline: config.deadline,
            });
        }
        debug!("Prepared {} Arrow batches", batches.len());

        Ok(Self {
            batches,
            row_type: source.row_type,
            ledger,
        })
    }

    pub fn row_type(&self) -> &RowType {
        &self.row_type
    }

    pub fn ledger(&self) -> &Arc<BatchLedger> {
        &self.ledger
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batches_mut(&mut self) -> &mut [ArrowBatch] {
        &mut self.batches
    }

    pub fn into_batches(self) -> Vec<ArrowBatch> {
        self.batches
    }
}

/// One lazily fetched batch.
#[derive(Debug)]
pub struct ArrowBatch {
    /// `None` for the inline batch.
    chunk: Option<ChunkDescriptor>,
    records: Option<Vec<ArrowBatchHandle>>,
    fetched: bool,
    row_count: usize,
    location: Location,
    downloader: Arc<ChunkDownloader>,
    deadline: Option<Instant>,
}

impl ArrowBatch {
    /// Rows the server declared for this batch.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Session timezone the batch's TIMESTAMP_LTZ values belong to.
    pub fn location(&self) -> Location {
        self.location
    }

    pub fn chunk_index(&self) -> Option<usize> {
        self.chunk.as_ref().map(|c| c.index)
    }

    /// Download and decode this batch, handing the records to the caller.
    ///
    /// Can be called once; a second call returns [`Error::InvalidState`].
    pub async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Vec<ArrowBatchHandle>> {
        if self.fetched {
            return Err(Error::invalid_state("batch was already fetched"));
        }
        if let Some(records) = self.records.take() {
            self.fetched = true;
            return Ok(records);
        }
        let Some(chunk) = &self.chunk else {
            return Err(Error::invalid_state("batch has no records"));
        };

        let download = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::cancelled().with_chunk_index(chunk.index)),
                result = self.downloader.download(chunk, cancel) => result,
            }
        };
        let decoded = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, download)
                .await
                .unwrap_or_else(|_| Err(Error::deadline_exceeded().with_chunk_index(chunk.index))),
            None => download.await,
        }?;

        match decoded {
            DecodedChunk::Batches(handles) => {
                self.fetched = true;
                Ok(handles)
            }
            DecodedChunk::Rows(_) => Err(Error::invalid_state("chunk decoded as rows")),
        }
    }
}
