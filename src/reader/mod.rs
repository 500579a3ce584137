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

//! Result readers for chunked query results.
//!
//! This module provides:
//! - `ResultSetFactory`: opens a cursor or batch accessor from a query response
//! - `ChunkPipeline`: streams rows by downloading chunks in the background
//! - `InlineBatch`: the first batch embedded in the response itself

pub mod chunks;
pub mod inline;

use crate::client::ChunkFetcher;
use crate::error::Result;
use crate::reader::chunks::arrow_batches::ArrowBatches;
use crate::reader::chunks::pipeline::{ChunkPipeline, ChunkSource};
use crate::types::chunk::{PipelineConfig, CLIENT_PREFETCH_THREADS};
use crate::types::response::QueryResultData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use chunks::{ArrowBatch, ArrowBatchHandle, ChunkFailure, DecodedChunk, Rows};
pub use inline::InlineBatch;

/// Opens result sets from query responses.
///
/// Holds the fetch collaborator and the connection-level configuration;
/// server parameters in each response may override parts of it.
#[derive(Debug, Clone)]
pub struct ResultSetFactory {
    fetcher: Arc<dyn ChunkFetcher>,
    config: PipelineConfig,
    runtime_handle: tokio::runtime::Handle,
}

impl ResultSetFactory {
    pub fn new(
        fetcher: Arc<dyn ChunkFetcher>,
        config: PipelineConfig,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        Self {
            fetcher,
            config,
            runtime_handle,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start a row cursor over the response's result set.
    pub fn open(
        &self,
        data: &QueryResultData,
        cancel: &CancellationToken,
    ) -> Result<ChunkPipeline> {
        let config = self.config_for(data)?;
        let source = ChunkSource::from_response(data);
        tracing::debug!(
            "Opening result set {}: format={:?}, chunks={}, inline={}, total={:?}",
            data.query_id.as_deref().unwrap_or("<unknown>"),
            source.format,
            source.chunks.len(),
            source.inline.is_some(),
            source.total_rows
        );
        ChunkPipeline::start(
            source,
            &config,
            Arc::clone(&self.fetcher),
            cancel,
            self.runtime_handle.clone(),
        )
    }

    /// Expose the response's result set as lazily fetched Arrow batches.
    pub fn arrow_batches(&self, data: &QueryResultData) -> Result<ArrowBatches> {
        let config = self.config_for(data)?;
        ArrowBatches::new(
            ChunkSource::from_response(data),
            &config,
            Arc::clone(&self.fetcher),
        )
    }

    fn config_for(&self, data: &QueryResultData) -> Result<PipelineConfig> {
        let mut config = self.config.clone();
        if let Some(threads) = data.parameter(CLIENT_PREFETCH_THREADS) {
            config.set_option(CLIENT_PREFETCH_THREADS, &threads)?;
        }
        Ok(config)
    }
}
