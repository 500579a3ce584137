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

//! Chunked result-set download and decode pipeline for a cloud data
//! warehouse client.
//!
//! ## Overview
//!
//! Large query results arrive as a small inline batch plus a list of remote
//! chunks, each hosted at its own pre-signed URL. This crate downloads those
//! chunks concurrently and hands them back in order:
//! - [`ChunkPipeline`] - Cursor yielding typed rows (or raw Arrow batches) in order
//! - [`ArrowBatches`] - Per-chunk fetch handles for callers that schedule downloads themselves
//! - [`ChunkFetcher`] - Injected transport; [`HttpChunkFetcher`] is the reqwest default
//! - [`ResultSetFactory`] - Opens either of the above from a query response
//!
//! ## Features
//!
//! - **Bounded concurrency**: at most `worker_count` downloads and
//!   `max_chunks_in_memory` undelivered chunks at a time
//! - **Global retry budget**: transport failures are retried until the result
//!   set has seen `max_retries` failures
//! - **JSON and Arrow IPC**: gzip and LZ4-frame bodies are detected automatically
//!
//! ## Example
//!
//! ```ignore
//! use warehouse_chunks::{HttpChunkFetcher, HttpClientConfig, PipelineConfig, ResultSetFactory};
//! use tokio_util::sync::CancellationToken;
//!
//! let fetcher = Arc::new(HttpChunkFetcher::new(HttpClientConfig::default())?);
//! let factory = ResultSetFactory::new(fetcher, PipelineConfig::default(), runtime.handle().clone());
//! let mut rows = factory.open(&query_result, &CancellationToken::new())?;
//! while let Some(row) = rows.next()? {
//!     println!("{:?}", row);
//! }
//! ```
//!
//! ## Configuration Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `warehouse.chunks.worker_count` | 10 | Concurrent downloads (`CLIENT_PREFETCH_THREADS` from the server overrides it) |
//! | `warehouse.chunks.max_retries` | 5 | Failures tolerated per result set |
//! | `warehouse.chunks.max_chunks_in_memory` | 16 | In-flight plus undelivered chunks |
//! | `warehouse.chunks.request_timeout_ms` | 60000 | Per-request timeout |
//! | `warehouse.chunks.higher_precision` | false | Exact FIXED and DECFLOAT values |
//! | `warehouse.chunks.validate_utf8` | false | Replace invalid UTF-8 instead of failing |
//! | `warehouse.chunks.raw_batches` | false | Yield Arrow record batches instead of rows |

pub mod client;
pub mod error;
pub mod logging;
pub mod reader;
pub mod types;

// Re-export main types
pub use error::{Error, Result};
pub use reader::chunks::{
    ArrowBatch, ArrowBatchHandle, ArrowBatches, BatchLedger, ChunkPipeline, ChunkSource,
};
pub use reader::ResultSetFactory;

// Re-export client types for advanced users
pub use client::{ChunkFetcher, FetchResponse, HttpChunkFetcher, HttpClientConfig};

// Re-export configuration types
pub use types::{PipelineConfig, QueryResultData};
