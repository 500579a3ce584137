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

//! Chunk-specific types for the download pipeline.
//!
//! These types describe the remote chunks of one result set, how to
//! authenticate against the storage that hosts them, and how the pipeline
//! that downloads them is configured.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// SSE-C algorithm header sent with QRMK-authenticated chunk requests.
pub const HEADER_SSE_C_ALGORITHM: &str = "x-amz-server-side-encryption-customer-algorithm";
/// SSE-C key header carrying the QRMK.
pub const HEADER_SSE_C_KEY: &str = "x-amz-server-side-encryption-customer-key";
/// SSE-C algorithm value.
pub const HEADER_SSE_C_AES: &str = "AES256";

/// Worker count used when none is configured or the configured one is invalid.
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Number of chunk failures across a result set after which the pipeline gives up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Server parameter that carries the worker count.
pub const CLIENT_PREFETCH_THREADS: &str = "CLIENT_PREFETCH_THREADS";

/// Metadata for one remote chunk. Immutable once built from the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Position of this chunk in the result set.
    pub index: usize,
    /// Pre-signed URL hosting the chunk body.
    pub url: String,
    /// Number of rows the server declared for this chunk.
    pub row_count: usize,
    pub uncompressed_size: i64,
    /// Compressed body size, when the server reported it.
    pub compressed_size: Option<i64>,
}

/// Wire format of the result set, declared once for all chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFormat {
    #[default]
    Json,
    Arrow,
}

impl ResultFormat {
    /// Parse the control-plane `queryResultFormat` field. Anything other than
    /// `arrow` is JSON.
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some(n) if n.eq_ignore_ascii_case("arrow") => ResultFormat::Arrow,
            _ => ResultFormat::Json,
        }
    }
}

/// How chunk requests are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkAuth {
    /// Per-result-set key, sent as SSE-C headers.
    Qrmk(String),
    /// Explicit headers to send verbatim.
    Headers(HashMap<String, String>),
}

impl ChunkAuth {
    /// Pick the authentication scheme from the control-plane fields. Custom
    /// headers win when present.
    pub fn from_response(qrmk: Option<&str>, chunk_headers: &HashMap<String, String>) -> Self {
        if !chunk_headers.is_empty() {
            ChunkAuth::Headers(chunk_headers.clone())
        } else {
            ChunkAuth::Qrmk(qrmk.unwrap_or_default().to_string())
        }
    }

    /// Headers to attach to every chunk request.
    pub fn headers(&self) -> HashMap<String, String> {
        match self {
            ChunkAuth::Qrmk(key) => HashMap::from([
                (HEADER_SSE_C_ALGORITHM.to_string(), HEADER_SSE_C_AES.to_string()),
                (HEADER_SSE_C_KEY.to_string(), key.clone()),
            ]),
            ChunkAuth::Headers(headers) => headers.clone(),
        }
    }
}

/// Whether decoded chunks are materialized into rows or kept as Arrow batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    #[default]
    Rows,
    RawBatches,
}

/// Download progress of a single chunk index.
///
/// ```text
///   Pending -> InFlight -> Done -> Consumed
///   InFlight -> Failed(n) -> Pending     (retryable, budget left)
///   InFlight -> Failed(n)                (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Pending,
    InFlight,
    Done,
    /// Failed; carries the number of failures seen for this chunk so far.
    Failed(u32),
    /// Handed to the cursor and detached from the store.
    Consumed,
}

/// Configuration for the chunk pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of chunks downloaded concurrently.
    pub worker_count: usize,
    /// Failures tolerated across the whole result set; the `max_retries`-th
    /// failure is terminal.
    pub max_retries: u32,
    /// Upper bound on chunks that are in flight or decoded but not yet consumed.
    pub max_chunks_in_memory: usize,
    /// Timeout handed to the fetch collaborator for each request.
    pub request_timeout: Duration,
    /// Keep FIXED and DECFLOAT values exact instead of converting to `f64`/`i64`.
    pub higher_precision: bool,
    /// Replace invalid UTF-8 in binary-encoded text with U+FFFD instead of failing.
    pub validate_utf8: bool,
    /// Rows or raw Arrow batches.
    pub decode_mode: DecodeMode,
    /// Absolute deadline for the whole result set.
    pub deadline: Option<Instant>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            max_retries: DEFAULT_MAX_RETRIES,
            max_chunks_in_memory: 16,
            request_timeout: Duration::from_secs(60),
            higher_precision: false,
            validate_utf8: false,
            decode_mode: DecodeMode::Rows,
            deadline: None,
        }
    }
}

impl PipelineConfig {
    /// Worker budget with invalid values clamped to the default.
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count == 0 {
            warn!(
                "invalid worker count 0. It should be a positive integer. Defaulting to {}",
                DEFAULT_WORKER_COUNT
            );
            DEFAULT_WORKER_COUNT
        } else {
            self.worker_count
        }
    }

    /// Memory bound, never below the worker budget.
    pub fn effective_max_chunks_in_memory(&self) -> usize {
        self.max_chunks_in_memory.max(self.effective_worker_count())
    }

    /// Apply a string option.
    ///
    /// | Key | Value |
    /// |---|---|
    /// | `warehouse.chunks.worker_count`, `CLIENT_PREFETCH_THREADS` | positive integer |
    /// | `warehouse.chunks.max_retries` | integer |
    /// | `warehouse.chunks.max_chunks_in_memory` | integer |
    /// | `warehouse.chunks.request_timeout_ms` | integer |
    /// | `warehouse.chunks.higher_precision` | boolean |
    /// | `warehouse.chunks.validate_utf8` | boolean |
    /// | `warehouse.chunks.raw_batches` | boolean |
    ///
    /// A worker count that is not a positive integer falls back to the default
    /// with a warning, matching how the server parameter has always been
    /// treated. Other malformed values are rejected.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "warehouse.chunks.worker_count" | CLIENT_PREFETCH_THREADS => {
                self.worker_count = match value.trim().parse::<i64>() {
                    Ok(n) if n > 0 => n as usize,
                    Ok(n) => {
                        warn!(
                            "invalid value for {}: {}. It should be a positive integer. Defaulting to {}",
                            key, n, DEFAULT_WORKER_COUNT
                        );
                        DEFAULT_WORKER_COUNT
                    }
                    Err(_) => {
                        warn!("invalid value for {}: {}", key, value);
                        DEFAULT_WORKER_COUNT
                    }
                };
                Ok(())
            }
            "warehouse.chunks.max_retries" => {
                self.max_retries = parse_int(key, value)?;
                Ok(())
            }
            "warehouse.chunks.max_chunks_in_memory" => {
                self.max_chunks_in_memory = parse_int(key, value)?;
                Ok(())
            }
            "warehouse.chunks.request_timeout_ms" => {
                self.request_timeout = Duration::from_millis(parse_int(key, value)?);
                Ok(())
            }
            "warehouse.chunks.higher_precision" => {
                self.higher_precision = parse_bool(key, value)?;
                Ok(())
            }
            "warehouse.chunks.validate_utf8" => {
                self.validate_utf8 = parse_bool(key, value)?;
                Ok(())
            }
            "warehouse.chunks.raw_batches" => {
                self.decode_mode = if parse_bool(key, value)? {
                    DecodeMode::RawBatches
                } else {
                    DecodeMode::Rows
                };
                Ok(())
            }
            _ => Err(Error::invalid_argument(format!("unknown option: {}", key))),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(Error::invalid_argument(format!(
            "invalid boolean for {}: {}",
            key, value
        ))),
    }
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_argument(format!("invalid integer for {}: {}", key, value)))
}
