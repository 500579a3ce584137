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

//! Chunk download and decode pipeline.
//!
//! This module implements the remote half of result fetching:
//! - `ChunkPipeline`: in-order cursor that drives bounded concurrent downloads
//! - `ArrowBatches`: per-chunk fetch handles for callers that parallelize themselves
//! - `ChunkDownloader`: one fetch plus decode attempt for a single chunk
//! - `ChunkDecoder`: compression sniffing, JSON and Arrow IPC decoding
//! - `ArrowBatchHandle`: owned record batches with a leak-checking ledger

pub mod arrow_batches;
pub mod arrow_convert;
pub mod chunk_downloader;
pub(crate) mod chunk_store;
pub mod convert;
pub mod decoder;
pub(crate) mod download_workers;
pub mod json_convert;
pub mod pipeline;
pub mod raw_batch;

pub use arrow_batches::{ArrowBatch, ArrowBatches};
pub use chunk_downloader::ChunkDownloader;
pub use chunk_store::ChunkFailure;
pub use convert::ConvertOptions;
pub use decoder::{ChunkDecoder, DecodedChunk};
pub use pipeline::{ChunkPipeline, ChunkSource, Rows};
pub use raw_batch::{ArrowBatchHandle, BatchLedger};
