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

//! The first batch of a result set, sent inline with the query response.

use crate::error::Result;
use crate::reader::chunks::decoder::{
    decompressed_reader, parse_arrow_ipc, ChunkDecoder, DecodedChunk,
};
use crate::types::chunk::{DecodeMode, ResultFormat};
use crate::types::response::QueryResultData;
use tracing::debug;

/// Rows delivered before chunk 0.
///
/// Unlike remote chunks, the inline batch needs no download: it is decoded
/// once when the result set is opened and yielded first.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineBatch {
    /// JSON `rowset`.
    Json(Vec<Vec<Option<String>>>),
    /// Arrow IPC stream from `rowsetBase64`, already base64-decoded.
    Arrow(Vec<u8>),
}

impl InlineBatch {
    /// Pick the inline batch matching the result format, if the response has one.
    pub fn from_response(data: &QueryResultData) -> Option<Self> {
        match data.result_format() {
            ResultFormat::Arrow => data
                .row_set_base64
                .as_ref()
                .filter(|bytes| !bytes.is_empty())
                .map(|bytes| InlineBatch::Arrow(bytes.clone())),
            ResultFormat::Json => data
                .row_set
                .as_ref()
                .filter(|rows| !rows.is_empty())
                .map(|rows| InlineBatch::Json(rows.clone())),
        }
    }

    pub fn decode(self, decoder: &ChunkDecoder) -> Result<DecodedChunk> {
        match self {
            InlineBatch::Json(rows) => {
                debug!("Decoding inline JSON rowset: {} rows", rows.len());
                decoder.decode_json_rows(rows)
            }
            InlineBatch::Arrow(bytes) if bytes.is_empty() => Ok(match decoder.mode() {
                DecodeMode::Rows => DecodedChunk::Rows(Vec::new()),
                DecodeMode::RawBatches => DecodedChunk::Batches(Vec::new()),
            }),
            InlineBatch::Arrow(bytes) => {
                debug!("Decoding inline Arrow rowset: {} bytes", bytes.len());
                let batches = parse_arrow_ipc(decompressed_reader(&bytes))?;
                decoder.decode_batches(batches)
            }
        }
    }
}
