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

//! Chunk body decoding.
//!
//! A chunk body is either a JSON rowset fragment or an Arrow IPC stream, and
//! may be gzip- or LZ4-frame-compressed. Compression is detected from the
//! leading bytes, not from response headers:
//!
//! ```text
//!   body --sniff--> [gzip | lz4 | plain] --> JSON rows   --> Vec<ChunkRow>
//!                                        \-> Arrow IPC   --> Vec<ChunkRow>
//!                                                        \-> Vec<ArrowBatchHandle>
//! ```
//!
//! JSON chunk bodies are a comma-separated list of row arrays without the
//! enclosing brackets. [`BracketedReader`] adds them while streaming so the
//! body is never copied just to make it a valid JSON document.

use crate::error::{Error, Result};
use crate::reader::chunks::arrow_convert::batch_to_rows;
use crate::reader::chunks::convert::ConvertOptions;
use crate::reader::chunks::json_convert::json_rows_to_values;
use crate::reader::chunks::raw_batch::{
    count_rows, validate_batch_metadata, ArrowBatchHandle, BatchLedger,
};
use crate::types::chunk::{DecodeMode, ResultFormat};
use crate::types::row_type::RowType;
use crate::types::value::ChunkRow;
use arrow_array::RecordBatch;
use arrow_ipc::reader::StreamReader;
use flate2::read::MultiGzDecoder;
use lz4_flex::frame::FrameDecoder;
use std::io::{self, Read};
use std::sync::Arc;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const LZ4_FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4d, 0x18];

/// Compression detected from a body's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCompression {
    None,
    Gzip,
    Lz4Frame,
}

impl BodyCompression {
    pub fn detect(body: &[u8]) -> Self {
        if body.starts_with(&GZIP_MAGIC) {
            BodyCompression::Gzip
        } else if body.starts_with(&LZ4_FRAME_MAGIC) {
            BodyCompression::Lz4Frame
        } else {
            BodyCompression::None
        }
    }
}

/// A reader over the decompressed body.
pub fn decompressed_reader(body: &[u8]) -> Box<dyn Read + Send + '_> {
    match BodyCompression::detect(body) {
        BodyCompression::Gzip => Box::new(MultiGzDecoder::new(body)),
        BodyCompression::Lz4Frame => Box::new(FrameDecoder::new(body)),
        BodyCompression::None => Box::new(body),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BracketState {
    NotStarted,
    Streaming,
    /// Inner reader exhausted, closing bracket not yet emitted.
    AppendedTail,
    Done,
}

/// Wraps a reader so its bytes are emitted between `[` and `]`.
#[derive(Debug)]
pub struct BracketedReader<R> {
    inner: R,
    state: BracketState,
}

impl<R: Read> BracketedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: BracketState::NotStarted,
        }
    }
}

impl<R: Read> Read for BracketedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                BracketState::NotStarted => {
                    buf[0] = b'[';
                    self.state = BracketState::Streaming;
                    return Ok(1);
                }
                BracketState::Streaming => {
                    let n = self.inner.read(buf)?;
                    if n > 0 {
                        return Ok(n);
                    }
                    self.state = BracketState::AppendedTail;
                }
                BracketState::AppendedTail => {
                    buf[0] = b']';
                    self.state = BracketState::Done;
                    return Ok(1);
                }
                BracketState::Done => return Ok(0),
            }
        }
    }
}

/// Parse a bracket-less JSON rowset fragment.
pub fn parse_json_rows<R: Read>(reader: R) -> Result<Vec<Vec<Option<String>>>> {
    let reader = io::BufReader::new(BracketedReader::new(reader));
    Ok(serde_json::from_reader(reader)?)
}

/// Read every record batch from an Arrow IPC stream.
pub fn parse_arrow_ipc<R: Read>(reader: R) -> Result<Vec<RecordBatch>> {
    let reader = StreamReader::try_new(reader, None)
        .map_err(|e| Error::decode(format!("Failed to create Arrow IPC reader: {}", e)))?;
    reader
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::decode(format!("Failed to read Arrow batches: {}", e)))
}

/// Output of decoding one chunk.
#[derive(Debug)]
pub enum DecodedChunk {
    Rows(Vec<ChunkRow>),
    Batches(Vec<ArrowBatchHandle>),
}

impl DecodedChunk {
    pub fn row_count(&self) -> usize {
        match self {
            DecodedChunk::Rows(rows) => rows.len(),
            DecodedChunk::Batches(handles) => count_rows(handles),
        }
    }
}

/// Decodes chunk bodies of one result set.
///
/// Cheap to clone; every worker holds one.
#[derive(Debug, Clone)]
pub struct ChunkDecoder {
    row_type: RowType,
    format: ResultFormat,
    mode: DecodeMode,
    options: ConvertOptions,
    ledger: Arc<BatchLedger>,
}

impl ChunkDecoder {
    pub fn new(
        row_type: RowType,
        format: ResultFormat,
        mode: DecodeMode,
        options: ConvertOptions,
        ledger: Arc<BatchLedger>,
    ) -> Result<Self> {
        if mode == DecodeMode::RawBatches && format != ResultFormat::Arrow {
            return Err(Error::invalid_argument(
                "raw batch mode requires the Arrow result format",
            ));
        }
        Ok(Self {
            row_type,
            format,
            mode,
            options,
            ledger,
        })
    }

    pub fn row_type(&self) -> &RowType {
        &self.row_type
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn ledger(&self) -> &Arc<BatchLedger> {
        &self.ledger
    }

    /// Decode a (possibly compressed) chunk body.
    pub fn decode(&self, body: &[u8]) -> Result<DecodedChunk> {
        let reader = decompressed_reader(body);
        match self.format {
            ResultFormat::Json => self.decode_json_rows(parse_json_rows(reader)?),
            ResultFormat::Arrow => self.decode_batches(parse_arrow_ipc(reader)?),
        }
    }

    pub fn decode_json_rows(&self, raw: Vec<Vec<Option<String>>>) -> Result<DecodedChunk> {
        let rows = json_rows_to_values(raw, &self.row_type, &self.options)?;
        Ok(DecodedChunk::Rows(rows))
    }

    pub fn decode_batches(&self, batches: Vec<RecordBatch>) -> Result<DecodedChunk> {
        match self.mode {
            DecodeMode::Rows => {
                let mut rows = Vec::new();
                for batch in &batches {
                    rows.extend(batch_to_rows(batch, &self.row_type, &self.options)?);
                }
                Ok(DecodedChunk::Rows(rows))
            }
            DecodeMode::RawBatches => {
                let mut handles = Vec::with_capacity(batches.len());
                for batch in batches {
                    validate_batch_metadata(&batch.schema(), &self.row_type)?;
                    handles.push(ArrowBatchHandle::new(batch, &self.ledger));
                }
                Ok(DecodedChunk::Batches(handles))
            }
        }
    }
}
