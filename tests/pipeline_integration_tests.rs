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

//! Integration tests for the chunk pipeline.
//!
//! These tests drive `ChunkPipeline` end to end through a scripted fetcher:
//! - Ordering: rows come out in chunk order whatever order downloads finish in
//! - Retries: transient failures are retried until the global budget runs out
//! - Cancellation and deadlines: terminal, surfaced after the rows before them
//! - Decoding: JSON, Arrow and gzip bodies of the same data agree
//! - Raw batches: metadata checks and handle release at reset
//!
//! ## Pipeline Architecture
//!
//! ```text
//! [MockChunkFetcher] <- download tasks -> [ChunkStore] <- next() (spawn_blocking)
//! ```

use arrow_array::{BooleanArray, Date32Array, Int64Array, RecordBatch, StringArray};
use arrow_ipc::writer::StreamWriter;
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use warehouse_chunks::error::{Error, Result};
use warehouse_chunks::reader::chunks::{ArrowBatchHandle, ChunkPipeline, ChunkSource};
use warehouse_chunks::reader::inline::InlineBatch;
use warehouse_chunks::types::{
    ChunkAuth, ChunkDescriptor, ColumnType, DecodeMode, Location, LogicalType, PipelineConfig,
    QueryResultData, ResultFormat, RowType, Value,
};
use warehouse_chunks::{ChunkFetcher, FetchResponse, ResultSetFactory};

// =============================================================================
// Test Helpers
// =============================================================================

/// Fetcher serving canned bodies with scripted failures, delays and stalls.
#[derive(Debug, Default)]
struct MockChunkFetcher {
    bodies: HashMap<String, Bytes>,
    /// Remaining HTTP 503 responses per URL.
    failures: Mutex<HashMap<String, u32>>,
    delays: HashMap<String, Duration>,
    /// URLs that never answer until the request is cancelled.
    stalled: HashSet<String>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
}

impl MockChunkFetcher {
    fn new(bodies: Vec<Bytes>) -> Self {
        Self {
            bodies: bodies
                .into_iter()
                .enumerate()
                .map(|(i, body)| (chunk_url(i), body))
                .collect(),
            ..Default::default()
        }
    }

    fn fail(self, chunk: usize, times: u32) -> Self {
        self.failures.lock().unwrap().insert(chunk_url(chunk), times);
        self
    }

    fn delay(mut self, chunk: usize, delay: Duration) -> Self {
        self.delays.insert(chunk_url(chunk), delay);
        self
    }

    fn stall(mut self, chunk: usize) -> Self {
        self.stalled.insert(chunk_url(chunk));
        self
    }

    fn calls_for(&self, chunk: usize) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&chunk_url(chunk))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChunkFetcher for MockChunkFetcher {
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        url: &str,
        _headers: &HashMap<String, String>,
        _timeout: Duration,
    ) -> Result<FetchResponse> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

        if self.stalled.contains(url) {
            cancel.cancelled().await;
            return Err(Error::cancelled());
        }
        if let Some(delay) = self.delays.get(url) {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::cancelled()),
                _ = tokio::time::sleep(*delay) => {}
            }
        }
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(FetchResponse {
                        status: 503,
                        body: Bytes::from_static(b"slow down"),
                    });
                }
            }
        }
        match self.bodies.get(url) {
            Some(body) => Ok(FetchResponse::ok(body.clone())),
            None => Ok(FetchResponse {
                status: 404,
                body: Bytes::new(),
            }),
        }
    }
}

fn chunk_url(index: usize) -> String {
    format!("https://storage.example.com/results/chunk_{}?sig=abc", index)
}

fn descriptors(row_counts: &[usize]) -> Vec<ChunkDescriptor> {
    row_counts
        .iter()
        .enumerate()
        .map(|(index, &row_count)| ChunkDescriptor {
            index,
            url: chunk_url(index),
            row_count,
            uncompressed_size: 1024,
            compressed_size: None,
        })
        .collect()
}

fn number_row_type() -> RowType {
    RowType::new(vec![ColumnType::new("N", LogicalType::Fixed)])
}

/// `chunks` chunks of `rows` rows each, numbered consecutively from 0.
fn numbered_json_chunks(chunks: usize, rows: usize) -> Vec<Bytes> {
    (0..chunks)
        .map(|c| {
            let body = (0..rows)
                .map(|r| format!("[\"{}\"]", c * rows + r))
                .collect::<Vec<_>>()
                .join(",");
            Bytes::from(body)
        })
        .collect()
}

fn json_source(chunks: usize, rows: usize) -> ChunkSource {
    ChunkSource {
        chunks: descriptors(&vec![rows; chunks]),
        row_type: number_row_type(),
        format: ResultFormat::Json,
        auth: ChunkAuth::Qrmk("qrmk".to_string()),
        location: Location::Utc,
        inline: None,
        total_rows: Some((chunks * rows) as u64),
    }
}

fn start(
    source: ChunkSource,
    config: &PipelineConfig,
    fetcher: Arc<MockChunkFetcher>,
    cancel: &CancellationToken,
) -> ChunkPipeline {
    ChunkPipeline::start(source, config, fetcher, cancel, Handle::current()).unwrap()
}

/// Drain the cursor on a blocking thread. Returns the rows and the error that stopped it.
async fn drain(mut pipeline: ChunkPipeline) -> (Vec<Vec<Value>>, Option<Error>, ChunkPipeline) {
    tokio::task::spawn_blocking(move || {
        let mut rows = Vec::new();
        let err = loop {
            match pipeline.next() {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break None,
                Err(e) => break Some(e),
            }
        };
        (rows, err, pipeline)
    })
    .await
    .unwrap()
}

fn ints(rows: &[Vec<Value>]) -> Vec<i64> {
    rows.iter().map(|r| r[0].as_i64().unwrap()).collect()
}

fn arrow_ipc(batch: &RecordBatch) -> Bytes {
    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, &batch.schema()).unwrap();
        writer.write(batch).unwrap();
        writer.finish().unwrap();
    }
    Bytes::from(buffer)
}

fn number_batch(values: Vec<i64>) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("N", DataType::Int64, true)]));
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap()
}

fn gzip(body: &[u8]) -> Bytes {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).unwrap();
    Bytes::from(encoder.finish().unwrap())
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_chunks_two_rows_each() {
    let fetcher = Arc::new(MockChunkFetcher::new(numbered_json_chunks(3, 2)));
    let pipeline = start(
        json_source(3, 2),
        &PipelineConfig::default(),
        fetcher.clone(),
        &CancellationToken::new(),
    );

    let (rows, err, mut pipeline) = drain(pipeline).await;
    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(ints(&rows), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(pipeline.rows_delivered(), 6);
    assert_eq!(pipeline.total_rows(), Some(6));
    assert_eq!(fetcher.total_calls.load(Ordering::SeqCst), 3);

    // end of data is sticky
    assert_eq!(pipeline.next().unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shuffled_completion_keeps_order() {
    let chunk_count = 12;
    let mut fetcher = MockChunkFetcher::new(numbered_json_chunks(chunk_count, 3));
    {
        let mut rng = rand::thread_rng();
        for chunk in 0..chunk_count {
            fetcher = fetcher.delay(chunk, Duration::from_millis(rng.gen_range(0..40)));
        }
    }
    let config = PipelineConfig {
        worker_count: 4,
        max_chunks_in_memory: 6,
        ..Default::default()
    };

    let pipeline = start(
        json_source(chunk_count, 3),
        &config,
        Arc::new(fetcher),
        &CancellationToken::new(),
    );
    let (rows, err, _) = drain(pipeline).await;
    assert!(err.is_none());
    assert_eq!(ints(&rows), (0..36).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_inline_batch_counts_toward_total() {
    let mut source = json_source(2, 2);
    source.inline = Some(InlineBatch::Json(vec![
        vec![Some("-2".to_string())],
        vec![Some("-1".to_string())],
    ]));
    source.total_rows = Some(6);

    let fetcher = Arc::new(MockChunkFetcher::new(numbered_json_chunks(2, 2)));
    let pipeline = start(
        source,
        &PipelineConfig::default(),
        fetcher,
        &CancellationToken::new(),
    );
    let (rows, err, pipeline) = drain(pipeline).await;
    assert!(err.is_none());
    assert_eq!(ints(&rows), vec![-2, -1, 0, 1, 2, 3]);
    assert_eq!(pipeline.rows_delivered(), pipeline.total_rows().unwrap());
}

// =============================================================================
// Retries
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transient_failures_recover() {
    let clean = Arc::new(MockChunkFetcher::new(numbered_json_chunks(4, 2)));
    let (expected, _, _) = drain(start(
        json_source(4, 2),
        &PipelineConfig::default(),
        clean,
        &CancellationToken::new(),
    ))
    .await;

    let flaky = Arc::new(MockChunkFetcher::new(numbered_json_chunks(4, 2)).fail(2, 2));
    let (rows, err, pipeline) = drain(start(
        json_source(4, 2),
        &PipelineConfig::default(),
        flaky.clone(),
        &CancellationToken::new(),
    ))
    .await;

    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(rows, expected);
    assert_eq!(flaky.calls_for(2), 3);

    let failures = pipeline.failures();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.chunk_index == 2));
    assert_eq!(failures[1].attempt, 2);
    assert_eq!(failures[0].error.status(), Some(503));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exhausted_retries_surface_after_preceding_rows() {
    let fetcher = Arc::new(MockChunkFetcher::new(numbered_json_chunks(3, 2)).fail(1, 100));
    let config = PipelineConfig {
        worker_count: 1,
        max_retries: 3,
        ..Default::default()
    };
    let (rows, err, mut pipeline) = drain(start(
        json_source(3, 2),
        &config,
        fetcher.clone(),
        &CancellationToken::new(),
    ))
    .await;

    assert_eq!(ints(&rows), vec![0, 1]);
    let err = err.expect("result set should fail");
    assert!(matches!(err, Error::Transport { .. }));
    assert_eq!(err.chunk_index(), Some(1));
    assert_eq!(err.status(), Some(503));
    assert_eq!(fetcher.calls_for(1), 3);
    assert_eq!(fetcher.calls_for(2), 0);
    assert_eq!(pipeline.failures().len(), 3);

    // the same error keeps coming back
    assert_eq!(pipeline.next().unwrap_err(), err);
}

// =============================================================================
// Cancellation and deadlines
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_after_first_chunk() {
    let fetcher = Arc::new(
        MockChunkFetcher::new(numbered_json_chunks(3, 2))
            .stall(1)
            .stall(2),
    );
    let cancel = CancellationToken::new();
    let mut pipeline = start(
        json_source(3, 2),
        &PipelineConfig::default(),
        fetcher.clone(),
        &cancel,
    );

    let (first, mut pipeline) = tokio::task::spawn_blocking(move || {
        let rows = vec![
            pipeline.next().unwrap().unwrap(),
            pipeline.next().unwrap().unwrap(),
        ];
        (rows, pipeline)
    })
    .await
    .unwrap();
    assert_eq!(ints(&first), vec![0, 1]);

    cancel.cancel();
    let err = tokio::task::spawn_blocking(move || pipeline.next().unwrap_err())
        .await
        .unwrap();
    assert!(err.is_cancellation(), "expected cancellation, got {:?}", err);
    assert!(matches!(err.chunk_index(), Some(1) | Some(2)));

    // no retry after cancellation
    assert_eq!(fetcher.calls_for(1), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deadline_exceeded() {
    let fetcher = Arc::new(MockChunkFetcher::new(numbered_json_chunks(2, 2)).stall(1));
    let config = PipelineConfig {
        deadline: Some(tokio::time::Instant::now() + Duration::from_millis(100)),
        ..Default::default()
    };
    let (rows, err, _) = drain(start(
        json_source(2, 2),
        &config,
        fetcher,
        &CancellationToken::new(),
    ))
    .await;

    assert_eq!(ints(&rows), vec![0, 1]);
    assert!(matches!(
        err,
        Some(Error::DeadlineExceeded {
            chunk_index: Some(1)
        })
    ));
}

// =============================================================================
// Decoding
// =============================================================================

fn mixed_row_type() -> RowType {
    RowType::new(vec![
        ColumnType::new("AMOUNT", LogicalType::Fixed).with_scale(2),
        ColumnType::new("NAME", LogicalType::Text),
        ColumnType::new("FLAG", LogicalType::Boolean),
        ColumnType::new("DAY", LogicalType::Date),
    ])
}

const MIXED_JSON: &str = r#"["123.45","abc","1","19000"],["-0.50",null,"0","0"]"#;

fn mixed_arrow() -> Bytes {
    let schema = Arc::new(Schema::new(vec![
        Field::new("AMOUNT", DataType::Int64, true),
        Field::new("NAME", DataType::Utf8, true),
        Field::new("FLAG", DataType::Boolean, true),
        Field::new("DAY", DataType::Date32, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![12345, -50])),
            Arc::new(StringArray::from(vec![Some("abc"), None])),
            Arc::new(BooleanArray::from(vec![true, false])),
            Arc::new(Date32Array::from(vec![19000, 0])),
        ],
    )
    .unwrap();
    arrow_ipc(&batch)
}

async fn decode_mixed(format: ResultFormat, body: Bytes) -> Vec<Vec<Value>> {
    let source = ChunkSource {
        chunks: descriptors(&[2]),
        row_type: mixed_row_type(),
        format,
        auth: ChunkAuth::Qrmk(String::new()),
        location: Location::Utc,
        inline: None,
        total_rows: Some(2),
    };
    let fetcher = Arc::new(MockChunkFetcher::new(vec![body]));
    let (rows, err, _) = drain(start(
        source,
        &PipelineConfig::default(),
        fetcher,
        &CancellationToken::new(),
    ))
    .await;
    assert!(err.is_none(), "unexpected error: {:?}", err);
    rows
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_json_and_arrow_decode_identically() {
    let json = decode_mixed(ResultFormat::Json, Bytes::from_static(MIXED_JSON.as_bytes())).await;
    let arrow = decode_mixed(ResultFormat::Arrow, mixed_arrow()).await;

    assert_eq!(json, arrow);
    assert_eq!(json[0][0], Value::Float(123.45));
    assert_eq!(json[1][1], Value::Null);
    assert_eq!(json[0][2], Value::Boolean(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gzip_and_plain_decode_identically() {
    let plain = decode_mixed(ResultFormat::Json, Bytes::from_static(MIXED_JSON.as_bytes())).await;
    let gzipped = decode_mixed(ResultFormat::Json, gzip(MIXED_JSON.as_bytes())).await;
    assert_eq!(plain, gzipped);

    let arrow_gzipped = decode_mixed(ResultFormat::Arrow, gzip(&mixed_arrow())).await;
    assert_eq!(plain, arrow_gzipped);
}

// =============================================================================
// Raw batches
// =============================================================================

fn raw_config() -> PipelineConfig {
    PipelineConfig {
        decode_mode: DecodeMode::RawBatches,
        ..Default::default()
    }
}

fn arrow_source(chunks: usize, row_type: RowType) -> ChunkSource {
    ChunkSource {
        chunks: descriptors(&vec![2; chunks]),
        row_type,
        format: ResultFormat::Arrow,
        auth: ChunkAuth::Qrmk(String::new()),
        location: Location::Utc,
        inline: None,
        total_rows: Some((chunks * 2) as u64),
    }
}

async fn next_batches(
    mut pipeline: ChunkPipeline,
) -> (Result<Option<Vec<ArrowBatchHandle>>>, ChunkPipeline) {
    tokio::task::spawn_blocking(move || (pipeline.next_batches(), pipeline))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_raw_batch_scale_mismatch_is_terminal() {
    let schema = Arc::new(Schema::new(vec![Field::new("AMOUNT", DataType::Int64, true)
        .with_metadata(HashMap::from([
            ("logicalType".to_string(), "FIXED".to_string()),
            ("scale".to_string(), "3".to_string()),
        ]))]));
    let batch =
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
    let fetcher = Arc::new(MockChunkFetcher::new(vec![arrow_ipc(&batch)]));
    let row_type = RowType::new(vec![
        ColumnType::new("AMOUNT", LogicalType::Fixed).with_scale(2)
    ]);

    let pipeline = start(
        arrow_source(1, row_type),
        &raw_config(),
        fetcher.clone(),
        &CancellationToken::new(),
    );
    let (result, pipeline) = next_batches(pipeline).await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::MetadataMismatch { .. }));
    assert_eq!(err.chunk_index(), Some(0));
    assert_eq!(fetcher.calls_for(0), 1);
    assert_eq!(pipeline.failures().len(), 1);
    assert_eq!(pipeline.ledger().live_handles(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_releases_pipeline_owned_batches() {
    let bodies = (0..4)
        .map(|c| arrow_ipc(&number_batch(vec![c * 2, c * 2 + 1])))
        .collect();
    let fetcher = Arc::new(MockChunkFetcher::new(bodies));
    let pipeline = start(
        arrow_source(4, number_row_type()),
        &raw_config(),
        fetcher,
        &CancellationToken::new(),
    );
    let ledger = Arc::clone(pipeline.ledger());

    let (first, mut pipeline) = next_batches(pipeline).await;
    let first = first.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].num_rows(), 2);

    // wait for the remaining chunks to be decoded and held by the pipeline
    tokio::time::timeout(Duration::from_secs(5), async {
        while ledger.live_handles() < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("chunks were not decoded in time");

    pipeline.reset();
    assert_eq!(ledger.live_handles(), 1);
    assert!(matches!(pipeline.next_batches(), Err(Error::InvalidState(_))));

    // the caller's handle is still usable until it is released
    let retained = first[0].retain();
    assert_eq!(ledger.live_handles(), 2);
    assert_eq!(retained.batch().num_rows(), 2);
    drop(first);
    retained.release();
    assert_eq!(ledger.live_handles(), 0);
}

// =============================================================================
// Response wiring
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_factory_opens_deserialized_response() {
    let response = serde_json::json!({
        "queryId": "01b2-0000",
        "rowtype": [{"name": "N", "type": "fixed", "scale": 0, "precision": 38, "nullable": true}],
        "rowset": [["100"]],
        "total": 5,
        "returned": 1,
        "queryResultFormat": "json",
        "qrmk": "secret-key",
        "chunks": [
            {"url": chunk_url(0), "rowCount": 2, "uncompressedSize": 16},
            {"url": chunk_url(1), "rowCount": 2, "uncompressedSize": 16}
        ],
        "parameters": [{"name": "CLIENT_PREFETCH_THREADS", "value": 2}]
    });
    let data: QueryResultData = serde_json::from_value(response).unwrap();

    let fetcher = Arc::new(MockChunkFetcher::new(numbered_json_chunks(2, 2)));
    let factory = ResultSetFactory::new(fetcher, PipelineConfig::default(), Handle::current());
    let pipeline = factory.open(&data, &CancellationToken::new()).unwrap();
    assert_eq!(pipeline.chunk_count(), 2);

    let (rows, err, pipeline) = drain(pipeline).await;
    assert!(err.is_none());
    assert_eq!(ints(&rows), vec![100, 0, 1, 2, 3]);
    assert_eq!(pipeline.rows_delivered(), 5);
}
