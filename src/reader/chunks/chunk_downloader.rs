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

//! ChunkDownloader for fetching and decoding a single chunk.
//!
//! This module handles one download attempt: building the request headers,
//! calling the fetch collaborator, mapping non-2xx responses to errors,
//! speed logging, and handing the body to the decoder. Retries across
//! attempts are the pipeline's business.

use crate::client::ChunkFetcher;
use crate::error::{redact_url, Error, Result};
use crate::reader::chunks::decoder::{ChunkDecoder, DecodedChunk};
use crate::types::chunk::{ChunkAuth, ChunkDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Downloads chunk bodies and decodes them.
#[derive(Debug)]
pub struct ChunkDownloader {
    fetcher: Arc<dyn ChunkFetcher>,
    headers: HashMap<String, String>,
    request_timeout: Duration,
    decoder: ChunkDecoder,
}

impl ChunkDownloader {
    pub fn new(
        fetcher: Arc<dyn ChunkFetcher>,
        auth: &ChunkAuth,
        request_timeout: Duration,
        decoder: ChunkDecoder,
    ) -> Self {
        Self {
            fetcher,
            headers: auth.headers(),
            request_timeout,
            decoder,
        }
    }

    pub fn decoder(&self) -> &ChunkDecoder {
        &self.decoder
    }

    /// Download and decode one chunk.
    ///
    /// Every error returned carries the chunk's index.
    pub async fn download(
        &self,
        chunk: &ChunkDescriptor,
        cancel: &CancellationToken,
    ) -> Result<DecodedChunk> {
        self.try_download(chunk, cancel)
            .await
            .map_err(|e| e.with_chunk_index(chunk.index))
    }

    async fn try_download(
        &self,
        chunk: &ChunkDescriptor,
        cancel: &CancellationToken,
    ) -> Result<DecodedChunk> {
        let start = Instant::now();

        debug!(
            "Downloading chunk {} from {} ({} rows, {} bytes uncompressed)",
            chunk.index,
            redact_url(&chunk.url),
            chunk.row_count,
            chunk.uncompressed_size
        );

        let response = self
            .fetcher
            .fetch(cancel, &chunk.url, &self.headers, self.request_timeout)
            .await?;

        if !response.is_success() {
            warn!(
                "Chunk {} request returned HTTP {}",
                chunk.index, response.status
            );
            return Err(Error::http_status(response.status, &chunk.url));
        }

        let elapsed = start.elapsed();
        let size_mb = response.body.len() as f64 / 1024.0 / 1024.0;
        debug!(
            "Downloaded chunk {}: {:.2} MB in {:.2}s ({:.2} MB/s)",
            chunk.index,
            size_mb,
            elapsed.as_secs_f64(),
            size_mb / elapsed.as_secs_f64().max(f64::EPSILON)
        );

        let decoded = self.decoder.decode(&response.body)?;

        if decoded.row_count() != chunk.row_count {
            warn!(
                "Chunk {} decoded {} rows, server declared {}",
                chunk.index,
                decoded.row_count(),
                chunk.row_count
            );
        }
        debug!(
            "Decoded chunk {}: {} rows in {:.2}s",
            chunk.index,
            decoded.row_count(),
            start.elapsed().as_secs_f64()
        );

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FetchResponse;
    use crate::reader::chunks::convert::ConvertOptions;
    use crate::reader::chunks::raw_batch::BatchLedger;
    use crate::types::chunk::{DecodeMode, ResultFormat, HEADER_SSE_C_KEY};
    use crate::types::row_type::{ColumnType, LogicalType, RowType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FixedFetcher {
        response: FetchResponse,
        seen_headers: Mutex<Vec<HashMap<String, String>>>,
    }

    #[async_trait]
    impl ChunkFetcher for FixedFetcher {
        async fn fetch(
            &self,
            _cancel: &CancellationToken,
            _url: &str,
            headers: &HashMap<String, String>,
            _timeout: Duration,
        ) -> Result<FetchResponse> {
            self.seen_headers.lock().unwrap().push(headers.clone());
            Ok(self.response.clone())
        }
    }

    fn create_test_chunk() -> ChunkDescriptor {
        ChunkDescriptor {
            index: 4,
            url: "https://storage.example.com/chunk4?sig=secret".to_string(),
            row_count: 2,
            uncompressed_size: 32,
            compressed_size: None,
        }
    }

    fn downloader(response: FetchResponse) -> (ChunkDownloader, Arc<FixedFetcher>) {
        let fetcher = Arc::new(FixedFetcher {
            response,
            seen_headers: Mutex::new(Vec::new()),
        });
        let decoder = ChunkDecoder::new(
            RowType::new(vec![ColumnType::new("N", LogicalType::Fixed)]),
            ResultFormat::Json,
            DecodeMode::Rows,
            ConvertOptions::default(),
            BatchLedger::new(),
        )
        .unwrap();
        let downloader = ChunkDownloader::new(
            fetcher.clone(),
            &ChunkAuth::Qrmk("key".to_string()),
            Duration::from_secs(5),
            decoder,
        );
        (downloader, fetcher)
    }

    #[tokio::test]
    async fn test_download_decodes_body() {
        let (downloader, fetcher) = downloader(FetchResponse::ok(&b"[\"1\"],[\"2\"]"[..]));
        let chunk = downloader
            .download(&create_test_chunk(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(chunk.row_count(), 2);

        let seen = fetcher.seen_headers.lock().unwrap();
        assert_eq!(seen[0].get(HEADER_SSE_C_KEY).unwrap(), "key");
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        let (downloader, _) = downloader(FetchResponse {
            status: 403,
            body: bytes::Bytes::from_static(b"denied"),
        });
        let err = downloader
            .download(&create_test_chunk(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.chunk_index(), Some(4));
        assert!(!err.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_decode_error_carries_chunk_index() {
        let (downloader, _) = downloader(FetchResponse::ok(&b"[\"1\""[..]));
        let err = downloader
            .download(&create_test_chunk(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { chunk_index: Some(4), .. }));
    }
}
