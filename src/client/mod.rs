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

//! Fetch collaborator used to download chunk bodies.
//!
//! This module provides:
//! - `ChunkFetcher` trait: the injected interface the pipeline downloads through
//! - `HttpChunkFetcher`: the default implementation over reqwest

pub mod http;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use http::{HttpChunkFetcher, HttpClientConfig};

/// Status and body of a chunk request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Downloads one chunk body.
///
/// Implementations own the network stack. They should stop in-flight work
/// when `cancel` fires and return [`Error::Cancelled`](crate::Error::Cancelled).
/// A non-2xx response is returned as a `FetchResponse`, not an error; the
/// pipeline decides what to do with it. Connection-level failures are
/// returned as [`Error::Transport`](crate::Error::Transport).
#[async_trait]
pub trait ChunkFetcher: Send + Sync + std::fmt::Debug {
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<FetchResponse>;
}
