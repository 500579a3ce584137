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

//! Error types for the chunk pipeline.
//!
//! Every failure surfaced by the crate is an [`Error`]. Errors raised while
//! working on a specific chunk carry its index so the caller can tell which
//! part of the result set failed.
//!
//! | Variant | Retryable | Raised by |
//! |---|---|---|
//! | `Transport` | yes | fetch collaborator, non-2xx responses |
//! | `Decode` | no | JSON / Arrow decoding, decompression |
//! | `MetadataMismatch` | no | raw-batch metadata validation |
//! | `Cancelled` / `DeadlineExceeded` | no | cancellation token, deadline |
//! | `InvalidState` / `InvalidArgument` | no | API misuse, bad options |

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

fn at(chunk_index: &Option<usize>) -> String {
    match chunk_index {
        Some(idx) => format!(" (chunk {})", idx),
        None => String::new(),
    }
}

/// Errors produced by the chunk download-and-decode pipeline.
///
/// `Error` is `Clone` because the pipeline records the first terminal error
/// and hands a copy to every subsequent `next()` call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Connection failures, timeouts, and non-2xx responses.
    #[error("transport error{}: {message}", at(.chunk_index))]
    Transport {
        chunk_index: Option<usize>,
        status: Option<u16>,
        message: String,
    },

    /// Malformed payload: bad compression stream, invalid JSON, corrupt IPC.
    #[error("decode error{}: {message}", at(.chunk_index))]
    Decode {
        chunk_index: Option<usize>,
        message: String,
    },

    /// Arrow field metadata disagrees with the declared row type.
    #[error("metadata mismatch{}: {message}", at(.chunk_index))]
    MetadataMismatch {
        chunk_index: Option<usize>,
        message: String,
    },

    #[error("operation cancelled{}", at(.chunk_index))]
    Cancelled { chunk_index: Option<usize> },

    #[error("deadline exceeded{}", at(.chunk_index))]
    DeadlineExceeded { chunk_index: Option<usize> },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            chunk_index: None,
            status: None,
            message: message.into(),
        }
    }

    /// A non-2xx response from the chunk storage endpoint.
    pub fn http_status(status: u16, url: &str) -> Self {
        Error::Transport {
            chunk_index: None,
            status: Some(status),
            message: format!("HTTP {} fetching {}", status, redact_url(url)),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Error::Decode {
            chunk_index: None,
            message: message.into(),
        }
    }

    pub fn metadata_mismatch(message: impl Into<String>) -> Self {
        Error::MetadataMismatch {
            chunk_index: None,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Error::Cancelled { chunk_index: None }
    }

    pub fn deadline_exceeded() -> Self {
        Error::DeadlineExceeded { chunk_index: None }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Error::InvalidState(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Attach the index of the chunk being processed.
    ///
    /// Variants that are not chunk-scoped are returned unchanged.
    pub fn with_chunk_index(mut self, idx: usize) -> Self {
        match &mut self {
            Error::Transport { chunk_index, .. }
            | Error::Decode { chunk_index, .. }
            | Error::MetadataMismatch { chunk_index, .. }
            | Error::Cancelled { chunk_index }
            | Error::DeadlineExceeded { chunk_index } => *chunk_index = Some(idx),
            Error::InvalidState(_) | Error::InvalidArgument(_) => {}
        }
        self
    }

    /// Index of the chunk this error belongs to, if any.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Error::Transport { chunk_index, .. }
            | Error::Decode { chunk_index, .. }
            | Error::MetadataMismatch { chunk_index, .. }
            | Error::Cancelled { chunk_index }
            | Error::DeadlineExceeded { chunk_index } => *chunk_index,
            Error::InvalidState(_) | Error::InvalidArgument(_) => None,
        }
    }

    /// HTTP status for transport errors caused by a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Only transport failures may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Cancellation and deadline errors; never retried.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { .. } | Error::DeadlineExceeded { .. })
    }
}

/// Strip the query string from a pre-signed URL before it reaches a log line
/// or an error message. The signature lives in the query string.
pub(crate) fn redact_url(url: &str) -> &str {
    match url.find('?') {
        Some(pos) => &url[..pos],
        None => url,
    }
}

impl From<arrow_schema::ArrowError> for Error {
    fn from(e: arrow_schema::ArrowError) -> Self {
        Error::decode(format!("Arrow error: {}", e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::decode(format!("JSON error: {}", e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::decode(format!("I/O error while reading chunk body: {}", e))
    }
}
