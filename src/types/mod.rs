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

//! Type definitions for the chunk pipeline.
//!
//! This module contains data structures organized by domain:
//! - `chunk`: chunk descriptors, authentication, and pipeline configuration
//! - `row_type`: per-column schema metadata
//! - `value`: typed cell values
//! - `location`: session timezone resolution
//! - `response`: control-plane response fields consumed by the pipeline

pub mod chunk;
pub mod location;
pub mod response;
pub mod row_type;
pub mod value;

// Re-export commonly used types
pub use chunk::{
    ChunkAuth, ChunkDescriptor, DecodeMode, DownloadState, PipelineConfig, ResultFormat,
};
pub use location::Location;
pub use response::{ExecResponseChunk, NameValueParameter, QueryResultData, RowTypeField};
pub use row_type::{ColumnType, LogicalType, RowType};
pub use value::{ChunkRow, Decimal, Value};
