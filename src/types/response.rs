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

//! Control-plane response types.
//!
//! Only the fields of the query response that the chunk pipeline consumes
//! are modelled here; everything else is ignored during deserialization.

use crate::types::chunk::{ChunkAuth, ChunkDescriptor, ResultFormat};
use crate::types::row_type::{ColumnType, RowType};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// The `data` object of a query response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultData {
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default, rename = "rowtype")]
    pub row_type: Vec<RowTypeField>,
    /// Inline first batch in JSON format.
    #[serde(default, rename = "rowset")]
    pub row_set: Option<Vec<Vec<Option<String>>>>,
    /// Inline first batch as Arrow IPC, base64-encoded in JSON and decoded by serde.
    #[serde(
        default,
        rename = "rowsetBase64",
        alias = "rowsetbase64",
        deserialize_with = "deserialize_base64_rowset"
    )]
    pub row_set_base64: Option<Vec<u8>>,
    /// Total rows in the result set, across the inline batch and all chunks.
    #[serde(default)]
    pub total: i64,
    /// Rows in the inline batch.
    #[serde(default)]
    pub returned: i64,
    #[serde(default)]
    pub query_result_format: Option<String>,
    #[serde(default)]
    pub chunks: Vec<ExecResponseChunk>,
    #[serde(default)]
    pub qrmk: Option<String>,
    #[serde(default)]
    pub chunk_headers: HashMap<String, String>,
    #[serde(default)]
    pub parameters: Vec<NameValueParameter>,
}

/// Column metadata as sent by the server. Nested fields share the shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowTypeField {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub scale: i64,
    #[serde(default)]
    pub precision: i64,
    #[serde(default)]
    pub byte_length: i64,
    #[serde(default)]
    pub length: i64,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub fields: Vec<RowTypeField>,
}

impl From<&RowTypeField> for ColumnType {
    fn from(field: &RowTypeField) -> Self {
        ColumnType::from_type_name(field.name.clone(), field.type_name.clone())
            .with_scale(field.scale)
            .with_precision(field.precision)
            .with_byte_length(field.byte_length)
            .with_nullable(field.nullable)
            .with_fields(field.fields.iter().map(ColumnType::from).collect())
            .with_length(field.length)
    }
}

/// One remote chunk as listed in the response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResponseChunk {
    pub url: String,
    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub uncompressed_size: i64,
    #[serde(default)]
    pub compressed_size: Option<i64>,
}

/// Session parameter echoed back with the response.
#[derive(Debug, Clone, Deserialize)]
pub struct NameValueParameter {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

fn deserialize_base64_rowset<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) if !s.is_empty() => STANDARD
            .decode(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

impl QueryResultData {
    pub fn row_type(&self) -> RowType {
        RowType::new(self.row_type.iter().map(ColumnType::from).collect())
    }

    pub fn chunk_descriptors(&self) -> Vec<ChunkDescriptor> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| ChunkDescriptor {
                index,
                url: chunk.url.clone(),
                row_count: chunk.row_count,
                uncompressed_size: chunk.uncompressed_size,
                compressed_size: chunk.compressed_size,
            })
            .collect()
    }

    pub fn result_format(&self) -> ResultFormat {
        ResultFormat::from_name(self.query_result_format.as_deref())
    }

    pub fn chunk_auth(&self) -> ChunkAuth {
        ChunkAuth::from_response(self.qrmk.as_deref(), &self.chunk_headers)
    }

    /// Look up a session parameter by name, ignoring case.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| match &p.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}
