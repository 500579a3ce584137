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

//! Row-type schema shared by every chunk decode of a result set.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// The warehouse's column type tag, independent of the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Fixed,
    Real,
    Decfloat,
    Text,
    Date,
    Variant,
    TimestampLtz,
    TimestampNtz,
    TimestampTz,
    Object,
    Array,
    Map,
    Binary,
    Time,
    Boolean,
    Null,
}

impl LogicalType {
    /// Parse a type name as sent by the server. Matching ignores case.
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_uppercase().as_str() {
            "FIXED" => LogicalType::Fixed,
            "REAL" => LogicalType::Real,
            "DECFLOAT" => LogicalType::Decfloat,
            "TEXT" => LogicalType::Text,
            "DATE" => LogicalType::Date,
            "VARIANT" => LogicalType::Variant,
            "TIMESTAMP_LTZ" => LogicalType::TimestampLtz,
            "TIMESTAMP_NTZ" => LogicalType::TimestampNtz,
            "TIMESTAMP_TZ" => LogicalType::TimestampTz,
            "OBJECT" => LogicalType::Object,
            "ARRAY" => LogicalType::Array,
            "MAP" => LogicalType::Map,
            "BINARY" => LogicalType::Binary,
            "TIME" => LogicalType::Time,
            "BOOLEAN" => LogicalType::Boolean,
            "NULL" => LogicalType::Null,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Fixed => "FIXED",
            LogicalType::Real => "REAL",
            LogicalType::Decfloat => "DECFLOAT",
            LogicalType::Text => "TEXT",
            LogicalType::Date => "DATE",
            LogicalType::Variant => "VARIANT",
            LogicalType::TimestampLtz => "TIMESTAMP_LTZ",
            LogicalType::TimestampNtz => "TIMESTAMP_NTZ",
            LogicalType::TimestampTz => "TIMESTAMP_TZ",
            LogicalType::Object => "OBJECT",
            LogicalType::Array => "ARRAY",
            LogicalType::Map => "MAP",
            LogicalType::Binary => "BINARY",
            LogicalType::Time => "TIME",
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::Null => "NULL",
        }
    }

    /// Types whose wire value is scaled by `10^scale`.
    pub fn is_scale_bearing(&self) -> bool {
        matches!(
            self,
            LogicalType::Fixed
                | LogicalType::Time
                | LogicalType::TimestampLtz
                | LogicalType::TimestampNtz
                | LogicalType::TimestampTz
        )
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one column, or one nested field of a structured column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnType {
    pub name: String,
    /// Type name exactly as the server sent it.
    pub type_name: String,
    /// Parsed type; `None` when the server sent a name this crate does not know.
    pub logical_type: Option<LogicalType>,
    pub scale: i64,
    pub precision: i64,
    pub byte_length: i64,
    pub length: i64,
    pub nullable: bool,
    /// Element metadata: one entry for ARRAY, key and value for MAP, one per
    /// field for OBJECT. Empty for semi-structured values sent as text.
    pub fields: Vec<ColumnType>,
}

impl ColumnType {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            type_name: logical_type.as_str().to_lowercase(),
            logical_type: Some(logical_type),
            scale: 0,
            precision: 0,
            byte_length: 0,
            length: 0,
            nullable: true,
            fields: Vec::new(),
        }
    }

    /// Build from a raw server type name.
    pub fn from_type_name(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            name: name.into(),
            logical_type: LogicalType::from_name(&type_name),
            type_name,
            scale: 0,
            precision: 0,
            byte_length: 0,
            length: 0,
            nullable: true,
            fields: Vec::new(),
        }
    }

    pub fn with_scale(mut self, scale: i64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_precision(mut self, precision: i64) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_byte_length(mut self, byte_length: i64) -> Self {
        self.byte_length = byte_length;
        self
    }

    pub fn with_length(mut self, length: i64) -> Self {
        self.length = length;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_fields(mut self, fields: Vec<ColumnType>) -> Self {
        self.fields = fields;
        self
    }
}

/// Ordered column metadata for a result set.
///
/// Cloning is cheap: the columns live behind an `Arc` and are shared by every
/// decoder working on the same result set.
#[derive(Debug, Clone, PartialEq)]
pub struct RowType {
    columns: Arc<[ColumnType]>,
}

impl RowType {
    pub fn new(columns: Vec<ColumnType>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnType] {
        &self.columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnType> {
        self.columns.iter()
    }
}

impl Index<usize> for RowType {
    type Output = ColumnType;

    fn index(&self, idx: usize) -> &ColumnType {
        &self.columns[idx]
    }
}
