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

//! Typed values from JSON rowset cells.
//!
//! The JSON wire format sends every cell as a string (or null). Temporal
//! values are `"<seconds>.<fraction>"` since the epoch or midnight, and
//! TIMESTAMP_TZ appends the biased offset in minutes after a space.

use crate::error::{Error, Result};
use crate::reader::chunks::convert::{
    date_from_days, decfloat_value, fixed_value, time_of_day, timestamp_value, unknown_type,
    utc_datetime, ConvertOptions,
};
use crate::types::location::offset_from_biased_minutes;
use crate::types::row_type::{ColumnType, LogicalType, RowType};
use crate::types::value::{ChunkRow, Decimal, Value};

/// Convert raw JSON rows, checking each row's width against the row type.
pub fn json_rows_to_values(
    raw: Vec<Vec<Option<String>>>,
    row_type: &RowType,
    options: &ConvertOptions,
) -> Result<Vec<ChunkRow>> {
    raw.into_iter()
        .enumerate()
        .map(|(row_idx, cells)| {
            if cells.len() != row_type.len() {
                return Err(Error::decode(format!(
                    "row {} has {} columns, row type declares {}",
                    row_idx,
                    cells.len(),
                    row_type.len()
                )));
            }
            cells
                .into_iter()
                .zip(row_type.iter())
                .map(|(cell, column)| match cell {
                    None => Ok(Value::Null),
                    Some(text) => json_cell(text, column, options),
                })
                .collect()
        })
        .collect()
}

/// Convert one non-null cell.
pub fn json_cell(text: String, column: &ColumnType, options: &ConvertOptions) -> Result<Value> {
    let Some(logical) = column.logical_type else {
        return Err(unknown_type(column));
    };
    let hp = options.higher_precision;
    let value = match logical {
        LogicalType::Fixed => {
            let decimal = parse_decimal(&text)?
                .rescale(column.scale as i32)
                .ok_or_else(|| overflow(&text))?;
            if decimal.scale != column.scale as i32 {
                return Err(Error::decode(format!(
                    "'{}' has more fractional digits than scale {}",
                    text, column.scale
                )));
            }
            fixed_value(decimal.unscaled, column.scale, hp)?
        }
        LogicalType::Real => Value::Float(
            text.trim()
                .parse::<f64>()
                .map_err(|_| Error::decode(format!("invalid REAL: {}", text)))?,
        ),
        LogicalType::Decfloat => {
            if hp {
                decfloat_value(parse_decimal(&text)?, true)
            } else {
                Value::Float(
                    text.trim()
                        .parse::<f64>()
                        .map_err(|_| Error::decode(format!("invalid DECFLOAT: {}", text)))?,
                )
            }
        }
        LogicalType::Boolean => Value::Boolean(parse_boolean(&text)?),
        LogicalType::Date => {
            let days = text
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::decode(format!("invalid DATE: {}", text)))?;
            Value::Date(date_from_days(days)?)
        }
        LogicalType::Time => {
            let (secs, nanos) = parse_seconds(&text)?;
            Value::Time(time_of_day(secs, nanos)?)
        }
        LogicalType::TimestampNtz | LogicalType::TimestampLtz => {
            let (secs, nanos) = parse_seconds(&text)?;
            timestamp_value(logical, utc_datetime(secs, nanos)?, None, &options.location)
        }
        LogicalType::TimestampTz => {
            let (instant, offset) = text
                .trim()
                .split_once(' ')
                .ok_or_else(|| Error::decode(format!("invalid TIMESTAMP_TZ: {}", text)))?;
            let (secs, nanos) = parse_seconds(instant)?;
            let biased = offset
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::decode(format!("invalid TIMESTAMP_TZ offset: {}", text)))?;
            timestamp_value(
                logical,
                utc_datetime(secs, nanos)?,
                Some(offset_from_biased_minutes(biased)?),
                &options.location,
            )
        }
        LogicalType::Binary => Value::Binary(
            hex::decode(text.trim())
                .map_err(|e| Error::decode(format!("invalid BINARY hex: {}", e)))?,
        ),
        LogicalType::Null => Value::Null,
        LogicalType::Text
        | LogicalType::Variant
        | LogicalType::Object
        | LogicalType::Array
        | LogicalType::Map => Value::Text(text),
    };
    Ok(value)
}

fn parse_decimal(text: &str) -> Result<Decimal> {
    text.parse::<Decimal>()
}

fn overflow(text: &str) -> Error {
    Error::decode(format!("numeric value out of range: {}", text))
}

fn parse_boolean(text: &str) -> Result<bool> {
    match text.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        t if t.eq_ignore_ascii_case("true") => Ok(true),
        t if t.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(Error::decode(format!("invalid BOOLEAN: {}", text))),
    }
}

/// Parse `"<seconds>[.<fraction>]"` into seconds and signed nanoseconds.
///
/// A negative value carries its sign on both parts: `"-1.5"` is
/// `(-1, -500_000_000)`. Fraction digits past nanoseconds are dropped.
fn parse_seconds(text: &str) -> Result<(i64, i64)> {
    let invalid = || Error::decode(format!("invalid epoch value: {}", text));
    let text = text.trim();
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let secs = whole.parse::<i64>().map_err(|_| invalid())?;
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let mut nanos: i64 = 0;
    for i in 0..9 {
        let digit = fraction.as_bytes().get(i).map_or(0, |b| (b - b'0') as i64);
        nanos = nanos * 10 + digit;
    }
    if whole.starts_with('-') {
        nanos = -nanos;
    }
    Ok((secs, nanos))
}
