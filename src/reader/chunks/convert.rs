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

//! Conversions shared by the JSON and Arrow decode paths.
//!
//! Both paths reduce a cell to the same intermediate form (an unscaled
//! integer plus scale, or seconds plus nanoseconds) before building the
//! [`Value`], so a result set decodes identically whichever wire format the
//! server picked.

use crate::error::{Error, Result};
use crate::types::location::Location;
use crate::types::row_type::{ColumnType, LogicalType};
use crate::types::value::{Decimal, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

const NANOS_PER_SECOND: i64 = 1_000_000_000;
/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;
/// Largest magnitude for which both the integer and `10^scale` convert to
/// `f64` exactly, so one division rounds correctly.
const F64_EXACT_INT: u128 = 1 << 53;
const F64_EXACT_POW10: i64 = 22;

/// Options applied to every cell of a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConvertOptions {
    /// Keep FIXED and DECFLOAT exact.
    pub higher_precision: bool,
    /// Replace invalid UTF-8 in binary-encoded text instead of failing.
    pub validate_utf8: bool,
    /// Session timezone for TIMESTAMP_LTZ.
    pub location: Location,
}

/// Error for a non-null cell of a column whose type name is not recognised.
pub(crate) fn unknown_type(column: &ColumnType) -> Error {
    Error::decode(format!(
        "unsupported logical type '{}' for column '{}'",
        column.type_name, column.name
    ))
}

/// FIXED value from its unscaled integer.
///
/// | scale | higher precision | result |
/// |---|---|---|
/// | 0 | any | `Int`, or `BigInt`/`Float` past `i64` |
/// | > 0 | off | `Float` |
/// | > 0 | on | `Decimal` |
pub(crate) fn fixed_value(unscaled: i128, scale: i64, higher_precision: bool) -> Result<Value> {
    if !(0..=38).contains(&scale) {
        return Err(Error::decode(format!("invalid FIXED scale: {}", scale)));
    }
    if scale == 0 {
        return Ok(match i64::try_from(unscaled) {
            Ok(v) => Value::Int(v),
            Err(_) if higher_precision => Value::BigInt(unscaled),
            Err(_) => Value::Float(unscaled as f64),
        });
    }
    if higher_precision {
        Ok(Value::Decimal(Decimal::new(unscaled, scale as i32)))
    } else {
        Ok(Value::Float(scaled_to_f64(unscaled, scale)))
    }
}

/// `unscaled / 10^scale`, correctly rounded.
pub(crate) fn scaled_to_f64(unscaled: i128, scale: i64) -> f64 {
    if scale <= F64_EXACT_POW10 && unscaled.unsigned_abs() <= F64_EXACT_INT {
        unscaled as f64 / 10f64.powi(scale as i32)
    } else {
        Decimal::new(unscaled, scale as i32).to_f64()
    }
}

/// DECFLOAT value: `significand * 10^exponent`.
pub(crate) fn decfloat_value(decimal: Decimal, higher_precision: bool) -> Value {
    if higher_precision {
        Value::Decimal(decimal)
    } else {
        Value::Float(decimal.to_f64())
    }
}

/// Split a scaled epoch value into seconds and nanoseconds.
///
/// Floor division keeps the nanosecond part non-negative for instants before
/// the epoch.
pub(crate) fn split_scaled(value: i64, scale: i64) -> Result<(i64, i64)> {
    if !(0..=9).contains(&scale) {
        return Err(Error::decode(format!("invalid temporal scale: {}", scale)));
    }
    let unit = 10i64.pow(scale as u32);
    let nanos_per_unit = 10i64.pow((9 - scale) as u32);
    Ok((
        value.div_euclid(unit),
        value.rem_euclid(unit) * nanos_per_unit,
    ))
}

pub(crate) fn utc_datetime(secs: i64, nanos: i64) -> Result<NaiveDateTime> {
    let secs = secs
        .checked_add(nanos.div_euclid(NANOS_PER_SECOND))
        .ok_or_else(|| Error::decode("timestamp out of range"))?;
    let nanos = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| Error::decode(format!("timestamp out of range: {}s", secs)))
}

pub(crate) fn time_of_day(secs: i64, nanos: i64) -> Result<NaiveTime> {
    u32::try_from(secs)
        .ok()
        .zip(u32::try_from(nanos).ok())
        .and_then(|(s, n)| NaiveTime::from_num_seconds_from_midnight_opt(s, n))
        .ok_or_else(|| Error::decode(format!("time of day out of range: {}.{:09}", secs, nanos)))
}

pub(crate) fn date_from_days(days: i64) -> Result<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(|d| i32::try_from(d).ok())
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| Error::decode(format!("date out of range: {} days", days)))
}

/// Build a timestamp value of the given kind from a UTC instant.
///
/// `offset` is the per-value offset carried by TIMESTAMP_TZ; LTZ values are
/// shown in the session location, NTZ values stay naive.
pub(crate) fn timestamp_value(
    kind: LogicalType,
    utc: NaiveDateTime,
    offset: Option<FixedOffset>,
    location: &Location,
) -> Value {
    match (kind, offset) {
        (LogicalType::TimestampNtz, _) => Value::TimestampNtz(utc),
        (_, Some(offset)) => Value::Timestamp(offset.from_utc_datetime(&utc)),
        _ => Value::Timestamp(location.localize(utc)),
    }
}

/// Text from bytes that should be UTF-8.
pub(crate) fn text_from_bytes(bytes: &[u8], validate_utf8: bool) -> Result<String> {
    if validate_utf8 {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    } else {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::decode(format!("invalid UTF-8 in text column: {}", e)))
    }
}
