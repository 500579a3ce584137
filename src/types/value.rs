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

//! Typed cell values produced by both decode paths.

use crate::error::Error;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;

/// Largest exponent magnitude accepted when parsing; DECFLOAT tops out here.
pub const MAX_DECIMAL_EXPONENT: u32 = 16384;

/// Exact decimal: `unscaled * 10^-scale`.
///
/// Produced for FIXED and DECFLOAT columns when higher precision is enabled.
/// A negative scale means trailing zeros (`unscaled * 10^|scale|`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub unscaled: i128,
    pub scale: i32,
}

impl Decimal {
    pub fn new(unscaled: i128, scale: i32) -> Self {
        Self { unscaled, scale }
    }

    /// Nearest `f64`, rounding once.
    pub fn to_f64(&self) -> f64 {
        // Parsing the exact decimal text keeps rounding correct for every scale.
        self.to_string().parse().unwrap_or(f64::NAN)
    }

    /// The same value with at least `scale` fractional digits.
    ///
    /// Used to line JSON text such as `"1.5"` up with a column declared with
    /// scale 2, so both wire formats produce identical decimals.
    pub fn rescale(self, scale: i32) -> Option<Self> {
        if scale <= self.scale {
            return Some(self);
        }
        let factor = 10i128.checked_pow((scale - self.scale) as u32)?;
        Some(Self::new(self.unscaled.checked_mul(factor)?, scale))
    }
}

impl FromStr for Decimal {
    type Err = Error;

    /// Parses `[-+]digits[.digits][e[-+]digits]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::decode(format!("invalid decimal: {}", s));
        let text = s.trim();
        let (mantissa, exponent) = match text.find(['e', 'E']) {
            Some(pos) => {
                let exponent = text[pos + 1..].parse::<i32>().map_err(|_| invalid())?;
                if exponent.unsigned_abs() > MAX_DECIMAL_EXPONENT {
                    return Err(invalid());
                }
                (&text[..pos], exponent)
            }
            None => (text, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let (negative, int_part) = match int_part.as_bytes().first() {
            Some(b'-') => (true, &int_part[1..]),
            Some(b'+') => (false, &int_part[1..]),
            _ => (false, int_part),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let mut unscaled: i128 = 0;
        for c in int_part.chars().chain(frac_part.chars()) {
            let digit = c.to_digit(10).ok_or_else(invalid)?;
            unscaled = unscaled
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit as i128))
                .ok_or_else(invalid)?;
        }
        if negative {
            unscaled = -unscaled;
        }
        let scale = i32::try_from(frac_part.len())
            .ok()
            .and_then(|digits| digits.checked_sub(exponent))
            .filter(|scale| scale.unsigned_abs() <= MAX_DECIMAL_EXPONENT)
            .ok_or_else(invalid)?;
        Ok(Self::new(unscaled, scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale <= 0 {
            write!(f, "{}", self.unscaled)?;
            for _ in 0..self.scale.unsigned_abs() {
                f.write_str("0")?;
            }
            return Ok(());
        }
        let digits = self.unscaled.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let sign = if self.unscaled < 0 { "-" } else { "" };
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int_part, frac_part)
        } else {
            write!(f, "{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
        }
    }
}

/// One decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    /// FIXED scale-0 values under higher precision.
    BigInt(i128),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// TIMESTAMP_NTZ: wall clock, interpreted as UTC.
    TimestampNtz(NaiveDateTime),
    /// TIMESTAMP_LTZ and TIMESTAMP_TZ: an instant plus the offset it is shown in.
    Timestamp(DateTime<FixedOffset>),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::BigInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A decoded row; its width always equals the row type's column count.
pub type ChunkRow = Vec<Value>;
