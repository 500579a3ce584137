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

//! Session timezone used to present TIMESTAMP_LTZ values.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Offset the server adds to TIMESTAMP_TZ offsets so they are never negative.
pub const TIMESTAMP_TZ_OFFSET_BIAS_MINUTES: i32 = 1440;

/// The session's default timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    #[default]
    Utc,
    Fixed(FixedOffset),
    Named(Tz),
}

impl Location {
    /// Resolve the session `TIMEZONE` parameter.
    ///
    /// Accepts IANA names (`America/Los_Angeles`) and `sHHMM` offsets
    /// (`+0530`). A missing or unknown value resolves to UTC.
    pub fn from_session_timezone(name: Option<&str>) -> Self {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return Location::Utc;
        };
        if let Some(offset) = parse_offset_string(name) {
            return Location::Fixed(offset);
        }
        match name.parse::<Tz>() {
            Ok(Tz::UTC) => Location::Utc,
            Ok(tz) => Location::Named(tz),
            Err(_) => {
                warn!("Unknown session timezone '{}', using UTC", name);
                Location::Utc
            }
        }
    }

    /// Present a UTC instant in this location.
    pub fn localize(&self, utc: NaiveDateTime) -> DateTime<FixedOffset> {
        let offset = match self {
            Location::Utc => Utc.fix(),
            Location::Fixed(offset) => *offset,
            Location::Named(tz) => tz.offset_from_utc_datetime(&utc).fix(),
        };
        offset.from_utc_datetime(&utc)
    }

    pub fn name(&self) -> String {
        match self {
            Location::Utc => "UTC".to_string(),
            Location::Fixed(offset) => offset.to_string(),
            Location::Named(tz) => tz.name().to_string(),
        }
    }
}

/// Offset for a TIMESTAMP_TZ wire value, which stores `minutes + 1440`.
pub fn offset_from_biased_minutes(biased: i64) -> Result<FixedOffset> {
    let minutes = biased - TIMESTAMP_TZ_OFFSET_BIAS_MINUTES as i64;
    i32::try_from(minutes * 60)
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::decode(format!("invalid TIMESTAMP_TZ offset: {}", biased)))
}

fn parse_offset_string(s: &str) -> Option<FixedOffset> {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || !(bytes[0] == b'+' || bytes[0] == b'-') {
        return None;
    }
    let hours: i32 = s[1..3].parse().ok()?;
    let minutes: i32 = s[3..5].parse().ok()?;
    let seconds = (hours * 60 + minutes) * 60;
    let sign = if bytes[0] == b'-' { -1 } else { 1 };
    FixedOffset::east_opt(sign * seconds)
}
