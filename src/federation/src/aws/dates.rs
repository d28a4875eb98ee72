// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::Result;
use crate::errors::Error;
use chrono::{DateTime, NaiveDate, Utc};

/// The `x-amz-date` format, e.g. `20200811T065522Z`.
const LONG_DATETIME: &str = "%Y%m%dT%H%M%SZ";
const LONG_DATETIME_LEN: usize = 16;
const SHORT_DATE_LEN: usize = 8;
/// `Tue, 15 Nov 1994 08:12:31 ` followed by a zone.
const HTTP_DATE_PREFIX_LEN: usize = 26;

/// A source for the current time.
///
/// Production code uses [SystemClock]. Tests can provide a fixed clock to
/// obtain deterministic timestamps.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// A [Clock] backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A timestamp in the formats required by [AWS Signature Version 4].
///
/// The signature covers the `x-amz-date` value byte-for-byte, so the value is
/// kept as a string. When the timestamp comes from an HTTP `Date` header, the
/// header is preserved verbatim, callers that re-emit the header must send
/// exactly what they received.
///
/// # Example
/// ```
/// # use google_cloud_auth_federation::aws::dates::AwsDates;
/// let dates = AwsDates::from_date_header("Tue, 15 Nov 1994 08:12:31 GMT")?;
/// assert_eq!(dates.x_amz_date(), "19941115T081231Z");
/// assert_eq!(dates.formatted_date(), "19941115");
/// assert_eq!(dates.original_date(), "Tue, 15 Nov 1994 08:12:31 GMT");
/// # Ok::<(), google_cloud_auth_federation::errors::Error>(())
/// ```
///
/// [AWS Signature Version 4]: https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_sigv.html
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AwsDates {
    x_amz_date: String,
    original_date: String,
}

impl AwsDates {
    /// Validates a timestamp in the `YYYYMMDD'T'HHMMSS'Z'` format.
    pub fn from_x_amz_date<T: Into<String>>(x_amz_date: T) -> Result<Self> {
        let x_amz_date = x_amz_date.into();
        validate_x_amz_date(&x_amz_date)?;
        Ok(Self {
            original_date: x_amz_date.clone(),
            x_amz_date,
        })
    }

    /// Parses a `Date` header value, e.g. `Tue, 15 Nov 1994 08:12:31 GMT`.
    ///
    /// The value must have a weekday, a two digit day, a four digit year,
    /// and a time with seconds. The zone may be any zone accepted by
    /// RFC 2822, the `x-amz-date` value is always in UTC.
    pub fn from_date_header<T: Into<String>>(date: T) -> Result<Self> {
        let original_date = date.into();
        validate_date_header_layout(&original_date)?;
        let parsed = DateTime::parse_from_rfc2822(&original_date).map_err(|e| {
            Error::format(format!("invalid HTTP date <{original_date}>: {e}"))
        })?;
        Ok(Self {
            x_amz_date: format_x_amz_date(parsed.with_timezone(&Utc)),
            original_date,
        })
    }

    /// Captures the current time using the system clock.
    pub fn now() -> Self {
        Self::now_with(&SystemClock)
    }

    /// Captures the current time using `clock`.
    pub fn now_with<C>(clock: &C) -> Self
    where
        C: Clock + ?Sized,
    {
        let x_amz_date = format_x_amz_date(clock.now());
        Self {
            original_date: x_amz_date.clone(),
            x_amz_date,
        }
    }

    /// The timestamp in `YYYYMMDD'T'HHMMSS'Z'` format.
    pub fn x_amz_date(&self) -> &str {
        &self.x_amz_date
    }

    /// The date portion (`YYYYMMDD`) of the timestamp, as used in the
    /// credential scope.
    pub fn formatted_date(&self) -> &str {
        &self.x_amz_date[..SHORT_DATE_LEN]
    }

    /// The value this timestamp was created from.
    pub fn original_date(&self) -> &str {
        &self.original_date
    }
}

fn format_x_amz_date(instant: DateTime<Utc>) -> String {
    instant.format(LONG_DATETIME).to_string()
}

fn validate_x_amz_date(value: &str) -> Result<()> {
    let invalid = || Error::format(format!("invalid x-amz-date <{value}>"));
    let bytes = value.as_bytes();
    if bytes.len() != LONG_DATETIME_LEN || bytes[8] != b'T' || bytes[15] != b'Z' {
        return Err(invalid());
    }
    let digits = |range: std::ops::Range<usize>| -> Result<u32> {
        let field = &bytes[range];
        if !field.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        Ok(field
            .iter()
            .fold(0_u32, |acc, d| acc * 10 + u32::from(d - b'0')))
    };
    let year = digits(0..4)?;
    let month = digits(4..6)?;
    let day = digits(6..8)?;
    let hour = digits(9..11)?;
    let minute = digits(11..13)?;
    let second = digits(13..15)?;

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|_| ())
        .ok_or_else(invalid)
}

/// Checks the fixed-width layout of `Date` header values.
///
/// RFC 2822 parsers accept optional weekdays, optional seconds, and two digit
/// years. None of those appear in the header format the signature covers.
fn validate_date_header_layout(value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let all = |range: std::ops::Range<usize>, f: fn(&u8) -> bool| bytes[range].iter().all(f);
    let valid = bytes.len() > HTTP_DATE_PREFIX_LEN
        && all(0..3, u8::is_ascii_alphabetic)
        && &bytes[3..5] == b", "
        && all(5..7, u8::is_ascii_digit)
        && bytes[7] == b' '
        && all(8..11, u8::is_ascii_alphabetic)
        && bytes[11] == b' '
        && all(12..16, u8::is_ascii_digit)
        && bytes[16] == b' '
        && all(17..19, u8::is_ascii_digit)
        && bytes[19] == b':'
        && all(20..22, u8::is_ascii_digit)
        && bytes[22] == b':'
        && all(23..25, u8::is_ascii_digit)
        && bytes[25] == b' '
        && !bytes[HTTP_DATE_PREFIX_LEN..].iter().any(u8::is_ascii_whitespace);
    if valid {
        return Ok(());
    }
    Err(Error::format(format!(
        "invalid HTTP date <{value}>, expected a value like `Tue, 15 Nov 1994 08:12:31 GMT`"
    )))
}
