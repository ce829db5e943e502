//! Field codecs for the device's text encoding.
//!
//! Coordinates are sent as signed degrees-minutes-seconds tokens, e.g.,
//! `-008d35'28.86540"`, and timestamps as a packed 12 digit `YYYYMMDDHHMM` string.
use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Divisor for the scaled integer geodetic fields found in header records.
pub const SCALED_DEGREES: f64 = 10_000_000.0;

/// Number of digits in a packed header timestamp.
pub const TIMESTAMP_DIGITS: usize = 12;

static DMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([+-])(\d+)d(\d+)'(\d+\.\d+)"$"#).expect("dms regex to compile")
});

/// Convert a degrees-minutes-seconds token to decimal degrees.
///
/// The sign applies to the final value, i.e., `sign * (deg + min/60 + sec/3600)`.
/// Returns `None` if `token` is not a well formed DMS token.
///
/// # Example
/// ```
/// let lon = wanggan::codec::parse_dms("-008d35'28.86540\"").unwrap();
/// assert!((lon + 8.591_351).abs() < 1e-6);
/// ```
#[must_use]
pub fn parse_dms(token: &str) -> Option<f64> {
    let cap = DMS.captures(token)?;
    let sign = if &cap[1] == "-" { -1.0 } else { 1.0 };
    let degrees: f64 = cap[2].parse().ok()?;
    let minutes: f64 = cap[3].parse().ok()?;
    let seconds: f64 = cap[4].parse().ok()?;

    Some(sign * (degrees + minutes / 60.0 + seconds / 3600.0))
}

/// Convert a scaled integer header field to decimal degrees.
#[must_use]
pub fn scaled_degrees(value: i64) -> f64 {
    value as f64 / SCALED_DEGREES
}

/// Minute resolution calendar time as packed by the device.
///
/// Values are passed through from the packed digits without checking that they
/// form a real calendar date.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarMinute {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

impl CalendarMinute {
    /// Decode from the packed `YYYYMMDDHHMM` digits, or `None` if `packed` is not exactly
    /// 12 ASCII digits.
    #[must_use]
    pub fn decode(packed: &str) -> Option<Self> {
        if packed.len() != TIMESTAMP_DIGITS || !packed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(CalendarMinute {
            year: packed[0..4].parse().ok()?,
            month: packed[4..6].parse().ok()?,
            day: packed[6..8].parse().ok()?,
            hour: packed[8..10].parse().ok()?,
            minute: packed[10..12].parse().ok()?,
        })
    }

    /// Compact form used in file names, e.g., `20240115_1030`.
    #[must_use]
    pub fn slug(&self) -> String {
        format!(
            "{:04}{:02}{:02}_{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }

    /// XML schema dateTime form used by KML, e.g., `2024-01-15T10:30:00Z`.
    #[must_use]
    pub fn xml_datetime(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:00Z",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

impl Display for CalendarMinute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}
