//! Line tokenizing and record classification for the device's text protocol.
//!
//! A full track export looks like this:
//! ```text
//! n0001,m0410000000,l-0082300000;t202401151030,N0005
//! +008d35'28.86540",+041d06'52.58100",01769;
//! +008d35'29.01230",+041d06'52.60000",01771;
//! !
//! ```
//! Each track begins with a header line and ends with a single `!` sentinel line. The
//! protocol has no escaping or checksums, so any line that does not match one of the
//! two grammars is dropped rather than failing the session.
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::codec::{parse_dms, scaled_degrees, CalendarMinute};
use crate::track::{RecordKind, TrackHeader, TrackPoint};

/// Line marking the end of one track's coordinate stream.
pub const END_OF_TRACK: &str = "!";

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^n(\d+),([a-z])([+-]?\d+),([a-z])([+-]?\d+);t(\d{12}),N(\d+)")
        .expect("header regex to compile")
});

static COORDINATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([+-]\d+d\d+'\d+\.\d+"),([+-]\d+d\d+'\d+\.\d+"),(\d+);"#)
        .expect("coordinate regex to compile")
});

/// A single classified protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Header(TrackHeader),
    Point(TrackPoint),
    /// The line matched neither grammar, or contained a malformed field.
    Unrecognized,
}

/// Decode raw session bytes to text, dropping any byte that is not ASCII.
#[must_use]
pub fn decode_text(buf: &[u8]) -> String {
    buf.iter()
        .copied()
        .filter(u8::is_ascii)
        .map(char::from)
        .collect()
}

/// Split `text` into trimmed, non-empty lines, skipping end-of-track sentinels.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != END_OF_TRACK)
}

/// Classify a single line, trying the header grammar first and then the coordinate
/// grammar.
#[must_use]
pub fn classify(line: &str) -> Record {
    if let Some(header) = parse_header(line) {
        return Record::Header(header);
    }
    if let Some(point) = parse_point(line) {
        return Record::Point(point);
    }
    Record::Unrecognized
}

/// Tokenize and classify every line in `text`. Unrecognized lines are dropped.
pub fn records(text: &str) -> impl Iterator<Item = Record> + '_ {
    tokenize(text)
        .enumerate()
        .filter_map(|(idx, line)| match classify(line) {
            Record::Unrecognized => {
                trace!(idx, line, "skipping unrecognized line");
                None
            }
            record => Some(record),
        })
}

/// Parse a header line of the form `n<num>,<a><val>,<b><val>;t<YYYYMMDDHHMM>,N<total>`.
///
/// The field code pair `(a, b)` determines the record kind and which of the two
/// scaled values is the latitude and which the longitude.
#[must_use]
pub fn parse_header(line: &str) -> Option<TrackHeader> {
    let cap = HEADER.captures(line)?;

    let record_number = saturating_u32(&cap[1]);
    let code1 = cap[2].chars().next()?;
    let value1 = saturating_i64(&cap[3]);
    let code2 = cap[4].chars().next()?;
    let value2 = saturating_i64(&cap[5]);
    let timestamp = CalendarMinute::decode(&cap[6])?;
    let total_records = saturating_u32(&cap[7]);

    let kind = RecordKind::from_codes(code1, code2);
    let (latitude, longitude) = match kind {
        RecordKind::Area | RecordKind::Waypoint => {
            (Some(scaled_degrees(value1)), Some(scaled_degrees(value2)))
        }
        RecordKind::Distance => (Some(scaled_degrees(value2)), Some(scaled_degrees(value1))),
        // The k value's meaning is unknown; latitude is only recoverable from the points.
        RecordKind::Track => (None, Some(scaled_degrees(value2))),
        RecordKind::Unknown(..) => (None, None),
    };

    Some(TrackHeader {
        kind,
        record_number,
        latitude,
        longitude,
        timestamp,
        total_records,
        raw_values: [value1, value2],
    })
}

/// Parse a coordinate line of the form `<lon DMS>,<lat DMS>,<altitude>;`.
#[must_use]
pub fn parse_point(line: &str) -> Option<TrackPoint> {
    let cap = COORDINATE.captures(line)?;

    Some(TrackPoint {
        longitude: parse_dms(&cap[1])?,
        latitude: parse_dms(&cap[2])?,
        altitude: saturating_i64(&cap[3]),
    })
}

// Digit runs already matched by a grammar can only fail to parse by overflowing.
fn saturating_u32(digits: &str) -> u32 {
    digits.parse().unwrap_or(u32::MAX)
}

fn saturating_i64(digits: &str) -> i64 {
    digits.parse().unwrap_or_else(|_| {
        if digits.starts_with('-') {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}
