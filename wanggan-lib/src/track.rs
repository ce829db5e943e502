//! Track data model and reassembly of classified records into tracks.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::CalendarMinute;
use crate::protocol::{decode_text, records, Record};

/// A single received coordinate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    /// Decimal degrees
    pub longitude: f64,
    /// Decimal degrees
    pub latitude: f64,
    pub altitude: i64,
}

/// Kind of data a header introduces, determined by its two field codes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Field codes `m,l`
    Area,
    /// Field codes `l,m`
    Distance,
    /// Field codes `p,p`
    Waypoint,
    /// Field codes `k,l`
    Track,
    /// Any other field code pair.
    Unknown(char, char),
}

impl RecordKind {
    #[must_use]
    pub fn from_codes(code1: char, code2: char) -> Self {
        match (code1, code2) {
            ('m', 'l') => Self::Area,
            ('l', 'm') => Self::Distance,
            ('p', 'p') => Self::Waypoint,
            ('k', 'l') => Self::Track,
            (a, b) => Self::Unknown(a, b),
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Area => write!(f, "Area"),
            Self::Distance => write!(f, "Distance"),
            Self::Waypoint => write!(f, "Waypoint"),
            Self::Track => write!(f, "Track"),
            Self::Unknown(a, b) => write!(f, "Unknown({a},{b})"),
        }
    }
}

/// Metadata line introducing a track.
///
/// `latitude` and `longitude` are `None` for kinds whose position is only recoverable
/// from the points that follow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackHeader {
    pub kind: RecordKind,
    pub record_number: u32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: CalendarMinute,
    pub total_records: u32,
    /// The two scaled integer fields as received, in line order.
    pub raw_values: [i64; 2],
}

impl TrackHeader {
    /// Display name, e.g., `Area 1`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{} {}", self.kind, self.record_number)
    }

    /// File name stem, e.g., `area_n0001_20240115_1030`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!(
            "{}_n{:04}_{}",
            self.kind.to_string().to_lowercase(),
            self.record_number,
            self.timestamp.slug()
        )
    }
}

/// A header and the points received after it.
///
/// A track without a header holds points received before any header line.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub header: Option<TrackHeader>,
    pub points: Vec<TrackPoint>,
}

impl Track {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.points.is_empty()
    }
}

/// Iterator grouping [Record]s into [Track]s. Created using [assemble].
pub struct TrackIter<I>
where
    I: Iterator<Item = Record>,
{
    records: I,
    current: Track,
    done: bool,
}

impl<I> Iterator for TrackIter<I>
where
    I: Iterator<Item = Record>,
{
    type Item = Track;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        for record in self.records.by_ref() {
            match record {
                Record::Header(header) => {
                    let finished = std::mem::replace(
                        &mut self.current,
                        Track {
                            header: Some(header),
                            points: Vec::default(),
                        },
                    );
                    if !finished.is_empty() {
                        return Some(finished);
                    }
                }
                Record::Point(point) => self.current.points.push(point),
                Record::Unrecognized => (),
            }
        }

        // Input is exhausted, flush whatever is left
        self.done = true;
        let last = std::mem::take(&mut self.current);
        if last.is_empty() {
            None
        } else {
            Some(last)
        }
    }
}

/// Fold classified records into tracks in reception order.
///
/// Every header starts a new track, even when the previous track has no points. Points
/// received before any header are grouped into a leading track with no header.
pub fn assemble<I>(records: I) -> TrackIter<I::IntoIter>
where
    I: IntoIterator<Item = Record>,
{
    TrackIter {
        records: records.into_iter(),
        current: Track::default(),
        done: false,
    }
}

/// Decode a raw session buffer into tracks.
///
/// Lines that cannot be parsed are skipped, so a completely unparseable buffer
/// results in no tracks rather than an error.
#[must_use]
pub fn decode_tracks(buf: &[u8]) -> Vec<Track> {
    let text = decode_text(buf);
    let tracks: Vec<Track> = assemble(records(&text)).collect();
    debug!(
        bytes = buf.len(),
        tracks = tracks.len(),
        points = tracks.iter().map(|t| t.points.len()).sum::<usize>(),
        "decoded session"
    );
    tracks
}
