//! Rendering of tracks to GPX, KML and CSV text bodies.
//!
//! Encoding is pure: documents are returned in memory with a suggested file name and
//! writing them is left to the caller.
use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::CalendarMinute;
use crate::device::DownloadMode;
use crate::track::{Track, TrackPoint};
use crate::{Error, Result};

/// Name used for a document combining the points of every track.
pub const COMBINED_NAME: &str = "GPS Track";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Gpx,
    Kml,
    Csv,
}

impl Format {
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gpx => "gpx",
            Self::Kml => "kml",
            Self::Csv => "csv",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gpx" => Ok(Self::Gpx),
            "kml" => Ok(Self::Kml),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("invalid format: {s}")),
        }
    }
}

/// A rendered text body and the file name it should be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub body: String,
}

#[derive(Serialize)]
struct PointContext {
    lon: String,
    lat: String,
    alt: i64,
}

#[derive(Serialize)]
struct DocumentContext<'a> {
    name: &'a str,
    when: Option<String>,
    points: Vec<PointContext>,
}

/// Renders point sequences using the format templates.
pub struct Encoder {
    hb: Handlebars<'static>,
}

impl Encoder {
    /// # Errors
    /// [Error::Render] if a template fails to compile.
    pub fn new() -> Result<Self> {
        let mut hb = Handlebars::new();
        for (format, template) in [
            (Format::Gpx, GPX_TEMPLATE),
            (Format::Kml, KML_TEMPLATE),
            (Format::Csv, CSV_TEMPLATE),
        ] {
            hb.register_template_string(format.extension(), template)
                .map_err(|err| Error::Render(err.to_string()))?;
        }
        Ok(Encoder { hb })
    }

    /// Render `points` as `format`.
    ///
    /// `name` is used as the track or placemark name; CSV has no name. `timestamp`
    /// is only used by KML, where it adds a time stamp to the placemark and is
    /// appended to the display name.
    ///
    /// # Errors
    /// [Error::Render] if rendering fails.
    pub fn encode(
        &self,
        format: Format,
        points: &[TrackPoint],
        name: &str,
        timestamp: Option<&CalendarMinute>,
    ) -> Result<String> {
        let (name, when) = match (format, timestamp) {
            (Format::Kml, Some(ts)) => (format!("{name} - {ts}"), Some(ts.xml_datetime())),
            _ => (name.to_string(), None),
        };
        let context = DocumentContext {
            name: &name,
            when,
            points: points
                .iter()
                .map(|p| PointContext {
                    lon: format!("{:.7}", p.longitude),
                    lat: format!("{:.7}", p.latitude),
                    alt: p.altitude,
                })
                .collect(),
        };

        self.hb
            .render(format.extension(), &context)
            .map_err(|err| Error::Render(err.to_string()))
    }
}

/// Plan the documents to write for `tracks`.
///
/// With `split`, and if at least one track has a header, each track with points
/// becomes its own document named after its header, or `<prefix>_<index>` for a
/// track without one. Tracks without points are skipped. Otherwise the points of
/// every track are concatenated in order into a single `<prefix>.<ext>` document.
///
/// # Errors
/// [Error::Render] if rendering fails.
pub fn plan_documents(
    tracks: &[Track],
    format: Format,
    split: bool,
    prefix: &str,
) -> Result<Vec<Document>> {
    let encoder = Encoder::new()?;

    if split && tracks.iter().any(|t| t.header.is_some()) {
        let mut documents = Vec::new();
        for (idx, track) in tracks.iter().enumerate() {
            if track.points.is_empty() {
                debug!(idx, "skipping track without points");
                continue;
            }
            let (stem, name, timestamp) = match &track.header {
                Some(header) => (header.file_stem(), header.name(), Some(&header.timestamp)),
                None => (
                    format!("{prefix}_{:04}", idx + 1),
                    format!("Track {}", idx + 1),
                    None,
                ),
            };
            documents.push(Document {
                file_name: format!("{stem}.{}", format.extension()),
                body: encoder.encode(format, &track.points, &name, timestamp)?,
            });
        }
        return Ok(documents);
    }

    let points: Vec<TrackPoint> = tracks
        .iter()
        .flat_map(|t| t.points.iter().copied())
        .collect();
    Ok(vec![Document {
        file_name: format!("{prefix}.{}", format.extension()),
        body: encoder.encode(format, &points, COMBINED_NAME, None)?,
    }])
}

/// File name for a verbatim session capture, e.g., `gps_export_tilde_20240115_103000.txt`.
#[must_use]
pub fn raw_capture_name<Tz>(mode: DownloadMode, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("gps_export_{}_{}.txt", mode.name(), now.format("%Y%m%d_%H%M%S"))
}

const GPX_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Wanggan GPS Rust Library"
  xmlns="http://www.topografix.com/GPX/1/1"
  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">
  <trk>
    <name>{{ name }}</name>
    <trkseg>
{{#each points}}      <trkpt lat="{{ lat }}" lon="{{ lon }}">
        <ele>{{ alt }}</ele>
      </trkpt>
{{/each}}    </trkseg>
  </trk>
</gpx>
"#;

const KML_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>{{ name }}</name>
    <Placemark>
      <name>{{ name }}</name>{{#if when}}
      <TimeStamp>
        <when>{{ when }}</when>
      </TimeStamp>{{/if}}
      <LineString>
        <coordinates>
{{#each points}}          {{ lon }},{{ lat }},{{ alt }}
{{/each}}        </coordinates>
      </LineString>
    </Placemark>
  </Document>
</kml>
"#;

const CSV_TEMPLATE: &str = "longitude,latitude,altitude
{{#each points}}{{ lon }},{{ lat }},{{ alt }}
{{/each}}";
