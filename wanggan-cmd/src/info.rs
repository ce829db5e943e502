use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use serde::Serialize;
use std::{
    io::{stdout, Write},
    path::Path,
};
use tracing::debug;
use wanggan::{decode_tracks, Track};

/// How `info` reports a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize)]
struct TrackSummary {
    index: usize,
    kind: Option<String>,
    record_number: Option<u32>,
    timestamp: Option<String>,
    total_records: Option<u32>,
    points: usize,
    min_altitude: Option<i64>,
    max_altitude: Option<i64>,
}

impl TrackSummary {
    fn new(index: usize, track: &Track) -> Self {
        let header = track.header.as_ref();
        TrackSummary {
            index,
            kind: header.map(|h| h.kind.to_string()),
            record_number: header.map(|h| h.record_number),
            timestamp: header.map(|h| h.timestamp.to_string()),
            total_records: header.map(|h| h.total_records),
            points: track.points.len(),
            min_altitude: track.points.iter().map(|p| p.altitude).min(),
            max_altitude: track.points.iter().map(|p| p.altitude).max(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Info {
    filename: String,
    bytes: usize,
    track_count: usize,
    total_points: usize,
    tracks: Vec<TrackSummary>,
}

fn summarize(fpath: &Path) -> Result<Info> {
    let data = std::fs::read(fpath).with_context(|| format!("reading {fpath:?}"))?;
    let tracks = decode_tracks(&data);
    debug!("{} tracks in {} bytes", tracks.len(), data.len());

    Ok(Info {
        filename: fpath.to_string_lossy().to_string(),
        bytes: data.len(),
        track_count: tracks.len(),
        total_points: tracks.iter().map(|t| t.points.len()).sum(),
        tracks: tracks
            .iter()
            .enumerate()
            .map(|(idx, track)| TrackSummary::new(idx + 1, track))
            .collect(),
    })
}

fn write_info<W: Write>(info: &Info, format: Format, mut out: W) -> Result<()> {
    match format {
        Format::Json => serde_json::to_writer_pretty(out, info).context("serializing to json"),
        Format::Text => {
            let text = render_text(info)?;
            out.write_all(text.as_bytes()).context("writing text")
        }
    }
}

/// Summarize the tracks in the raw capture at `fpath` to stdout.
pub fn info(fpath: &Path, format: Format) -> Result<()> {
    let info = summarize(fpath)?;
    write_info(&info, format, stdout().lock())
}

fn render_text(info: &Info) -> Result<String> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => "-".to_string(),
            _ => v.to_string()
        };
        let width = usize::try_from(num).unwrap_or(0).max(v.len());
        format!("{v:>width$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("info", TEXT_TEMPLATE)
        .context("compiling template")?;

    hb.render("info", info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
===============================================================================
Bytes:    {{ bytes }}
Tracks:   {{ track_count }}
Points:   {{ total_points }}
-------------------------------------------------------------------------------
    #  Kind              Record  Timestamp           Total   Points  Alt min/max
-------------------------------------------------------------------------------
{{ #each tracks }}{{ lpad 5 index }}  {{ lpad 16 kind }}  {{ lpad 6 record_number }}  {{ lpad 16 timestamp }}  {{ lpad 6 total_records }}  {{ lpad 7 points }}  {{ lpad 5 min_altitude }}/{{ lpad 0 max_altitude }}
{{/each }}
";
