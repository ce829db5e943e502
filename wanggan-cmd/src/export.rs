use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::{info, warn};
use wanggan::export::raw_capture_name;
use wanggan::{decode_tracks, plan_documents, Document, DownloadMode, Format};

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Gpx,
    Kml,
    Csv,
    /// Bytes exactly as received from the device
    Raw,
}

impl OutputFormat {
    fn encoding(&self) -> Option<Format> {
        match self {
            Self::Gpx => Some(Format::Gpx),
            Self::Kml => Some(Format::Kml),
            Self::Csv => Some(Format::Csv),
            Self::Raw => None,
        }
    }
}

impl clap::ValueEnum for OutputFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Gpx, Self::Kml, Self::Csv, Self::Raw]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Gpx => Some(clap::builder::PossibleValue::new("gpx")),
            Self::Kml => Some(clap::builder::PossibleValue::new("kml")),
            Self::Csv => Some(clap::builder::PossibleValue::new("csv")),
            Self::Raw => Some(clap::builder::PossibleValue::new("raw")),
        }
    }
}

/// Where output files go.
pub struct Destination {
    dir: PathBuf,
    prefix: String,
    clobber: bool,
}

impl Destination {
    pub fn new(dir: &Path, prefix: &str, clobber: bool) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating output dir {dir:?}"))?;
        Ok(Destination {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            clobber,
        })
    }

    /// Write every document, or none of them if any would overwrite an existing
    /// file without clobber.
    fn write_all(&self, files: &[(String, &[u8])]) -> Result<Vec<PathBuf>> {
        let paths: Vec<PathBuf> = files.iter().map(|(name, _)| self.dir.join(name)).collect();
        if !self.clobber {
            let existing: Vec<&PathBuf> = paths.iter().filter(|p| p.exists()).collect();
            if !existing.is_empty() {
                bail!("{existing:?} already exist; use --clobber");
            }
        }
        for (path, (_, contents)) in paths.iter().zip(files) {
            fs::write(path, contents).with_context(|| format!("failed to write {path:?}"))?;
            info!("saved {path:?}");
        }
        Ok(paths)
    }
}

/// Save a verbatim capture using a mode and time stamped name.
pub fn save_capture(data: &[u8], mode: DownloadMode, dest: &Destination) -> Result<PathBuf> {
    let path = dest.dir.join(raw_capture_name(mode, &Local::now()));
    if !dest.clobber && path.exists() {
        bail!("{path:?} exists; use --clobber");
    }
    fs::write(&path, data).with_context(|| format!("failed to write {path:?}"))?;
    info!("saved raw capture {path:?}");
    Ok(path)
}

/// Decode `data` and write it to `dest` in `format`.
pub fn export(
    data: &[u8],
    format: &OutputFormat,
    split: bool,
    dest: &Destination,
) -> Result<Vec<PathBuf>> {
    let Some(encoding) = format.encoding() else {
        return dest.write_all(&[(format!("{}.txt", dest.prefix), data)]);
    };

    let tracks = decode_tracks(data);
    info!(
        "decoded {} tracks with {} points",
        tracks.len(),
        tracks.iter().map(|t| t.points.len()).sum::<usize>()
    );
    let documents: Vec<Document> = plan_documents(&tracks, encoding, split, &dest.prefix)
        .context("rendering documents")?;
    let files: Vec<(String, &[u8])> = documents
        .iter()
        .map(|doc| (doc.file_name.clone(), doc.body.as_bytes()))
        .collect();

    let paths = dest.write_all(&files)?;
    info!("created {} file(s)", paths.len());
    Ok(paths)
}

/// Store a capture received from the device in `mode`.
///
/// Metadata captures are only saved raw. Text captures are exported, and the raw
/// bytes are kept whenever `save_raw` is set or the export fails.
pub fn store_capture(
    data: &[u8],
    mode: DownloadMode,
    format: &OutputFormat,
    split: bool,
    save_raw: bool,
    dest: &Destination,
) -> Result<()> {
    if !mode.is_text() {
        save_capture(data, mode, dest)?;
        let preview: Vec<String> = data.iter().take(20).map(|b| format!("{b:02X}")).collect();
        info!("metadata is not decoded; first bytes: {}", preview.join(" "));
        return Ok(());
    }

    let saved = if save_raw {
        Some(save_capture(data, mode, dest)?)
    } else {
        None
    };
    if let Err(err) = export(data, format, split, dest) {
        if saved.is_none() {
            let path = save_capture(data, mode, dest)?;
            warn!("export failed; raw capture kept at {path:?}");
        }
        return Err(err);
    }
    Ok(())
}
