mod export;
mod info;

use std::io::stderr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wanggan::{DeviceConfig, DownloadMode, ReceiveOpts, Session};

use export::OutputFormat;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download data from a device and export it.
    ///
    /// The device streams its data after receiving a trigger byte selected by --mode.
    /// Reception ends once the device has been silent for --idle-timeout seconds, or
    /// after --timeout seconds in total.
    Download {
        /// Serial port, e.g., /dev/ttyUSB0 or COM5
        #[arg(short, long)]
        port: String,

        #[arg(short, long, default_value_t = DeviceConfig::DEFAULT_BAUD_RATE)]
        baud: u32,

        /// Download mode: tilde (tracks with headers), exclamation (coordinates only)
        /// or caret (binary metadata, saved raw).
        #[arg(short, long, default_value = "tilde")]
        mode: DownloadMode,

        /// Output format
        #[arg(short, long, default_value = "kml")]
        format: OutputFormat,

        /// Write one file per track instead of a single combined file.
        #[arg(long, action)]
        split: bool,

        /// Also save the raw bytes received.
        #[arg(long, action)]
        save_raw: bool,

        /// Maximum seconds to wait for the download.
        #[arg(long, default_value_t = 60.0, value_name = "secs")]
        timeout: f64,

        /// Seconds of silence after which the download is considered complete.
        #[arg(long, default_value_t = 3.0, value_name = "secs")]
        idle_timeout: f64,

        /// Overwrite existing output files
        #[arg(long, action)]
        clobber: bool,

        /// Output directory
        #[arg(short, long, default_value = "downloads", value_name = "path")]
        output_dir: PathBuf,

        /// File name prefix for combined and headerless track output.
        #[arg(long, default_value = "track")]
        prefix: String,
    },
    /// Convert a previously saved raw download.
    Convert {
        /// Raw download file
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "kml")]
        format: OutputFormat,

        /// Write one file per track instead of a single combined file.
        #[arg(long, action)]
        split: bool,

        /// Overwrite existing output files
        #[arg(long, action)]
        clobber: bool,

        /// Output directory
        #[arg(short, long, default_value = "downloads", value_name = "path")]
        output_dir: PathBuf,

        /// File name prefix for combined and headerless track output.
        #[arg(long, default_value = "track")]
        prefix: String,
    },
    /// Show the tracks contained in a raw download.
    Info {
        /// Raw download file
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: info::Format,
    },
    /// List available serial ports.
    Ports,
}

fn seconds(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("invalid duration {secs}"))
}

fn download(
    config: &DeviceConfig,
    mode: DownloadMode,
    opts: &ReceiveOpts,
    dest: &export::Destination,
    format: &OutputFormat,
    split: bool,
    save_raw: bool,
) -> Result<()> {
    let capture = {
        let mut session = Session::connect(config)
            .with_context(|| format!("failed to connect to {}", config.port))?;
        session.download(mode, opts).context("download failed")?
    };

    if capture.is_empty() {
        warn!("device sent no data");
        return Ok(());
    }
    info!("received {} bytes in {} chunks", capture.data.len(), capture.chunks);

    export::store_capture(&capture.data, mode, format, split, save_raw, dest)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("WANGGAN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Download {
            port,
            baud,
            mode,
            format,
            split,
            save_raw,
            timeout,
            idle_timeout,
            clobber,
            output_dir,
            prefix,
        } => {
            let config = DeviceConfig::new(port).with_baud_rate(*baud);
            let opts = ReceiveOpts::builder()
                .hard_timeout(seconds(*timeout)?)
                .idle_timeout(seconds(*idle_timeout)?)
                .build();
            let dest = export::Destination::new(output_dir, prefix, *clobber)?;
            download(&config, *mode, &opts, &dest, format, *split, *save_raw)
        }
        Commands::Convert {
            input,
            format,
            split,
            clobber,
            output_dir,
            prefix,
        } => {
            let data = std::fs::read(input).with_context(|| format!("reading {input:?}"))?;
            let dest = export::Destination::new(output_dir, prefix, *clobber)?;
            export::export(&data, format, *split, &dest)?;
            Ok(())
        }
        Commands::Info { input, format } => info::info(input, *format),
        Commands::Ports => {
            let ports = serialport::available_ports().context("listing serial ports")?;
            if ports.is_empty() {
                warn!("no serial ports found");
            }
            for port in ports {
                println!("{}\t{:?}", port.port_name, port.port_type);
            }
            Ok(())
        }
    }
}
