//! Device session handling.
use std::fmt::Display;
use std::str::FromStr;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::receiver::{receive, Capture, ReceiveOpts};
use crate::transport::SerialChannel;
use crate::Result;

/// Download mode, selected by the trigger byte sent to the device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadMode {
    /// `~`: every track, each introduced by a header line.
    FullTrack,
    /// `!`: all coordinates without headers.
    BulkCoordinates,
    /// `^`: binary metadata. The payload is not decoded.
    Metadata,
}

impl DownloadMode {
    pub const ALL: [DownloadMode; 3] = [Self::FullTrack, Self::BulkCoordinates, Self::Metadata];

    #[must_use]
    pub fn trigger(&self) -> u8 {
        match self {
            Self::FullTrack => 0x7e,
            Self::BulkCoordinates => 0x21,
            Self::Metadata => 0x5e,
        }
    }

    #[must_use]
    pub fn from_trigger(trigger: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.trigger() == trigger)
    }

    /// Short name derived from the trigger character.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FullTrack => "tilde",
            Self::BulkCoordinates => "exclamation",
            Self::Metadata => "caret",
        }
    }

    /// True if the mode produces the line oriented text protocol.
    #[must_use]
    pub fn is_text(&self) -> bool {
        !matches!(self, Self::Metadata)
    }
}

impl Display for DownloadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DownloadMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tilde" | "~" | "full" => Ok(Self::FullTrack),
            "exclamation" | "!" | "bulk" => Ok(Self::BulkCoordinates),
            "caret" | "^" | "metadata" => Ok(Self::Metadata),
            _ => Err(format!("invalid download mode: {s}")),
        }
    }
}

/// Serial connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Serial read timeout
    pub timeout: Duration,
    /// Time for the port to stabilize after opening.
    pub settle_delay: Duration,
}

impl DeviceConfig {
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;

    pub fn new(port: &str) -> Self {
        DeviceConfig {
            port: port.to_string(),
            baud_rate: Self::DEFAULT_BAUD_RATE,
            timeout: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// An open connection to a device.
///
/// The channel is released when the session is dropped, or explicitly with
/// [Session::close] to observe any error releasing it.
pub struct Session<C: SerialChannel> {
    channel: C,
    closed: bool,
}

#[cfg(feature = "serial")]
impl Session<crate::transport::SerialPortChannel> {
    /// Open the serial port described by `config` and wait for it to settle.
    ///
    /// # Errors
    /// [crate::Error::Serial] if the port cannot be opened.
    pub fn connect(config: &DeviceConfig) -> Result<Self> {
        let channel = crate::transport::SerialPortChannel::open(
            &config.port,
            config.baud_rate,
            config.timeout,
        )?;
        info!(port = config.port.as_str(), baud_rate = config.baud_rate, "connected");
        Ok(Session::with_channel(channel, config.settle_delay))
    }
}

impl<C: SerialChannel> Session<C> {
    /// Start a session on an already open channel, waiting `settle_delay` first.
    pub fn with_channel(channel: C, settle_delay: Duration) -> Self {
        sleep(settle_delay);
        Session {
            channel,
            closed: false,
        }
    }

    /// Trigger a download in `mode` and receive the session's bytes.
    ///
    /// # Errors
    /// Any transport [crate::Error].
    pub fn download(&mut self, mode: DownloadMode, opts: &ReceiveOpts) -> Result<Capture> {
        info!(%mode, "downloading");
        let capture = receive(&mut self.channel, mode.trigger(), opts)?;
        if capture.is_empty() {
            warn!(%mode, "no data received");
        }
        Ok(capture)
    }

    /// Release the channel.
    ///
    /// # Errors
    /// Any error from the underlying channel while closing.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.channel.close()
    }
}

impl<C: SerialChannel> Drop for Session<C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.channel.close() {
            debug!("failed to close channel: {err}");
        }
    }
}
