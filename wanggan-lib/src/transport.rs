//! Byte transport to the device.
//!
//! The decoder never assumes a serial port. It only needs to clear pending input,
//! write a trigger, poll for whatever bytes are available and close.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// A byte channel to the device.
pub trait SerialChannel {
    /// Discard any bytes received but not yet read.
    ///
    /// # Errors
    /// [Error] if the channel is unavailable.
    fn clear_input(&mut self) -> Result<()>;

    /// Write and flush `data`.
    ///
    /// # Errors
    /// [Error::Transport] if the write or flush fails.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Return the bytes currently available without blocking. An empty result means
    /// nothing has arrived since the last poll.
    ///
    /// # Errors
    /// [Error] if the channel is unavailable or the read fails.
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Release the channel. Further calls should fail with [Error::NotConnected].
    ///
    /// # Errors
    /// [Error] if the channel could not be released cleanly.
    fn close(&mut self) -> Result<()>;
}

impl<C: SerialChannel + ?Sized> SerialChannel for Box<C> {
    fn clear_input(&mut self) -> Result<()> {
        (**self).clear_input()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        (**self).read_available()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

#[cfg(feature = "serial")]
pub use serial::SerialPortChannel;

#[cfg(feature = "serial")]
mod serial {
    use std::io::{Read, Write};
    use std::time::Duration;

    use serialport::{ClearBuffer, SerialPort};
    use tracing::debug;

    use super::SerialChannel;
    use crate::{Error, Result};

    /// [SerialChannel] backed by a native serial port.
    pub struct SerialPortChannel {
        name: String,
        port: Option<Box<dyn SerialPort>>,
    }

    impl SerialPortChannel {
        /// Open the serial port at `path`.
        ///
        /// # Errors
        /// [Error::Serial] if the port cannot be opened.
        pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
            let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
            debug!(port = path, baud_rate, "opened serial port");
            Ok(SerialPortChannel {
                name: path.to_string(),
                port: Some(port),
            })
        }

        fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
            self.port.as_mut().ok_or(Error::NotConnected)
        }
    }

    impl SerialChannel for SerialPortChannel {
        fn clear_input(&mut self) -> Result<()> {
            self.port()?.clear(ClearBuffer::Input)?;
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<()> {
            let port = self.port()?;
            port.write_all(data)
                .map_err(|err| Error::Transport(format!("write failed: {err}")))?;
            port.flush()
                .map_err(|err| Error::Transport(format!("flush failed: {err}")))
        }

        fn read_available(&mut self) -> Result<Vec<u8>> {
            let port = self.port()?;
            let waiting = port.bytes_to_read()? as usize;
            if waiting == 0 {
                return Ok(Vec::new());
            }
            let mut buf = vec![0u8; waiting];
            let num = port
                .read(&mut buf)
                .map_err(|err| Error::Transport(format!("read failed: {err}")))?;
            buf.truncate(num);
            Ok(buf)
        }

        fn close(&mut self) -> Result<()> {
            // Dropping the port handle closes it
            if self.port.take().is_some() {
                debug!(port = %self.name, "closed serial port");
            }
            Ok(())
        }
    }
}

/// In-memory [SerialChannel] that replays scripted chunks.
///
/// Chunk delays are measured from the most recent write, i.e., from when the trigger
/// was sent, so a script reads like the device's transmission timeline.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    pending: VecDeque<(Duration, Vec<u8>)>,
    written: Vec<u8>,
    triggered: Option<Instant>,
    fail_writes: bool,
    closed: Arc<AtomicBool>,
}

impl ScriptedChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `data` available `after` the trigger has been written.
    #[must_use]
    pub fn chunk(mut self, after: Duration, data: &[u8]) -> Self {
        self.pending.push_back((after, data.to_vec()));
        self
    }

    /// Fail every write with [Error::Transport].
    #[must_use]
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// All bytes written so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Flag set once the channel is closed, observable after the channel is moved.
    #[must_use]
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        Ok(())
    }
}

impl SerialChannel for ScriptedChannel {
    fn clear_input(&mut self) -> Result<()> {
        self.check_open()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.check_open()?;
        if self.fail_writes {
            return Err(Error::Transport("scripted write failure".to_string()));
        }
        self.written.extend_from_slice(data);
        self.triggered = Some(Instant::now());
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        self.check_open()?;
        let Some(triggered) = self.triggered else {
            return Ok(Vec::new());
        };
        let elapsed = triggered.elapsed();
        let mut buf = Vec::new();
        while let Some((after, _)) = self.pending.front() {
            if *after > elapsed {
                break;
            }
            if let Some((_, data)) = self.pending.pop_front() {
                buf.extend(data);
            }
        }
        Ok(buf)
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scripted_channel_nothing_before_trigger() {
        let mut chan = ScriptedChannel::new().chunk(Duration::ZERO, b"abc");
        assert!(chan.read_available().unwrap().is_empty());

        chan.write(&[0x7e]).unwrap();
        assert_eq!(chan.read_available().unwrap(), b"abc");
        assert!(chan.read_available().unwrap().is_empty());
        assert_eq!(chan.written(), &[0x7e]);
    }

    #[test]
    fn scripted_channel_delays_chunks() {
        let mut chan = ScriptedChannel::new()
            .chunk(Duration::ZERO, b"a")
            .chunk(Duration::from_secs(3600), b"b");
        chan.write(b"!").unwrap();

        assert_eq!(chan.read_available().unwrap(), b"a");
        assert!(chan.read_available().unwrap().is_empty());
    }

    #[test]
    fn scripted_channel_closed() {
        let mut chan = ScriptedChannel::new();
        let closed = chan.closed_flag();
        chan.close().unwrap();

        assert!(closed.load(Ordering::SeqCst));
        assert!(matches!(chan.write(b"~"), Err(Error::NotConnected)));
        assert!(matches!(chan.read_available(), Err(Error::NotConnected)));
    }
}
