//! Session reception.
//!
//! The device has no end-of-transmission marker at the stream level, only a sentinel
//! line after each track. Once triggered it streams every track and then goes quiet,
//! so a session is considered complete after a period of silence following the first
//! received byte. A hard timeout bounds the worst case, e.g., a device that never
//! answers.
use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use typed_builder::TypedBuilder;

use crate::transport::SerialChannel;
use crate::Result;

/// Timing parameters for [receive].
#[derive(TypedBuilder, Debug, Clone)]
pub struct ReceiveOpts {
    /// Maximum time to poll for data, measured from the start of polling.
    #[builder(default = Duration::from_secs(60))]
    pub hard_timeout: Duration,
    /// Silence after the most recent chunk that ends the session.
    #[builder(default = Duration::from_secs(3))]
    pub idle_timeout: Duration,
    /// Time given to the device to start transmitting after the trigger.
    #[builder(default = Duration::from_millis(200))]
    pub settle_delay: Duration,
    /// Delay between polls of the channel.
    #[builder(default = Duration::from_millis(50))]
    pub poll_interval: Duration,
}

impl Default for ReceiveOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Why reception stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The device went silent for the idle timeout after sending data.
    Idle,
    /// The hard timeout elapsed.
    HardTimeout,
}

/// Bytes received during one session.
#[derive(Debug, Clone)]
pub struct Capture {
    pub data: Vec<u8>,
    /// Number of non-empty polls
    pub chunks: usize,
    pub termination: Termination,
    pub elapsed: Duration,
}

impl Capture {
    /// True if the device sent nothing. This is a valid outcome, not an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Send `trigger` and collect bytes from `channel` until the idle or hard timeout.
///
/// The idle clock only starts with the first received chunk, so a slow device is
/// bounded only by the hard timeout. Receiving nothing results in an empty [Capture].
///
/// # Errors
/// Any transport [crate::Error]. Errors are not retried.
pub fn receive<C>(channel: &mut C, trigger: u8, opts: &ReceiveOpts) -> Result<Capture>
where
    C: SerialChannel + ?Sized,
{
    channel.clear_input()?;
    channel.write(&[trigger])?;
    debug!("sent trigger 0x{trigger:02X}");

    sleep(opts.settle_delay);

    let start = Instant::now();
    let mut last_data: Option<Instant> = None;
    let mut data: Vec<u8> = Vec::new();
    let mut chunks = 0usize;

    let termination = loop {
        if start.elapsed() >= opts.hard_timeout {
            break Termination::HardTimeout;
        }

        let chunk = channel.read_available()?;
        if chunk.is_empty() {
            if let Some(last) = last_data {
                if last.elapsed() >= opts.idle_timeout {
                    break Termination::Idle;
                }
            }
        } else {
            data.extend_from_slice(&chunk);
            chunks += 1;
            last_data = Some(Instant::now());
            if chunks % 10 == 0 {
                debug!(chunks, bytes = data.len(), "receiving");
            }
        }

        sleep(opts.poll_interval);
    };

    let elapsed = start.elapsed();
    info!(
        chunks,
        bytes = data.len(),
        ?termination,
        elapsed_ms = elapsed.as_millis() as u64,
        "reception ended"
    );

    Ok(Capture {
        data,
        chunks,
        termination,
        elapsed,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::ScriptedChannel;
    use crate::Error;

    fn fast_opts(hard: Duration, idle: Duration) -> ReceiveOpts {
        ReceiveOpts::builder()
            .hard_timeout(hard)
            .idle_timeout(idle)
            .settle_delay(Duration::ZERO)
            .poll_interval(Duration::from_millis(5))
            .build()
    }

    #[test]
    fn default_opts() {
        let opts = ReceiveOpts::default();
        assert_eq!(opts.hard_timeout, Duration::from_secs(60));
        assert_eq!(opts.idle_timeout, Duration::from_secs(3));
        assert_eq!(opts.settle_delay, Duration::from_millis(200));
        assert_eq!(opts.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn receive_ends_on_idle() {
        let mut chan = ScriptedChannel::new()
            .chunk(Duration::from_millis(0), b"one,")
            .chunk(Duration::from_millis(20), b"two,")
            .chunk(Duration::from_millis(40), b"three");
        let opts = fast_opts(Duration::from_secs(10), Duration::from_millis(100));

        let capture = receive(&mut chan, 0x7e, &opts).unwrap();

        assert_eq!(capture.data, b"one,two,three");
        assert!((1..=3).contains(&capture.chunks));
        assert_eq!(capture.termination, Termination::Idle);
        assert!(capture.elapsed < Duration::from_secs(10));
        assert_eq!(chan.written(), &[0x7e]);
    }

    #[test]
    fn receive_empty_on_hard_timeout() {
        let mut chan = ScriptedChannel::new();
        let opts = fast_opts(Duration::from_millis(50), Duration::from_millis(10));

        let capture = receive(&mut chan, 0x21, &opts).unwrap();

        assert!(capture.is_empty());
        assert_eq!(capture.termination, Termination::HardTimeout);
    }

    #[test]
    fn receive_hard_timeout_with_slow_stream() {
        let mut chan = ScriptedChannel::new()
            .chunk(Duration::ZERO, b"a")
            .chunk(Duration::from_millis(30), b"b")
            .chunk(Duration::from_secs(3600), b"c");
        let opts = fast_opts(Duration::from_millis(100), Duration::from_secs(10));

        let capture = receive(&mut chan, 0x7e, &opts).unwrap();

        assert_eq!(capture.data, b"ab");
        assert_eq!(capture.termination, Termination::HardTimeout);
    }

    #[test]
    fn receive_write_failure_is_fatal() {
        let mut chan = ScriptedChannel::new()
            .chunk(Duration::ZERO, b"never read")
            .failing_writes();
        let opts = fast_opts(Duration::from_secs(1), Duration::from_millis(10));

        let zult = receive(&mut chan, 0x7e, &opts);

        assert!(matches!(zult, Err(Error::Transport(_))));
    }
}
