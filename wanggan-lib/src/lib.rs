//! Wanggan handheld GPS transfer protocol decoding.
//!
//! The device streams a line oriented text protocol over a serial link after it
//! receives a single trigger byte. This crate receives a session from the device,
//! classifies each line as a track header or a coordinate record, reassembles the
//! records into tracks and renders them as GPX, KML or CSV text bodies.
//!
//! ```
//! let data = b"n0001,m0410000000,l-0082300000;t202401151030,N0005\n\
//!              +008d35'28.86540\",+041d06'52.58100\",01769;\n!\n";
//! let tracks = wanggan::decode_tracks(data);
//! assert_eq!(tracks.len(), 1);
//! assert_eq!(tracks[0].points.len(), 1);
//! ```
mod error;

pub mod codec;
pub mod device;
pub mod export;
pub mod protocol;
pub mod receiver;
pub mod track;
pub mod transport;

pub use codec::CalendarMinute;
pub use device::{DeviceConfig, DownloadMode, Session};
pub use error::{Error, Result};
pub use export::{plan_documents, Document, Encoder, Format};
pub use protocol::Record;
pub use receiver::{receive, Capture, ReceiveOpts, Termination};
pub use track::{assemble, decode_tracks, RecordKind, Track, TrackHeader, TrackPoint};
pub use transport::SerialChannel;
