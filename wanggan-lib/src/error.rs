#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The transport failed to write, flush or poll. Fatal to the current session.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("device not connected")]
    NotConnected,

    #[cfg(feature = "serial")]
    #[error(transparent)]
    Serial(#[from] serialport::Error),

    /// A text body could not be rendered from its template.
    #[error("render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
