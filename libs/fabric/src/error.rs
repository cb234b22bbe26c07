use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("{0} timeout exceeded")]
    Timeout(&'static str),

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Malformed bytes on the wire. The connection cannot be resynchronised.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::InvalidFrame(_) | Error::ChecksumMismatch { .. })
    }

    /// The peer went away or the stream failed underneath us.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Io(_) | Error::ConnectionClosed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
