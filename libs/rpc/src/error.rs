use switchboard_fabric::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport or protocol failure on this caller's own operation
    #[error(transparent)]
    Fabric(#[from] switchboard_fabric::Error),

    /// The client was closed, or its connection had already failed
    #[error("connection is shut down")]
    ConnectionClosed,

    /// The connection failed while the call was in flight
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("registration failed: {0}")]
    Registration(String),

    /// Error reported by the remote handler, text preserved exactly
    #[error("{0}")]
    Application(String),

    /// Unknown service or method
    #[error("{0}")]
    Dispatch(String),

    /// The server could not decode the arguments for the method
    #[error("{0}")]
    InvalidRequest(String),
}

impl Error {
    /// Rebuild the caller-side error for a response header's error fields
    pub fn from_response(kind: ErrorKind, text: String) -> Self {
        match kind {
            ErrorKind::Dispatch => Error::Dispatch(text),
            ErrorKind::InvalidRequest => Error::InvalidRequest(text),
            ErrorKind::Application | ErrorKind::None => Error::Application(text),
        }
    }

    /// Whether the connection this error came from is still usable
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            // Frames this caller could not send were refused before any byte went out
            Error::Fabric(e) => e.is_connection(),
            Error::ConnectionClosed | Error::ConnectionLost(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
