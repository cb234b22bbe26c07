//! Request/response envelopes.
//!
//! Every frame carries one envelope:
//!
//! ```text
//! [length: u32 BE][header: bincode][payload: snappy, N bytes]
//! ```
//!
//! The length prefix is written by the transport. The header is decoded from
//! the front of the frame and whatever follows it is the snappy-compressed
//! payload. The header records the uncompressed payload length and a CRC32C
//! checksum over the compressed bytes.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest encoded header accepted on either side, not counting the error
/// text of a response.
pub const MAX_HEADER_LEN: usize = 1024;

/// Why a response carries a non-empty error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Success, or a request header.
    #[default]
    None,
    /// The handler reported an error.
    Application,
    /// No such service or method.
    Dispatch,
    /// The arguments could not be decoded for the target method.
    InvalidRequest,
}

/// Envelope header shared by requests and responses.
///
/// A request names its target in `service_method` and has an empty `error`.
/// A response only echoes the request's `seq`; its `service_method` is empty
/// and `error` is empty exactly when the call succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub service_method: String,
    pub seq: u64,
    pub error: String,
    pub error_kind: ErrorKind,
    /// Payload length before compression
    pub raw_len: u64,
    pub checksum: u32,
}

impl Header {
    pub fn request(service_method: impl Into<String>, seq: u64) -> Self {
        Self {
            service_method: service_method.into(),
            seq,
            error: String::new(),
            error_kind: ErrorKind::None,
            raw_len: 0,
            checksum: 0,
        }
    }

    pub fn response(seq: u64, error_kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            service_method: String::new(),
            seq,
            error: error.into(),
            error_kind,
            raw_len: 0,
            checksum: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub header: Header,
    pub payload: Vec<u8>,
}

fn header_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

fn oversized_header() -> Error {
    Error::InvalidFrame(format!("Header larger than {} bytes", MAX_HEADER_LEN))
}

/// Encode a header and payload into one frame body. The `raw_len` and
/// `checksum` fields of `header` are overwritten.
pub fn encode(mut header: Header, payload: &[u8]) -> Result<Vec<u8>> {
    let compressed = snap::raw::Encoder::new()
        .compress_vec(payload)
        .map_err(|e| Error::Codec(format!("Cannot compress payload: {}", e)))?;
    header.raw_len = payload.len() as u64;
    header.checksum = crc32c::crc32c(&compressed);

    let header_bytes = header_options()
        .serialize(&header)
        .map_err(|e| Error::Codec(e.to_string()))?;
    if header_bytes.len() - header.error.len() > MAX_HEADER_LEN {
        return Err(oversized_header());
    }

    let mut frame = Vec::with_capacity(header_bytes.len() + compressed.len());
    frame.extend_from_slice(&header_bytes);
    frame.extend_from_slice(&compressed);
    Ok(frame)
}

/// Decode a frame body produced by [`encode`], verifying the checksum and
/// the uncompressed length.
pub fn decode(frame: &[u8]) -> Result<Envelope> {
    let mut rest = frame;
    let header: Header = header_options()
        .with_limit(frame.len() as u64)
        .deserialize_from(&mut rest)
        .map_err(|e| Error::InvalidFrame(format!("Undecodable header: {}", e)))?;

    let header_len = frame.len() - rest.len();
    if header_len - header.error.len() > MAX_HEADER_LEN {
        return Err(oversized_header());
    }

    let actual = crc32c::crc32c(rest);
    if actual != header.checksum {
        return Err(Error::ChecksumMismatch {
            expected: header.checksum,
            actual,
        });
    }

    let payload = decompress(rest, header.raw_len)?;
    Ok(Envelope { header, payload })
}

fn decompress(compressed: &[u8], raw_len: u64) -> Result<Vec<u8>> {
    let len = snap::raw::decompress_len(compressed)
        .map_err(|e| Error::InvalidFrame(format!("Undecodable payload: {}", e)))?;
    if len as u64 != raw_len {
        return Err(Error::InvalidFrame(format!(
            "Unexpected payload length: header says {}, payload holds {}",
            raw_len, len
        )));
    }

    snap::raw::Decoder::new()
        .decompress_vec(compressed)
        .map_err(|e| Error::InvalidFrame(format!("Undecodable payload: {}", e)))
}
