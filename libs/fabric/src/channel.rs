use std::net::SocketAddr;
use std::path::Path;

use crate::error::Result;
use crate::transport::{FrameRead, FrameWrite, TcpTransport, Transport, UnixTransport};
use crate::wire::{self, Envelope, Header};

/// Envelope-level view of a connection
///
/// Combines a transport with the wire envelope format. A channel can be used
/// directly from one task, or split with [`Channel::into_split`] so that one
/// task reads while others write.
pub struct Channel {
    transport: Box<dyn Transport>,
}

impl Channel {
    /// Create a channel from an existing transport
    pub fn from_transport(transport: impl Transport + 'static) -> Self {
        Self::from_boxed(Box::new(transport))
    }

    pub fn from_boxed(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Open a TCP channel
    pub async fn tcp(addr: SocketAddr) -> Result<Self> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::from_transport(transport))
    }

    /// Open a Unix socket channel
    pub async fn unix(path: impl AsRef<Path>) -> Result<Self> {
        let transport = UnixTransport::connect(path).await?;
        Ok(Self::from_transport(transport))
    }

    pub fn peer(&self) -> String {
        self.transport.peer()
    }

    pub async fn write_request(&mut self, service_method: &str, seq: u64, payload: &[u8]) -> Result<()> {
        let frame = wire::encode(Header::request(service_method, seq), payload)?;
        self.transport.send(&frame).await
    }

    pub async fn write_response(&mut self, header: Header, payload: &[u8]) -> Result<()> {
        let frame = wire::encode(header, payload)?;
        self.transport.send(&frame).await
    }

    /// Receive the next envelope, request or response
    pub async fn read_envelope(&mut self) -> Result<Envelope> {
        let frame = self.transport.receive().await?;
        wire::decode(&frame)
    }

    /// Close the channel
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }

    pub fn into_split(self) -> (WireReader, WireWriter) {
        let (read, write) = self.transport.split();
        (WireReader { frames: read }, WireWriter { frames: write })
    }
}

/// Reading half of a split [`Channel`]
pub struct WireReader {
    frames: Box<dyn FrameRead>,
}

impl WireReader {
    pub async fn read_envelope(&mut self) -> Result<Envelope> {
        let frame = self.frames.receive().await?;
        wire::decode(&frame)
    }
}

/// Writing half of a split [`Channel`]
pub struct WireWriter {
    frames: Box<dyn FrameWrite>,
}

impl WireWriter {
    pub async fn write_request(&mut self, service_method: &str, seq: u64, payload: &[u8]) -> Result<()> {
        let frame = wire::encode(Header::request(service_method, seq), payload)?;
        self.frames.send(&frame).await
    }

    pub async fn write_response(&mut self, header: Header, payload: &[u8]) -> Result<()> {
        let frame = wire::encode(header, payload)?;
        self.frames.send(&frame).await
    }

    /// Send a frame body already produced by [`wire::encode`]
    pub async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.frames.send(frame).await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.frames.close().await
    }
}
