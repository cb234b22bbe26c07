use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub mod frame;
pub mod tcp;
pub mod unix;

pub use self::frame::{FrameReader, FrameWriter, DEFAULT_MAX_FRAME_LEN};
pub use self::tcp::{TcpTransport, TcpTransportBuilder, TcpTransportListener};
pub use self::unix::{UnixTransport, UnixTransportBuilder, UnixTransportListener};

/// Receiving side of a framed connection
#[async_trait::async_trait]
pub trait FrameRead: Send {
    /// Receive the next frame
    async fn receive(&mut self) -> Result<Vec<u8>>;
}

/// Sending side of a framed connection
#[async_trait::async_trait]
pub trait FrameWrite: Send {
    /// Send one frame
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Shut down the write direction of the connection
    async fn close(&mut self) -> Result<()>;
}

/// Transport trait for sending and receiving raw bytes
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send bytes over the transport
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive bytes from the transport
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;

    /// Limit the size of frames accepted and produced by this connection
    fn set_max_frame_len(&mut self, max_frame_len: usize);

    /// Bound how long a single receive may wait
    fn set_receive_timeout(&mut self, timeout: Option<Duration>);

    /// Human readable name of the remote end, for logs
    fn peer(&self) -> String;

    /// Split into halves that can be driven from different tasks
    fn split(self: Box<Self>) -> (Box<dyn FrameRead>, Box<dyn FrameWrite>);
}

/// Listener producing transports for accepted connections
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Transport: Transport + 'static;

    /// Wait for the next incoming connection
    async fn accept(&self) -> Result<Self::Transport>;

    /// Stop listening
    async fn close(&mut self) -> Result<()>;
}

/// Kind of socket to dial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Unix,
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" | "tcp4" | "tcp6" => Ok(Network::Tcp),
            "unix" => Ok(Network::Unix),
            other => Err(Error::UnsupportedNetwork(other.to_string())),
        }
    }
}

/// Settings applied when dialing by network name
#[derive(Debug, Clone)]
pub struct DialOptions {
    pub connect_timeout: Option<Duration>,
    pub max_frame_len: usize,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Open a connection by network name (`"tcp"` or `"unix"`) and address
pub async fn dial(network: &str, address: &str, options: &DialOptions) -> Result<Box<dyn Transport>> {
    tracing::debug!(network, address, "dialing");
    match network.parse::<Network>()? {
        Network::Tcp => {
            let addr = tokio::net::lookup_host(address)
                .await?
                .next()
                .ok_or_else(|| Error::Custom(format!("No address found for {}", address)))?;

            let mut builder = TcpTransport::builder()
                .address(addr)
                .max_frame_len(options.max_frame_len);
            if let Some(timeout) = options.connect_timeout {
                builder = builder.connect_timeout(timeout);
            }
            Ok(Box::new(builder.connect().await?))
        }
        Network::Unix => {
            let mut builder = UnixTransport::builder()
                .path(address)
                .max_frame_len(options.max_frame_len);
            if let Some(timeout) = options.connect_timeout {
                builder = builder.connect_timeout(timeout);
            }
            Ok(Box::new(builder.connect().await?))
        }
    }
}
