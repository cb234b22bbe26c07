//! Switchboard Fabric - Low-level transport and wire layer
//!
//! Provides transport abstractions (TCP, Unix sockets) with length-prefix
//! framing, the request/response envelope format, and the bincode payload
//! codec used by `switchboard-rpc`.
//!
//! # Example
//!
//! ```no_run
//! use switchboard_fabric::{Channel, codec::{BincodeCodec, Codec}};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let addr = "127.0.0.1:1234".parse()?;
//! let mut channel = Channel::tcp(addr).await?;
//!
//! let args = BincodeCodec.encode(&(1i32, 2i32))?;
//! channel.write_request("Arith.Add", 0, &args).await?;
//!
//! let reply = channel.read_envelope().await?;
//! assert_eq!(reply.header.seq, 0);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod codec;
pub mod error;
pub mod transport;
pub mod wire;

// Re-exports for convenience
pub use channel::{Channel, WireReader, WireWriter};
pub use error::{Error, Result};
pub use transport::{dial, DialOptions, Network, Transport, TransportListener};
pub use wire::{Envelope, ErrorKind, Header};
