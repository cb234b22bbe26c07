//! Switchboard RPC - request/response calls over a fabric connection
//!
//! A [`Server`] serves the methods of a [`ServiceRegistry`] on every accepted
//! connection; a [`Client`] multiplexes concurrent calls over one connection
//! and matches replies to callers by sequence id.
//!
//! # Example
//!
//! ```no_run
//! use switchboard_rpc::Client;
//!
//! # async fn example() -> switchboard_rpc::Result<()> {
//! let client = Client::dial("tcp", "127.0.0.1:1234").await?;
//! let product: i32 = client.call("Arith.Mul", &(7i32, 8i32)).await?;
//! assert_eq!(product, 56);
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod caller;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod registry;
pub mod server;

pub use caller::{call, Caller};
pub use client::{Client, ReplyFuture};
pub use config::{ClientConfig, ServerConfig};
pub use error::{Error, Result};
pub use event::{Event, EventSink, NoopSink, TracingSink};
pub use registry::{camel_case, MethodHandler, MethodTable, Reply, Service, ServiceError, ServiceRegistry};
pub use server::{ConnectionState, Server};
