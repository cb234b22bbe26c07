//! RPC server.
//!
//! The accept loop gives every connection its own task. A connection task
//! reads request envelopes one after another and spawns a dispatch task per
//! request, so a slow handler only delays its own response. Responses on a
//! connection are written under that connection's write lock and may go out
//! in any order; clients correlate them by sequence id.

mod connection;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use switchboard_fabric::{Channel, Transport, TransportListener};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::event::{EventSink, TracingSink};
use crate::registry::ServiceRegistry;

pub use connection::ConnectionState;
use connection::Connection;

/// Pause after the process runs out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Serves a [`ServiceRegistry`] to every accepted connection
///
/// # Example
///
/// ```no_run
/// use switchboard_fabric::transport::TcpTransportListener;
/// use switchboard_rpc::{MethodTable, Server, ServiceRegistry};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut registry = ServiceRegistry::new();
/// registry.register(
///     "Echo",
///     MethodTable::new().method("Echo", |msg: &String, reply: &mut String| {
///         reply.clone_from(msg);
///         Ok(())
///     }),
/// )?;
///
/// let listener = TcpTransportListener::bind("127.0.0.1:1234".parse()?).await?;
/// Server::new(registry).serve(listener).await?;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    registry: Arc<ServiceRegistry>,
    config: ServerConfig,
    sink: Arc<dyn EventSink>,
}

impl Server {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            config: ServerConfig::default(),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept and serve connections until accepting fails for good
    pub async fn serve<L: TransportListener>(&self, listener: L) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Like [`serve`](Self::serve), but stops once `signal` completes.
    ///
    /// Open connections stop reading, finish the requests they already
    /// dispatched, and close before this returns.
    pub async fn serve_with_shutdown<L, F>(&self, mut listener: L, signal: F) -> Result<()>
    where
        L: TransportListener,
        F: Future<Output = ()>,
    {
        if self.registry.is_empty() {
            tracing::warn!("serving with no registered services");
        }

        let (shutdown_tx, _) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(signal);

        let outcome = loop {
            tokio::select! {
                _ = &mut signal => break Ok(()),
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => match accepted {
                    Ok(transport) => {
                        let connection = self.connection(Box::new(transport));
                        connections.spawn(connection.run(shutdown_tx.subscribe()));
                    }
                    Err(e) => match accept_failure(&e) {
                        AcceptFailure::Retry => {
                            tracing::warn!(error = %e, "accept failed");
                        }
                        AcceptFailure::Backoff => {
                            tracing::error!(error = %e, "accept failed, backing off");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                        AcceptFailure::Fatal => break Err(Error::from(e)),
                    },
                },
            }
        };

        tracing::info!(connections = connections.len(), "server shutting down");
        let _ = shutdown_tx.send(true);
        while connections.join_next().await.is_some() {}

        if let Err(e) = listener.close().await {
            tracing::debug!(error = %e, "closing listener failed");
        }
        outcome
    }

    /// Serve one already accepted transport on the current task
    pub async fn serve_transport(&self, transport: Box<dyn Transport>) {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.connection(transport).run(shutdown_rx).await;
    }

    fn connection(&self, mut transport: Box<dyn Transport>) -> Connection {
        transport.set_max_frame_len(self.config.max_frame_len);
        transport.set_receive_timeout(self.config.read_timeout);
        let peer = transport.peer();
        let (reader, writer) = Channel::from_boxed(transport).into_split();

        Connection::new(
            peer,
            reader,
            writer,
            Arc::clone(&self.registry),
            Arc::clone(&self.sink),
            self.config.max_in_flight,
        )
    }
}

enum AcceptFailure {
    Retry,
    Backoff,
    Fatal,
}

fn accept_failure(error: &switchboard_fabric::Error) -> AcceptFailure {
    use std::io::ErrorKind;

    let switchboard_fabric::Error::Io(io) = error else {
        return AcceptFailure::Fatal;
    };

    match io.kind() {
        ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::NotConnected
        | ErrorKind::Interrupted
        | ErrorKind::WouldBlock
        | ErrorKind::TimedOut => AcceptFailure::Retry,
        // ENFILE / EMFILE
        _ if matches!(io.raw_os_error(), Some(23) | Some(24)) => AcceptFailure::Backoff,
        _ => AcceptFailure::Fatal,
    }
}
