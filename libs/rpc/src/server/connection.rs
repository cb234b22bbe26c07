use std::sync::Arc;
use std::time::Instant;

use switchboard_fabric::{Envelope, ErrorKind, Header, WireReader, WireWriter};
use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::event::{Event, EventSink};
use crate::registry::{MethodHandler, Reply, ServiceRegistry};

/// Lifecycle of one served connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Reading,
    /// Waiting on a read with this many requests still being handled
    Dispatching(usize),
    Closing,
    Closed,
}

type SharedWriter = Arc<Mutex<WireWriter>>;

pub(super) struct Connection {
    peer: String,
    reader: WireReader,
    writer: SharedWriter,
    registry: Arc<ServiceRegistry>,
    sink: Arc<dyn EventSink>,
    limiter: Arc<Semaphore>,
    state: ConnectionState,
}

impl Connection {
    pub(super) fn new(
        peer: String,
        reader: WireReader,
        writer: WireWriter,
        registry: Arc<ServiceRegistry>,
        sink: Arc<dyn EventSink>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            peer,
            reader,
            writer: Arc::new(Mutex::new(writer)),
            registry,
            sink,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
            state: ConnectionState::Open,
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::trace!(peer = %self.peer, from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }

    /// Serve requests until the peer goes away, the stream breaks, or
    /// `shutdown` flips to true
    pub(super) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.sink.emit(&Event::ConnectionAccepted { peer: &self.peer });
        let mut in_flight = JoinSet::new();

        let failure = loop {
            // Reap finished dispatches without waiting on them
            while in_flight.try_join_next().is_some() {}

            let next = if in_flight.is_empty() {
                ConnectionState::Reading
            } else {
                ConnectionState::Dispatching(in_flight.len())
            };
            self.transition(next);

            // Only `true` is ever sent. A half-read frame is dropped along
            // with the connection.
            let read = tokio::select! {
                _ = shutdown.changed() => break None,
                read = self.reader.read_envelope() => read,
            };

            let envelope = match read {
                Ok(envelope) => envelope,
                Err(switchboard_fabric::Error::ConnectionClosed) => break None,
                Err(e) => break Some(e.to_string()),
            };

            match self.registry.lookup(&envelope.header.service_method) {
                Ok(handler) => {
                    let handler = handler.clone();
                    // Stop reading while the connection is at its limit
                    let permit = match Arc::clone(&self.limiter).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break None,
                    };
                    in_flight.spawn(dispatch(
                        handler,
                        envelope,
                        Arc::clone(&self.writer),
                        Arc::clone(&self.sink),
                        permit,
                    ));
                }
                Err(message) => {
                    let Header {
                        service_method,
                        seq,
                        ..
                    } = envelope.header;
                    self.sink.emit(&Event::UnknownMethod {
                        peer: &self.peer,
                        service_method: &service_method,
                        seq,
                    });
                    let reply = Reply::failed(ErrorKind::Dispatch, message);
                    if let Err(e) = write_reply(&self.writer, seq, reply).await {
                        break Some(e.to_string());
                    }
                }
            }
        };

        self.transition(ConnectionState::Closing);
        while in_flight.join_next().await.is_some() {}

        if let Err(e) = self.writer.lock().await.close().await {
            tracing::debug!(peer = %self.peer, error = %e, "shutdown of write half failed");
        }

        self.transition(ConnectionState::Closed);
        self.sink.emit(&Event::ConnectionClosed {
            peer: &self.peer,
            error: failure.as_deref(),
        });
    }
}

/// Handle one request on the blocking pool and write its response
async fn dispatch(
    handler: MethodHandler,
    envelope: Envelope,
    writer: SharedWriter,
    sink: Arc<dyn EventSink>,
    _permit: OwnedSemaphorePermit,
) {
    let started = Instant::now();
    let Envelope { header, payload } = envelope;
    let service_method = header.service_method;
    let seq = header.seq;

    let reply = {
        let sink = Arc::clone(&sink);
        let service_method = service_method.clone();
        tokio::task::spawn_blocking(move || handler.invoke(&service_method, &payload, sink.as_ref()))
            .await
    };

    let reply = match reply {
        Ok(reply) => reply,
        Err(e) if e.is_panic() => Reply::failed(
            ErrorKind::Application,
            format!("rpc: handler for {} panicked", service_method),
        ),
        Err(_) => return,
    };

    match write_reply(&writer, seq, reply).await {
        Ok(()) => sink.emit(&Event::ResponseWritten {
            service_method: &service_method,
            seq,
            elapsed: started.elapsed(),
        }),
        Err(e) => sink.emit(&Event::ResponseFailed {
            service_method: &service_method,
            seq,
            error: &e.to_string(),
        }),
    }
}

/// Write the response for `seq`.
///
/// A reply that cannot be framed, such as one over the frame limit, is
/// replaced by a short application error so the caller still hears back.
async fn write_reply(
    writer: &SharedWriter,
    seq: u64,
    reply: Reply,
) -> switchboard_fabric::Result<()> {
    let mut writer = writer.lock().await;
    let header = Header::response(seq, reply.error_kind, reply.error);

    match writer.write_response(header, &reply.payload).await {
        Err(e @ (switchboard_fabric::Error::InvalidFrame(_) | switchboard_fabric::Error::Codec(_))) => {
            tracing::warn!(seq, error = %e, "reply could not be framed, sending error instead");
            let header = Header::response(
                seq,
                ErrorKind::Application,
                format!("rpc: cannot send reply: {}", e),
            );
            writer.write_response(header, &[]).await
        }
        written => written,
    }
}
