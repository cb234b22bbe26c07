//! Structured events emitted by the client and the dispatcher.
//!
//! The server and client never log through globals directly; they hand
//! [`Event`]s to an injected [`EventSink`]. [`TracingSink`] forwards them to
//! `tracing`, which is what both use unless told otherwise.

use std::fmt::Debug;
use std::time::Duration;

#[derive(Debug)]
pub enum Event<'a> {
    ConnectionAccepted {
        peer: &'a str,
    },
    ConnectionClosed {
        peer: &'a str,
        error: Option<&'a str>,
    },
    /// A handler ran. Carries the decoded arguments and reply.
    Handled {
        service_method: &'a str,
        args: &'a dyn Debug,
        reply: &'a dyn Debug,
        error: Option<&'a str>,
    },
    /// The request named a service or method that is not registered.
    UnknownMethod {
        peer: &'a str,
        service_method: &'a str,
        seq: u64,
    },
    ResponseWritten {
        service_method: &'a str,
        seq: u64,
        elapsed: Duration,
    },
    ResponseFailed {
        service_method: &'a str,
        seq: u64,
        error: &'a str,
    },
    CallIssued {
        service_method: &'a str,
        seq: u64,
    },
    /// A response arrived for a sequence id nobody is waiting on.
    ResponseDiscarded {
        seq: u64,
    },
    ClientShutdown {
        peer: &'a str,
        pending: usize,
        error: Option<&'a str>,
    },
}

/// Observability port for RPC activity
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event<'_>);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event<'_>) {
        match *event {
            Event::ConnectionAccepted { peer } => {
                tracing::info!(peer, "connection accepted");
            }
            Event::ConnectionClosed { peer, error: None } => {
                tracing::info!(peer, "connection closed");
            }
            Event::ConnectionClosed {
                peer,
                error: Some(error),
            } => {
                tracing::warn!(peer, error, "connection closed");
            }
            Event::Handled {
                service_method,
                args,
                reply,
                error,
            } => {
                tracing::debug!(
                    "{}: args = {:?}, reply = {:?}, err = {:?}",
                    service_method,
                    args,
                    reply,
                    error
                );
            }
            Event::UnknownMethod {
                peer,
                service_method,
                seq,
            } => {
                tracing::warn!(peer, service_method, seq, "unknown service method");
            }
            Event::ResponseWritten {
                service_method,
                seq,
                elapsed,
            } => {
                tracing::trace!(service_method, seq, ?elapsed, "response written");
            }
            Event::ResponseFailed {
                service_method,
                seq,
                error,
            } => {
                tracing::warn!(service_method, seq, error, "failed to write response");
            }
            Event::CallIssued {
                service_method,
                seq,
            } => {
                tracing::trace!(service_method, seq, "call issued");
            }
            Event::ResponseDiscarded { seq } => {
                tracing::debug!(seq, "discarding response with no pending call");
            }
            Event::ClientShutdown {
                peer,
                pending,
                error,
            } => match error {
                Some(error) => tracing::warn!(peer, pending, error, "client connection failed"),
                None => tracing::debug!(peer, pending, "client closed"),
            },
        }
    }
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &Event<'_>) {}
}
