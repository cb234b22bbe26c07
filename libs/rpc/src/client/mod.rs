//! RPC client.
//!
//! A [`Client`] owns one connection. Each call is given the next sequence id
//! and registered in the pending table before its request is written; a
//! background task reads responses for the lifetime of the client and hands
//! each one to the call waiting on its sequence id.
//!
//! # Concurrency
//!
//! Any number of tasks may call through clones of the same client. The
//! pending table is the only state they share; it sits behind a mutex that
//! is never held across an await. Callers encode their request frame
//! themselves and queue it for a writer task that owns the connection's
//! write half, so a caller that gives up never leaves half a frame behind.

mod pending;
mod reply;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use switchboard_fabric::codec::{BincodeCodec, Codec};
use switchboard_fabric::{wire, Channel, Envelope, Header, Transport, WireReader, WireWriter};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::caller::Caller;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::event::{Event, EventSink, TracingSink};

use pending::PendingCalls;
use reply::PendingReply;
pub use reply::ReplyFuture;

/// Request frames queued ahead of the writer task
const OUTBOX_CAPACITY: usize = 64;

/// Work for the writer task
enum Outgoing {
    Request { seq: u64, frame: Vec<u8> },
    /// Shut down the write half, then acknowledge
    Close(oneshot::Sender<()>),
}

/// Acquire a mutex guard, ignoring poisoning.
///
/// The pending table has no invariant spanning more than one entry, so the
/// state left behind by a panicking holder is still usable.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// State shared between callers and the background reader and writer
struct Shared {
    pending: Mutex<PendingCalls>,
    sink: Arc<dyn EventSink>,
    peer: String,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, PendingCalls> {
        lock_ignore_poison(&self.pending)
    }

    fn deliver(&self, envelope: Envelope) {
        let Envelope { header, payload } = envelope;

        let Some(call) = self.pending().take(header.seq) else {
            self.sink.emit(&Event::ResponseDiscarded { seq: header.seq });
            return;
        };

        let result = if header.is_error() {
            Err(Error::from_response(header.error_kind, header.error))
        } else {
            Ok(payload)
        };
        call.resolve(result);
    }

    /// The connection failed underneath us: fail every waiting call
    fn connection_failed(&self, error: switchboard_fabric::Error) {
        let calls = {
            let mut pending = self.pending();
            if pending.is_shutdown() {
                return;
            }
            pending.shutdown()
        };
        let message = error.to_string();

        let clean = matches!(error, switchboard_fabric::Error::ConnectionClosed);
        self.sink.emit(&Event::ClientShutdown {
            peer: &self.peer,
            pending: calls.len(),
            error: (!clean).then_some(message.as_str()),
        });

        for call in calls {
            call.resolve(Err(Error::ConnectionLost(message.clone())));
        }
    }
}

struct Inner {
    shared: Arc<Shared>,
    outbox: mpsc::Sender<Outgoing>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = lock_ignore_poison(&self.reader_task).take() {
            task.abort();
        }
        for call in self.shared.pending().shutdown() {
            call.resolve(Err(Error::ConnectionClosed));
        }
    }
}

/// Client side of an RPC connection
///
/// Cheap to clone; clones share the connection and the pending-call table.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Connect to a server. `network` is `"tcp"` or `"unix"`.
    pub async fn dial(network: &str, address: &str) -> Result<Self> {
        Self::dial_with_config(network, address, ClientConfig::default()).await
    }

    pub async fn dial_with_config(network: &str, address: &str, config: ClientConfig) -> Result<Self> {
        let transport = switchboard_fabric::dial(network, address, &config.dial_options()).await?;
        Ok(Self::from_transport(transport))
    }

    /// Run a client over an already connected transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_transport(transport: Box<dyn Transport>) -> Self {
        Self::with_event_sink(transport, Arc::new(TracingSink))
    }

    pub fn with_event_sink(transport: Box<dyn Transport>, sink: Arc<dyn EventSink>) -> Self {
        let peer = transport.peer();
        let (reader, writer) = Channel::from_boxed(transport).into_split();

        let shared = Arc::new(Shared {
            pending: Mutex::new(PendingCalls::new()),
            sink,
            peer,
        });
        let reader_task = tokio::spawn(read_loop(Arc::clone(&shared), reader));

        let (outbox, queued) = mpsc::channel(OUTBOX_CAPACITY);
        tokio::spawn(write_loop(Arc::clone(&shared), writer, queued));

        Self {
            inner: Arc::new(Inner {
                shared,
                outbox,
                reader_task: Mutex::new(Some(reader_task)),
            }),
        }
    }

    pub fn peer(&self) -> &str {
        &self.inner.shared.peer
    }

    /// Calls issued but not yet answered
    pub fn pending_calls(&self) -> usize {
        self.inner.shared.pending().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shared.pending().is_shutdown()
    }

    /// Call `service_method` and wait for the reply
    pub async fn call<Req, Resp>(&self, service_method: &str, args: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.start_call(service_method, args).await?.await
    }

    /// Call `service_method`, writing the result into `reply`
    ///
    /// `reply` is left untouched when the call fails.
    pub async fn call_into<Req, Resp>(&self, service_method: &str, args: &Req, reply: &mut Resp) -> Result<()>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        *reply = self.call(service_method, args).await?;
        Ok(())
    }

    /// Queue the request and return a handle to the pending reply
    ///
    /// Returns once the request frame is handed to the writer task. Dropping
    /// this future, or the returned handle, abandons the call.
    pub async fn start_call<Req, Resp>(&self, service_method: &str, args: &Req) -> Result<ReplyFuture<Resp>>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = BincodeCodec.encode(args)?;
        let pending = self.send_request(service_method, &payload).await?;
        Ok(ReplyFuture::new(pending))
    }

    async fn send_request(&self, service_method: &str, payload: &[u8]) -> Result<PendingReply> {
        let shared = &self.inner.shared;
        let (seq, rx) = shared.pending().register(service_method)?;
        // Unregisters the call again on every early exit below
        let pending = PendingReply::new(seq, rx, Arc::downgrade(shared));

        let frame = wire::encode(Header::request(service_method, seq), payload)?;
        shared.sink.emit(&Event::CallIssued { service_method, seq });

        self.inner
            .outbox
            .send(Outgoing::Request { seq, frame })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(pending)
    }

    /// Close the connection
    ///
    /// Every call still waiting resolves with [`Error::ConnectionClosed`];
    /// later calls fail the same way.
    pub async fn close(&self) -> Result<()> {
        let calls = self.inner.shared.pending().shutdown();
        self.inner.shared.sink.emit(&Event::ClientShutdown {
            peer: &self.inner.shared.peer,
            pending: calls.len(),
            error: None,
        });
        for call in calls {
            call.resolve(Err(Error::ConnectionClosed));
        }

        if let Some(task) = lock_ignore_poison(&self.inner.reader_task).take() {
            task.abort();
        }

        // Requests queued earlier still go out first
        let (done_tx, done) = oneshot::channel();
        if self.inner.outbox.send(Outgoing::Close(done_tx)).await.is_ok() {
            let _ = done.await;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Caller for Client {
    async fn call_raw(&self, service_method: &str, payload: Vec<u8>) -> Result<Vec<u8>> {
        self.send_request(service_method, &payload).await?.await
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: WireReader) {
    let error = loop {
        match reader.read_envelope().await {
            Ok(envelope) => shared.deliver(envelope),
            Err(e) => break e,
        }
    };
    shared.connection_failed(error);
}

async fn write_loop(shared: Arc<Shared>, mut writer: WireWriter, mut outbox: mpsc::Receiver<Outgoing>) {
    while let Some(outgoing) = outbox.recv().await {
        match outgoing {
            Outgoing::Request { seq, frame } => match writer.write_frame(&frame).await {
                Ok(()) => {}
                // Refused before any byte went out; only this call fails
                Err(e) if e.is_protocol() => {
                    let call = shared.pending().take(seq);
                    if let Some(call) = call {
                        tracing::warn!(seq, service_method = %call.service_method, error = %e, "request refused");
                        call.resolve(Err(e.into()));
                    }
                }
                Err(e) => {
                    shared.connection_failed(e);
                    break;
                }
            },
            Outgoing::Close(done) => {
                close_writer(&shared, &mut writer).await;
                let _ = done.send(());
                return;
            }
        }
    }
    close_writer(&shared, &mut writer).await;
}

async fn close_writer(shared: &Shared, writer: &mut WireWriter) {
    if let Err(e) = writer.close().await {
        // The peer may already be gone
        tracing::debug!(peer = %shared.peer, error = %e, "shutdown of write half failed");
    }
}
