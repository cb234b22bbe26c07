use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use switchboard_fabric::codec::{BincodeCodec, Codec};
use tokio::sync::oneshot;

use super::pending::CallResult;
use super::Shared;
use crate::error::{Error, Result};

/// Raw reply slot of a registered call
///
/// Owns the call's pending-table entry: dropping it before an outcome
/// arrives removes the entry, whether or not the request ever left.
pub(super) struct PendingReply {
    seq: u64,
    rx: oneshot::Receiver<CallResult>,
    shared: Weak<Shared>,
    done: bool,
}

impl PendingReply {
    pub(super) fn new(seq: u64, rx: oneshot::Receiver<CallResult>, shared: Weak<Shared>) -> Self {
        Self {
            seq,
            rx,
            shared,
            done: false,
        }
    }
}

impl Future for PendingReply {
    type Output = CallResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(outcome)) => outcome,
            // Sender dropped without an answer: the client went away
            Poll::Ready(Err(_)) => Err(Error::ConnectionClosed),
        };
        this.done = true;
        Poll::Ready(outcome)
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.pending().take(self.seq);
        }
    }
}

/// Handle to a call that has been handed to the connection
///
/// Resolves once the background reader delivers the matching response, or
/// the client shuts down. Dropping it abandons the call; the response is
/// discarded when it arrives.
#[must_use = "a call's reply is lost unless the future is awaited"]
pub struct ReplyFuture<Resp> {
    pending: PendingReply,
    _reply: PhantomData<fn() -> Resp>,
}

impl<Resp> ReplyFuture<Resp> {
    pub(super) fn new(pending: PendingReply) -> Self {
        Self {
            pending,
            _reply: PhantomData,
        }
    }

    /// Sequence id the call was sent with
    pub fn seq(&self) -> u64 {
        self.pending.seq
    }
}

impl<Resp: DeserializeOwned> Future for ReplyFuture<Resp> {
    type Output = Result<Resp>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.pending).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(payload)) => Poll::Ready(BincodeCodec.decode(&payload).map_err(Error::from)),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
        }
    }
}
