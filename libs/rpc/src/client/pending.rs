use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::error::{Error, Result};

pub(super) type CallResult = Result<Vec<u8>>;

/// One in-flight call waiting for its response
pub(super) struct PendingCall {
    pub service_method: String,
    tx: oneshot::Sender<CallResult>,
}

impl PendingCall {
    /// Hand the outcome to the waiting caller. A caller that stopped
    /// waiting simply never sees it.
    pub fn resolve(self, result: CallResult) {
        let _ = self.tx.send(result);
    }
}

/// Tracks calls awaiting a response, keyed by sequence id
///
/// Once shut down, no further calls can be registered.
pub(super) struct PendingCalls {
    next_seq: u64,
    calls: HashMap<u64, PendingCall>,
    shutdown: bool,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            next_seq: 0,
            calls: HashMap::new(),
            shutdown: false,
        }
    }

    /// Allocate the next sequence id and register a call under it
    pub fn register(
        &mut self,
        service_method: &str,
    ) -> Result<(u64, oneshot::Receiver<CallResult>)> {
        if self.shutdown {
            return Err(Error::ConnectionClosed);
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let (tx, rx) = oneshot::channel();
        self.calls.insert(
            seq,
            PendingCall {
                service_method: service_method.to_string(),
                tx,
            },
        );
        Ok((seq, rx))
    }

    /// Remove the call registered under `seq`, if any
    pub fn take(&mut self, seq: u64) -> Option<PendingCall> {
        self.calls.remove(&seq)
    }

    /// Refuse new calls and hand back everything still outstanding
    pub fn shutdown(&mut self) -> Vec<PendingCall> {
        self.shutdown = true;
        self.calls.drain().map(|(_, call)| call).collect()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }
}
