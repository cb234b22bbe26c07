use std::fmt::{self, Debug};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use switchboard_fabric::codec::{BincodeCodec, Codec};
use switchboard_fabric::ErrorKind;

use crate::event::{Event, EventSink};

/// Error returned by a handler. Its message reaches the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServiceError {}

impl From<&str> for ServiceError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ServiceError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Outcome of one handler invocation, ready to be written as a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub error_kind: ErrorKind,
    pub error: String,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            error_kind: ErrorKind::None,
            error: String::new(),
            payload,
        }
    }

    /// Failed call; the payload is left empty.
    pub fn failed(error_kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            error_kind,
            error: error.into(),
            payload: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

type ErasedHandler = dyn Fn(&str, &[u8], &dyn EventSink) -> Reply + Send + Sync;

/// A registered method with its request and response types erased
#[derive(Clone)]
pub struct MethodHandler {
    inner: Arc<ErasedHandler>,
}

impl MethodHandler {
    fn new<Req, Resp, F>(handler: F) -> Self
    where
        Req: DeserializeOwned + Debug + 'static,
        Resp: Serialize + Default + Debug + 'static,
        F: Fn(&Req, &mut Resp) -> Result<(), ServiceError> + Send + Sync + 'static,
    {
        let inner = move |service_method: &str, payload: &[u8], sink: &dyn EventSink| {
            let request: Req = match BincodeCodec.decode(payload) {
                Ok(request) => request,
                Err(e) => {
                    return Reply::failed(
                        ErrorKind::InvalidRequest,
                        format!("rpc: cannot decode arguments for {}: {}", service_method, e),
                    )
                }
            };

            let mut response = Resp::default();
            let outcome = handler(&request, &mut response);

            sink.emit(&Event::Handled {
                service_method,
                args: &request,
                reply: &response,
                error: outcome.as_ref().err().map(ServiceError::message),
            });

            match outcome {
                Ok(()) => match BincodeCodec.encode(&response) {
                    Ok(bytes) => Reply::ok(bytes),
                    Err(e) => Reply::failed(
                        ErrorKind::Application,
                        format!("rpc: cannot encode reply for {}: {}", service_method, e),
                    ),
                },
                Err(e) => Reply::failed(ErrorKind::Application, e.message),
            }
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Decode `payload`, run the handler and encode its result
    pub fn invoke(&self, service_method: &str, payload: &[u8], sink: &dyn EventSink) -> Reply {
        (self.inner)(service_method, payload, sink)
    }
}

impl Debug for MethodHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandler").finish_non_exhaustive()
    }
}

/// Declarative list of the methods a service exposes
///
/// ```
/// use switchboard_rpc::{MethodTable, ServiceError};
///
/// let table = MethodTable::new().method("Double", |n: &i64, out: &mut i64| {
///     *out = n.checked_mul(2).ok_or_else(|| ServiceError::new("overflow"))?;
///     Ok(())
/// });
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MethodTable {
    pub(crate) methods: Vec<(String, MethodHandler)>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method taking a decoded request and filling in a fresh,
    /// default-constructed response
    pub fn method<Req, Resp, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        Req: DeserializeOwned + Debug + 'static,
        Resp: Serialize + Default + Debug + 'static,
        F: Fn(&Req, &mut Resp) -> Result<(), ServiceError> + Send + Sync + 'static,
    {
        self.methods.push((name.into(), MethodHandler::new(handler)));
        self
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
