//! Service registry.
//!
//! Maps `Service.Method` to a typed handler. Built once before serving and
//! shared read-only by every connection afterwards.

mod method;
mod names;

use std::collections::HashMap;
use std::sync::Arc;

use switchboard_fabric::ErrorKind;

use crate::caller::Caller;
use crate::error::{Error, Result};
use crate::event::{EventSink, TracingSink};

pub use method::{MethodHandler, MethodTable, Reply, ServiceError};
pub use names::camel_case;

use names::{is_valid_name, split_service_method};

/// A handler object exposing a fixed set of methods
pub trait Service: Send + Sync + 'static {
    /// Name the service is registered under
    fn name(&self) -> &str;

    /// The methods callable remotely
    fn methods(self: Arc<Self>) -> MethodTable;
}

#[derive(Debug)]
struct ServiceEntry {
    name: String,
    methods: HashMap<String, MethodHandler>,
}

/// Immutable-after-build table of handlers consulted by the dispatcher
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceEntry>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table` under `service_name`.
    ///
    /// Methods with unusable or repeated names are skipped. Fails when no
    /// method remains or when the service name is already taken.
    pub fn register(&mut self, service_name: &str, table: MethodTable) -> Result<()> {
        if !is_valid_name(service_name) {
            return Err(Error::Registration(format!(
                "invalid service name {:?}",
                service_name
            )));
        }

        let name = camel_case(service_name);
        if self.services.contains_key(&name) {
            return Err(Error::Registration(format!(
                "service already defined: {}",
                name
            )));
        }

        let mut methods = HashMap::with_capacity(table.len());
        for (method_name, handler) in table.methods {
            if !is_valid_name(&method_name) {
                tracing::warn!(service = %name, method = ?method_name, "skipping method with unusable name");
                continue;
            }
            let method_name = camel_case(&method_name);
            if methods.contains_key(&method_name) {
                tracing::warn!(service = %name, method = %method_name, "skipping duplicate method");
                continue;
            }
            methods.insert(method_name, handler);
        }

        if methods.is_empty() {
            return Err(Error::Registration(format!(
                "type {} has no exported methods of suitable type",
                name
            )));
        }

        tracing::debug!(service = %name, methods = methods.len(), "registered service");
        self.services.insert(name.clone(), ServiceEntry { name, methods });
        Ok(())
    }

    /// Register a [`Service`] under its own name
    pub fn register_service<S: Service>(&mut self, service: S) -> Result<()> {
        let service = Arc::new(service);
        let name = service.name().to_string();
        let table = service.methods();
        self.register(&name, table)
    }

    pub fn find(&self, service_name: &str, method_name: &str) -> Option<&MethodHandler> {
        self.services
            .get(&camel_case(service_name))?
            .methods
            .get(&camel_case(method_name))
    }

    /// Resolve a `Service.Method` string, or produce the dispatch error text
    pub fn lookup(&self, service_method: &str) -> std::result::Result<&MethodHandler, String> {
        let (service_name, method_name) = split_service_method(service_method).ok_or_else(|| {
            format!("rpc: service/method request ill-formed: {}", service_method)
        })?;

        let entry = self
            .services
            .get(&camel_case(service_name))
            .ok_or_else(|| format!("rpc: can't find service {}", service_method))?;

        entry
            .methods
            .get(&camel_case(method_name))
            .ok_or_else(|| format!("rpc: can't find method {}", service_method))
    }

    /// Run the handler for `service_method` on this thread
    pub fn dispatch(&self, service_method: &str, payload: &[u8], sink: &dyn EventSink) -> Reply {
        match self.lookup(service_method) {
            Ok(handler) => handler.invoke(service_method, payload, sink),
            Err(message) => Reply::failed(ErrorKind::Dispatch, message),
        }
    }

    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.values().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn method_names(&self, service_name: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .services
            .get(&camel_case(service_name))
            .map(|s| s.methods.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// In-process calls straight into the registry, no connection involved
#[async_trait::async_trait]
impl Caller for ServiceRegistry {
    async fn call_raw(&self, service_method: &str, payload: Vec<u8>) -> Result<Vec<u8>> {
        let reply = self.dispatch(service_method, &payload, &TracingSink);
        if reply.is_ok() {
            Ok(reply.payload)
        } else {
            Err(Error::from_response(reply.error_kind, reply.error))
        }
    }
}
