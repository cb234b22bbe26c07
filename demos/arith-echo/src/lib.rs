//! Demonstration services served by `demo-server` and exercised by
//! `demo-client`.

pub mod arith;
pub mod echo;

use switchboard_rpc::ServiceRegistry;

pub use arith::{ArithClient, ArithRequest, ArithResponse, ArithService};
pub use echo::{EchoClient, EchoRequest, EchoResponse, EchoService};

/// Registry holding both demo services
pub fn registry() -> switchboard_rpc::Result<ServiceRegistry> {
    let mut registry = ServiceRegistry::new();
    registry.register_service(ArithService)?;
    registry.register_service(EchoService)?;
    Ok(registry)
}
