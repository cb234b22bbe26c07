use std::sync::Arc;

use serde::{Deserialize, Serialize};
use switchboard_rpc::{call, Caller, MethodTable, Service, ServiceError};

pub const SERVICE_NAME: &str = "EchoService";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoRequest {
    pub msg: String,
}

impl EchoRequest {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub msg: String,
}

#[derive(Debug, Default)]
pub struct EchoService;

impl EchoService {
    pub fn echo(&self, args: &EchoRequest, reply: &mut EchoResponse) -> Result<(), ServiceError> {
        reply.msg.clone_from(&args.msg);
        Ok(())
    }

    /// The message repeated back to back
    pub fn echo_twice(&self, args: &EchoRequest, reply: &mut EchoResponse) -> Result<(), ServiceError> {
        reply.msg = args.msg.repeat(2);
        Ok(())
    }
}

impl Service for EchoService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    fn methods(self: Arc<Self>) -> MethodTable {
        let echo = Arc::clone(&self);

        MethodTable::new()
            .method("Echo", move |args: &EchoRequest, reply: &mut EchoResponse| {
                echo.echo(args, reply)
            })
            .method("EchoTwice", move |args: &EchoRequest, reply: &mut EchoResponse| {
                self.echo_twice(args, reply)
            })
    }
}

/// Typed calls to [`EchoService`] through any [`Caller`]
pub struct EchoClient<'a, C: Caller + ?Sized> {
    caller: &'a C,
}

impl<'a, C: Caller + ?Sized> EchoClient<'a, C> {
    pub fn new(caller: &'a C) -> Self {
        Self { caller }
    }

    pub async fn echo(&self, args: &EchoRequest) -> switchboard_rpc::Result<EchoResponse> {
        call(self.caller, "EchoService.Echo", args).await
    }

    pub async fn echo_twice(&self, args: &EchoRequest) -> switchboard_rpc::Result<EchoResponse> {
        call(self.caller, "EchoService.EchoTwice", args).await
    }
}
