//! Integer arithmetic over 32-bit operands.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use switchboard_rpc::{call, Caller, MethodTable, Service, ServiceError};

pub const SERVICE_NAME: &str = "ArithService";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArithRequest {
    pub a: i32,
    pub b: i32,
}

impl ArithRequest {
    pub fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArithResponse {
    pub c: i32,
}

/// Arithmetic results wrap on overflow.
#[derive(Debug, Default)]
pub struct ArithService;

impl ArithService {
    pub fn add(&self, args: &ArithRequest, reply: &mut ArithResponse) -> Result<(), ServiceError> {
        reply.c = args.a.wrapping_add(args.b);
        Ok(())
    }

    pub fn mul(&self, args: &ArithRequest, reply: &mut ArithResponse) -> Result<(), ServiceError> {
        reply.c = args.a.wrapping_mul(args.b);
        Ok(())
    }

    /// Truncating division
    pub fn div(&self, args: &ArithRequest, reply: &mut ArithResponse) -> Result<(), ServiceError> {
        if args.b == 0 {
            return Err(ServiceError::new("divide by zero"));
        }
        reply.c = args.a.wrapping_div(args.b);
        Ok(())
    }

    /// Always fails
    pub fn error(&self, _args: &ArithRequest, _reply: &mut ArithResponse) -> Result<(), ServiceError> {
        Err(ServiceError::new("ArithError"))
    }
}

impl Service for ArithService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    fn methods(self: Arc<Self>) -> MethodTable {
        let (add, mul, div, error) = (
            Arc::clone(&self),
            Arc::clone(&self),
            Arc::clone(&self),
            self,
        );

        MethodTable::new()
            .method("add", move |args: &ArithRequest, reply: &mut ArithResponse| {
                add.add(args, reply)
            })
            .method("mul", move |args: &ArithRequest, reply: &mut ArithResponse| {
                mul.mul(args, reply)
            })
            .method("div", move |args: &ArithRequest, reply: &mut ArithResponse| {
                div.div(args, reply)
            })
            .method("error", move |args: &ArithRequest, reply: &mut ArithResponse| {
                error.error(args, reply)
            })
    }
}

/// Typed calls to [`ArithService`] through any [`Caller`]
pub struct ArithClient<'a, C: Caller + ?Sized> {
    caller: &'a C,
}

impl<'a, C: Caller + ?Sized> ArithClient<'a, C> {
    pub fn new(caller: &'a C) -> Self {
        Self { caller }
    }

    pub async fn add(&self, args: &ArithRequest) -> switchboard_rpc::Result<ArithResponse> {
        call(self.caller, "ArithService.Add", args).await
    }

    pub async fn mul(&self, args: &ArithRequest) -> switchboard_rpc::Result<ArithResponse> {
        call(self.caller, "ArithService.Mul", args).await
    }

    pub async fn div(&self, args: &ArithRequest) -> switchboard_rpc::Result<ArithResponse> {
        call(self.caller, "ArithService.Div", args).await
    }

    pub async fn error(&self, args: &ArithRequest) -> switchboard_rpc::Result<ArithResponse> {
        call(self.caller, "ArithService.Error", args).await
    }
}
