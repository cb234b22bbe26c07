use serde::de::DeserializeOwned;
use serde::Serialize;
use switchboard_fabric::codec::{BincodeCodec, Codec};

use crate::error::Result;

/// Something that can carry a `Service.Method` call and return its reply
///
/// Implemented by the network [`Client`](crate::Client) and by
/// [`ServiceRegistry`](crate::ServiceRegistry) for in-process calls, so
/// hand-written stubs work against either.
#[async_trait::async_trait]
pub trait Caller: Send + Sync {
    /// Send already-encoded arguments and wait for the encoded reply
    async fn call_raw(&self, service_method: &str, payload: Vec<u8>) -> Result<Vec<u8>>;
}

/// Typed call through any [`Caller`]
pub async fn call<C, Req, Resp>(caller: &C, service_method: &str, args: &Req) -> Result<Resp>
where
    C: Caller + ?Sized,
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let payload = BincodeCodec.encode(args)?;
    let reply = caller.call_raw(service_method, payload).await?;
    Ok(BincodeCodec.decode(&reply)?)
}
