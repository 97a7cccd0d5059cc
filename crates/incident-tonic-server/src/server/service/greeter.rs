//! gRPC service implementation for greetings.
//!
//! `SayHello` is stateless. `GetGreeting` reads a [`Store`] that no RPC
//! writes to, so over the network every lookup ends in `NOT_FOUND` unless the
//! embedding process seeded the store itself.

use super::{ensure_serving, observe};
use crate::server::store::Store;
use incident_tonic_core::{
    Error,
    proto::greeter::{
        GetGreetingRequest, GetGreetingResponse, Greeting, HelloReply, HelloRequest,
        greeter_server::Greeter,
    },
    types::GREETING,
};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

#[derive(Clone)]
pub struct GreeterHandler {
    store: Store<Greeting>,
    shutdown: CancellationToken,
}

impl GreeterHandler {
    pub const fn new(store: Store<Greeting>, shutdown: CancellationToken) -> Self {
        Self { store, shutdown }
    }

    fn hello(&self, req: HelloRequest) -> Result<HelloReply, Error> {
        ensure_serving(&self.shutdown)?;
        Ok(HelloReply {
            message: greet(&req.name),
        })
    }

    fn get(&self, req: GetGreetingRequest) -> Result<GetGreetingResponse, Error> {
        ensure_serving(&self.shutdown)?;

        let greeting = self
            .store
            .get(&req.id)
            .ok_or(Error::NotFound { entity: GREETING })?;

        Ok(GetGreetingResponse {
            greeting: Some(greeting),
        })
    }
}

/// No validation: an empty name yields `"Hello, !"`.
fn greet(name: &str) -> String {
    format!("Hello, {name}!")
}

#[tonic::async_trait]
impl Greeter for GreeterHandler {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn say_hello(&self, req: Request<HelloRequest>) -> Result<Response<HelloReply>, Status> {
        observe("SayHello", || self.hello(req.into_inner()))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(id = %req.get_ref().id)))]
    async fn get_greeting(
        &self,
        req: Request<GetGreetingRequest>,
    ) -> Result<Response<GetGreetingResponse>, Status> {
        observe("GetGreeting", || self.get(req.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    fn handler() -> (GreeterHandler, Store<Greeting>, CancellationToken) {
        let store = Store::new();
        let shutdown = CancellationToken::new();
        (
            GreeterHandler::new(store.clone(), shutdown.clone()),
            store,
            shutdown,
        )
    }

    async fn say_hello(handler: &GreeterHandler, name: &str) -> String {
        handler
            .say_hello(Request::new(HelloRequest {
                name: name.to_string(),
            }))
            .await
            .unwrap()
            .into_inner()
            .message
    }

    #[tokio::test]
    async fn hello_interpolates_name() {
        let (handler, _, _) = handler();
        assert_eq!(say_hello(&handler, "Ada").await, "Hello, Ada!");
    }

    #[tokio::test]
    async fn hello_accepts_empty_name() {
        let (handler, _, _) = handler();
        assert_eq!(say_hello(&handler, "").await, "Hello, !");
    }

    #[tokio::test]
    async fn greeting_lookup_misses_without_seed() {
        let (handler, _, _) = handler();
        let status = handler
            .get_greeting(Request::new(GetGreetingRequest { id: "1".into() }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "Greeting not found");
    }

    #[tokio::test]
    async fn seeded_greeting_is_returned() {
        let (handler, store, _) = handler();
        let greeting = Greeting {
            id: "morning".into(),
            greeting: "Good morning".into(),
        };
        store.insert(greeting.id.clone(), greeting.clone());

        let reply = handler
            .get_greeting(Request::new(GetGreetingRequest {
                id: "morning".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.greeting, Some(greeting));
    }

    #[tokio::test]
    async fn hello_refused_after_shutdown() {
        let (handler, _, shutdown) = handler();
        shutdown.cancel();

        let status = handler
            .say_hello(Request::new(HelloRequest { name: "Ada".into() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }
}
