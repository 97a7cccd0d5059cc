//! gRPC service implementations.
//!
//! Each handler owns a [`Store`](crate::server::store::Store) handle and a
//! clone of the server-wide shutdown token. Once the token is cancelled,
//! handlers answer `UNAVAILABLE` instead of touching their store.
//!
//! ## Structure
//!
//! - [`incident`] - `IncidentService` entry point (`IncidentHandler`).
//! - [`greeter`] - `Greeter` entry point (`GreeterHandler`).

pub mod greeter;
pub mod incident;

use crate::server::telemetry::{
    increment_request_errors, increment_requests, record_request_duration,
};
use incident_tonic_core::Error;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::{Response, Status};

/// Rejects new work once shutdown has begun.
fn ensure_serving(shutdown: &CancellationToken) -> Result<(), Error> {
    if shutdown.is_cancelled() {
        return Err(Error::ServiceShutdown);
    }
    Ok(())
}

/// Runs one unary call body, recording request, error and latency metrics.
fn observe<T>(
    method: &'static str,
    call: impl FnOnce() -> Result<T, Error>,
) -> Result<Response<T>, Status> {
    let start = Instant::now();
    increment_requests(method);

    let result = call();
    record_request_duration(method, start.elapsed().as_secs_f64() * 1000.0);

    match result {
        Ok(reply) => Ok(Response::new(reply)),
        Err(err) => {
            let status = Status::from(err);
            increment_request_errors(method, status.code());
            #[cfg(feature = "tracing")]
            tracing::debug!(method, code = ?status.code(), "{}", status.message());
            Err(status)
        }
    }
}
