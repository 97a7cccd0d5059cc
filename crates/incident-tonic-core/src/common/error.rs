//! Error types for the incident and greeter services.
//!
//! This module defines the central `Error` enum for every failure a handler
//! reports to a client. It implements `From<Error>` for `tonic::Status` so
//! handlers can return it with `?` or `.into()`.
//!
//! ## Error Cases
//! - `InvalidRequest`: The request payload was missing or malformed.
//! - `NotFound`: A lookup by identifier missed.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the incident and greeter services.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The client request was missing a required payload.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// No record is stored under the requested identifier.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::NotFound { entity } => Status::not_found(format!("{entity} not found")),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
