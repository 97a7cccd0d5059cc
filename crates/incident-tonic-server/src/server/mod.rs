//! Server-side components of the incident and greeter services.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/env configuration.
//! - [`service`] - gRPC handlers for `IncidentService` and `Greeter`.
//! - [`store`] - Shared in-memory record storage.
//! - [`telemetry`] - Logging, tracing and metrics setup.

pub mod config;
pub mod service;
pub mod store;
pub mod telemetry;
