//! Shared protocol bindings, error type, and record helpers.
//!
//! ## Submodules
//!
//! - [`error`] - Service error type and its `tonic::Status` mapping.
//! - [`types`] - Record identifiers and timestamp helpers.
//! - [`proto`] - Generated message and service definitions.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from `proto/`.
///
/// ## Services
///
/// - [`incident::incident_service_server::IncidentService`] - report and fetch
///   incidents.
/// - [`greeter::greeter_server::Greeter`] - greet by name and fetch stored
///   greetings.
///
/// [`FILE_DESCRIPTOR_SET`] covers both packages and is meant for
/// `tonic-reflection`.
pub mod proto {
    pub mod incident {
        tonic::include_proto!("incident");
    }

    pub mod greeter {
        tonic::include_proto!("greeter");
    }

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("reports_descriptor");
}
