//! gRPC service implementation for incident reports.
//!
//! [`IncidentHandler`] implements the generated [`IncidentService`] trait on
//! top of a [`Store`] of [`Incident`] records.
//!
//! ## Responsibilities
//!
//! - Reject reports that carry no incident payload.
//! - Pick the record id (client supplied or generated) and stamp `created`.
//! - Insert with last-write-wins semantics and echo the id back.
//! - Serve stored records by id.

use super::{ensure_serving, observe};
use crate::server::{store::Store, telemetry::increment_incidents_stored};
use incident_tonic_core::{
    Error,
    proto::incident::{
        GetIncidentRequest, GetIncidentResponse, Incident, IncidentReport, ReportIncidentRequest,
        ReportIncidentResponse, incident_service_server::IncidentService,
    },
    types::{INCIDENT, new_record_id, timestamp_now},
};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

pub const REPORTED_MESSAGE: &str = "Incident reported successfully";
pub const MISSING_INCIDENT: &str = "Incident data is missing";

#[derive(Clone)]
pub struct IncidentHandler {
    store: Store<Incident>,
    shutdown: CancellationToken,
}

impl IncidentHandler {
    pub const fn new(store: Store<Incident>, shutdown: CancellationToken) -> Self {
        Self { store, shutdown }
    }

    fn report(&self, req: ReportIncidentRequest) -> Result<ReportIncidentResponse, Error> {
        ensure_serving(&self.shutdown)?;

        let report = req.incident.ok_or_else(|| Error::InvalidRequest {
            reason: MISSING_INCIDENT.to_string(),
        })?;
        let incident = into_record(report);
        let id = incident.id.clone();

        if self.store.insert(id.clone(), incident).is_none() {
            increment_incidents_stored();
        }

        Ok(ReportIncidentResponse {
            message: REPORTED_MESSAGE.to_string(),
            id,
        })
    }

    fn get(&self, req: GetIncidentRequest) -> Result<GetIncidentResponse, Error> {
        ensure_serving(&self.shutdown)?;

        let incident = self
            .store
            .get(&req.id)
            .ok_or(Error::NotFound { entity: INCIDENT })?;

        Ok(GetIncidentResponse {
            incident: Some(incident),
        })
    }
}

/// Builds the stored record from a client report, filling in every field the
/// client left out.
fn into_record(report: IncidentReport) -> Incident {
    let id = report
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(new_record_id);

    Incident {
        id,
        r#type: report.r#type.unwrap_or_default(),
        description: report.description.unwrap_or_default(),
        anonymous: report.anonymous.unwrap_or_default(),
        created: timestamp_now(),
    }
}

#[tonic::async_trait]
impl IncidentService for IncidentHandler {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(has_incident = req.get_ref().incident.is_some())))]
    async fn report_incident(
        &self,
        req: Request<ReportIncidentRequest>,
    ) -> Result<Response<ReportIncidentResponse>, Status> {
        observe("ReportIncident", || self.report(req.into_inner()))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(id = %req.get_ref().id)))]
    async fn get_incident(
        &self,
        req: Request<GetIncidentRequest>,
    ) -> Result<Response<GetIncidentResponse>, Status> {
        observe("GetIncident", || self.get(req.into_inner()))
    }
}
