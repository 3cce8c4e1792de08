//! Serializable snapshot of a pipeline's state after a cycle. The
//! library never formats a table; it only ever hands back
//! `serde`-serializable data for a caller to print.

use serde::Serialize;

use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Serialize)]
pub struct SchemaFlow {
    pub schema: String,
    pub incoming: f64,
    pub outgoing: f64,
    pub allocated_capacity: f64,
    pub current_capacity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub is_admission_point: bool,
    pub status: String,
    pub action: String,
    pub schemas: Vec<SchemaFlow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub services: Vec<ServiceSnapshot>,
}

impl From<&Pipeline> for PipelineSnapshot {
    fn from(pipeline: &Pipeline) -> Self {
        let services = pipeline
            .services()
            .map(|service| ServiceSnapshot {
                name: service.name().to_string(),
                is_admission_point: service.is_admission_point,
                status: service.status.to_string(),
                action: service.action.to_string(),
                schemas: service
                    .supported_schemas()
                    .iter()
                    .map(|schema| SchemaFlow {
                        schema: schema.clone(),
                        incoming: crate::util::round2(service.incoming_flow(schema)),
                        outgoing: crate::util::round2(service.outgoing_flow(schema)),
                        allocated_capacity: crate::util::round2(service.allocated_capacity(schema)),
                        current_capacity: crate::util::round2(service.current_capacity(schema)),
                    })
                    .collect(),
            })
            .collect();
        Self { services }
    }
}
