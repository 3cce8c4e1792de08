//! The `Pipeline`: owns every service and schema, validates a loaded
//! `PipelineConfig` once at construction, and exposes the
//! per-cycle entry points implemented in `backpressure`, `flow`, and
//! `classifier`.

use std::collections::HashMap;

use log::info;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Warning};
use crate::graph::Graph;
use crate::paths::OverloadPath;
use crate::schema::{Schema, SchemaRegistry};
use crate::service::{CapacityBand, Service};
use crate::snapshot::PipelineSnapshot;

#[derive(Debug, Clone)]
pub struct Pipeline {
    schemas: SchemaRegistry,
    services: HashMap<String, Service>,
    /// Insertion order of service names (config's `schema_capacities`
    /// key order), authoritative for every deterministic traversal.
    service_order: Vec<String>,
    graph: Graph,
    max_iterations: usize,
}

impl Pipeline {
    /// Validates and builds a pipeline from a parsed configuration.
    /// Every failure is a `PipelineError`; nothing here is a `Warning`,
    /// since a malformed configuration can't be partially resolved.
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let mut schemas = SchemaRegistry::new();
        for (name, priority) in &config.schema_priorities {
            schemas.insert(Schema::new(name.clone(), *priority));
        }

        let service_order: Vec<String> = config.schema_capacities.keys().cloned().collect();
        let admission_points: std::collections::HashSet<&str> = config
            .admission_points
            .iter()
            .map(String::as_str)
            .collect();

        let mut services = HashMap::with_capacity(service_order.len());
        for service_name in &service_order {
            let bands = &config.schema_capacities[service_name];
            let mut schema_bands = Vec::with_capacity(bands.len());
            for (schema_name, &(min, max)) in bands {
                if !schemas.contains(schema_name) {
                    return Err(PipelineError::MissingPriority {
                        service: service_name.clone(),
                        schema: schema_name.clone(),
                    });
                }
                if min < 0.0 || max < 0.0 {
                    return Err(PipelineError::NegativeValue {
                        service: service_name.clone(),
                        schema: schema_name.clone(),
                        detail: format!("capacity band ({min}, {max})"),
                    });
                }
                if min > max {
                    return Err(PipelineError::InvalidCapacityBand {
                        service: service_name.clone(),
                        schema: schema_name.clone(),
                        min,
                        max,
                    });
                }
                schema_bands.push((schema_name.clone(), CapacityBand::new(min, max)));
            }

            let is_admission_point = admission_points.contains(service_name.as_str());
            let mut service = Service::new(service_name.clone(), schema_bands, is_admission_point);

            if let Some(flows) = config.service_flows.get(service_name) {
                for (schema_name, &(incoming, outgoing)) in flows {
                    if !service.supports(schema_name) {
                        return Err(PipelineError::MissingCapacity {
                            service: service_name.clone(),
                            schema: schema_name.clone(),
                        });
                    }
                    if incoming < 0.0 || outgoing < 0.0 {
                        return Err(PipelineError::NegativeValue {
                            service: service_name.clone(),
                            schema: schema_name.clone(),
                            detail: format!("flow ({incoming}, {outgoing})"),
                        });
                    }
                    service.install_flow(schema_name, incoming, outgoing);
                }
            }

            services.insert(service_name.clone(), service);
        }

        let downstream: HashMap<String, Vec<String>> = config
            .graph
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let graph = Graph::new(downstream, service_order.clone())?;

        let max_iterations = 2 * service_order.len().max(1);

        Ok(Self {
            schemas,
            services,
            service_order,
            graph,
            max_iterations,
        })
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn service_order(&self) -> &[String] {
        &self.service_order
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut Service> {
        self.services.get_mut(name)
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.service_order.iter().map(move |n| &self.services[n])
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Overrides the iteration cap (from `RunConfig::max_iterations_override`).
    pub fn set_max_iterations(&mut self, n: usize) {
        self.max_iterations = n;
    }

    /// Installs per-cycle incoming/outgoing rates for one service/schema
    /// slot, validating that both names are already known.
    pub fn install_flow(
        &mut self,
        service: &str,
        schema: &str,
        incoming: f64,
        outgoing: f64,
    ) -> Result<(), PipelineError> {
        let svc = self
            .services
            .get_mut(service)
            .ok_or_else(|| PipelineError::UnknownService {
                name: service.to_string(),
            })?;
        if !svc.supports(schema) {
            return Err(PipelineError::UnknownSchemaForService {
                service: service.to_string(),
                schema: schema.to_string(),
            });
        }
        svc.install_flow(schema, incoming, outgoing);
        Ok(())
    }

    /// Resets per-cycle backpressure bookkeeping on every service, ahead
    /// of a new call to `resolve_overloads`.
    pub fn reset_backpressure_state(&mut self) {
        for name in &self.service_order {
            self.services.get_mut(name).expect("service_order is authoritative").reset_backpressure_state();
        }
    }

    /// Runs one full cycle: a pre-cycle snapshot and overload-dependency
    /// paths against the state as installed, then `resolve_overloads`
    /// and classification, then a crystallized post-cycle snapshot.
    /// The paths are computed before `resolve_overloads` runs, against
    /// the pre-cycle overloaded state, so they describe what caused the
    /// cycle's backpressure rather than what remains after it's relieved.
    pub fn run_cycle(&mut self) -> CycleReport {
        info!("cycle: installed flows, taking pre-cycle snapshot");
        let pre_snapshot = PipelineSnapshot::from(&*self);

        info!("cycle: computing overload dependency paths against pre-cycle state");
        let overload_paths = self.overload_dependency_paths();

        info!("cycle: resolving overloads");
        let warnings = self.resolve_overloads();

        info!("cycle: crystallizing post-cycle snapshot");
        let post_snapshot = PipelineSnapshot::from(&*self);

        CycleReport {
            pre_snapshot,
            overload_paths,
            warnings,
            post_snapshot,
        }
    }
}

/// Everything produced by one `Pipeline::run_cycle` call, in the order
/// the cycle produced it.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub pre_snapshot: PipelineSnapshot,
    pub overload_paths: Vec<OverloadPath>,
    pub warnings: Vec<Warning>,
    pub post_snapshot: PipelineSnapshot,
}
