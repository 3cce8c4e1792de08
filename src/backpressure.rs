//! Overload detection and upstream backpressure propagation: the fixpoint loop that drives one cycle's overload resolution.

use log::{debug, info};

use crate::error::Warning;
use crate::pipeline::Pipeline;
use crate::util::flows_equal;

/// One overloaded schema slot found by `calculate_overloads`.
#[derive(Debug, Clone, PartialEq)]
pub struct Overload {
    pub service: String,
    pub schema: String,
    /// Fraction of incoming flow that must be shed to bring this slot
    /// back down to its allocated capacity.
    pub reduction_ratio: f64,
}

impl Pipeline {
    /// Reallocates every service's capacity across its
    /// schemas, then reports every schema slot whose incoming flow still
    /// exceeds what it was allocated. A slot with zero current capacity
    /// and nonzero incoming flow is reported at a 100% reduction ratio
    /// and also recorded as a `Warning::ZeroCapacity`.
    pub fn calculate_overloads(&mut self, warnings: &mut Vec<Warning>) -> Vec<Overload> {
        let mut overloads = Vec::new();
        let names = self.service_order().to_vec();
        for name in &names {
            let service = self.service_mut(name).expect("service_order is authoritative");
            service.reallocate_capacity_across_schemas();

            for schema in service.supported_schemas().to_vec() {
                let incoming = service.incoming_flow(&schema);
                let allocated = service.allocated_capacity(&schema);
                if incoming <= allocated || flows_equal(incoming, allocated) {
                    continue;
                }
                let current = service.current_capacity(&schema);
                if current <= 0.0 && incoming > 0.0 {
                    warnings.push(Warning::ZeroCapacity {
                        service: name.clone(),
                        schema: schema.clone(),
                    });
                }
                let ratio = (incoming - allocated) / incoming;
                overloads.push(Overload {
                    service: name.clone(),
                    schema,
                    reduction_ratio: ratio,
                });
            }
        }
        overloads
    }

    /// Applies `reduction_percentage` to `(service, schema)`, then
    /// recurses into every upstream neighbor with whatever reduction
    /// ratio actually took effect there. No explicit visited set is
    /// threaded through the recursion; each service's own `visited`
    /// flag (reset once per `resolve_overloads` iteration) is what stops
    /// the recursion from looping forever around a cycle in the graph.
    pub fn propagate_backpressure(&mut self, service: &str, schema: &str, reduction_percentage: f64) {
        let upstream = self.graph().upstream(service).to_vec();
        for up in upstream {
            let applied = match self.service_mut(&up) {
                Some(svc) if svc.supports(schema) => svc.apply_backpressure(schema, reduction_percentage),
                _ => continue,
            };
            if applied > 0.0 {
                self.propagate_backpressure(&up, schema, applied);
            }
        }
    }

    /// The full per-cycle fixpoint. Repeatedly finds overloaded
    /// schema slots and pushes backpressure upstream until none remain
    /// or `max_iterations` is exhausted, then reallocates and classifies
    /// every service once more. Returns the warnings collected along
    /// the way.
    pub fn resolve_overloads(&mut self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        let max_iterations = self.max_iterations();
        let mut converged = false;

        info!("resolve_overloads: starting fixpoint, max_iterations={max_iterations}");
        for iteration in 0..max_iterations {
            self.reset_backpressure_state();
            let overloads = self.calculate_overloads(&mut warnings);
            debug!("resolve_overloads iteration {iteration}: {} overloaded slot(s)", overloads.len());
            if overloads.is_empty() {
                converged = true;
                break;
            }
            for overload in overloads {
                let applied = self
                    .service_mut(&overload.service)
                    .expect("service_order is authoritative")
                    .apply_backpressure(&overload.schema, overload.reduction_ratio);
                debug!(
                    "resolve_overloads iteration {iteration}: {}.{} reduced by {:.4}, propagating {applied:.4} upstream",
                    overload.service, overload.schema, overload.reduction_ratio
                );
                if applied > 0.0 {
                    self.propagate_backpressure(&overload.service, &overload.schema, applied);
                }
            }
        }

        if converged {
            info!("resolve_overloads: converged");
        } else {
            info!("resolve_overloads: hit iteration cap without converging");
            warnings.push(Warning::NonConvergence {
                phase: "resolve_overloads",
                iterations: max_iterations,
            });
        }

        for name in self.service_order().to_vec() {
            self.service_mut(&name)
                .expect("service_order is authoritative")
                .reallocate_capacity_across_schemas();
        }
        self.assess_all_service_statuses();

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use std::collections::BTreeMap;

    fn chain_config() -> PipelineConfig {
        let mut schema_priorities = BTreeMap::new();
        schema_priorities.insert("S1".to_string(), 1u32);

        let mut source_bands = BTreeMap::new();
        source_bands.insert("S1".to_string(), (0.0, 100.0));
        let mut dest_bands = BTreeMap::new();
        dest_bands.insert("S1".to_string(), (0.0, 30.0));
        let mut schema_capacities = BTreeMap::new();
        schema_capacities.insert("Source".to_string(), source_bands);
        schema_capacities.insert("Destination".to_string(), dest_bands);

        let mut source_flows = BTreeMap::new();
        source_flows.insert("S1".to_string(), (100.0, 0.0));
        let mut dest_flows = BTreeMap::new();
        dest_flows.insert("S1".to_string(), (100.0, 0.0));
        let mut service_flows = BTreeMap::new();
        service_flows.insert("Source".to_string(), source_flows);
        service_flows.insert("Destination".to_string(), dest_flows);

        let mut graph = BTreeMap::new();
        graph.insert("Source".to_string(), vec!["Destination".to_string()]);
        graph.insert("Destination".to_string(), vec![]);

        PipelineConfig {
            schema_priorities,
            schema_capacities,
            service_flows,
            graph,
            admission_points: vec!["Source".to_string()],
        }
    }

    #[test]
    fn overloaded_destination_pushes_backpressure_upstream() {
        let mut pipeline = Pipeline::new(&chain_config()).unwrap();
        let warnings = pipeline.resolve_overloads();
        assert!(warnings.iter().all(|w| !matches!(w, Warning::NonConvergence { .. })));

        let dest = pipeline.service("Destination").unwrap();
        assert!(dest.incoming_flow("S1") <= 30.0 + 1e-9);

        let source = pipeline.service("Source").unwrap();
        assert!(source.incoming_flow("S1") < 100.0);
    }

    #[test]
    fn no_overload_means_no_backpressure_applied() {
        let mut config = chain_config();
        config.service_flows.get_mut("Source").unwrap().insert("S1".to_string(), (20.0, 0.0));
        config.service_flows.get_mut("Destination").unwrap().insert("S1".to_string(), (20.0, 0.0));
        let mut pipeline = Pipeline::new(&config).unwrap();
        let warnings = pipeline.resolve_overloads();
        assert!(warnings.is_empty());
        assert_eq!(pipeline.service("Source").unwrap().incoming_flow("S1"), 20.0);
    }
}
