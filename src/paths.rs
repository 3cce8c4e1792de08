//! Overload dependency path reporting.
//!
//! Walks upstream from an overloaded service until it reaches a
//! service flagged `Service::is_admission_point`, ordered by the SCC
//! condensation's topological order so a cyclic upstream neighborhood
//! still produces a well-defined path.

use std::collections::{HashSet, VecDeque};

use crate::pipeline::Pipeline;

/// The chain of services between the nearest admission point and an
/// overloaded schema slot, in downstream order (admission point first).
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadPath {
    pub service: String,
    pub schema: String,
    pub path: Vec<String>,
}

impl Pipeline {
    /// For every currently overloaded schema slot, finds the shortest
    /// upstream path back to an admission point via breadth-first
    /// search. A slot with no admission point anywhere upstream (or
    /// that is itself the admission point) reports a single-element
    /// path containing just itself.
    pub fn overload_dependency_paths(&self) -> Vec<OverloadPath> {
        let mut paths = Vec::new();
        for name in self.graph().condensation_topological_order() {
            let service = match self.service(&name) {
                Some(s) => s,
                None => continue,
            };
            if !service.is_overloaded() {
                continue;
            }
            let upstream_path = self.find_upstream_path(&name);
            for schema in service.supported_schemas() {
                if service.incoming_flow(schema) > service.current_capacity(schema) {
                    paths.push(OverloadPath {
                        service: name.clone(),
                        schema: schema.clone(),
                        path: upstream_path.clone(),
                    });
                }
            }
        }
        paths
    }

    /// BFS from `start` against the edge direction (i.e. through
    /// `upstream`) until an admission point is found. Returns the path
    /// from that admission point down to `start`, or `[start]` if none
    /// is reachable.
    fn find_upstream_path(&self, start: &str) -> Vec<String> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());
        let mut queue: VecDeque<Vec<String>> = VecDeque::new();
        queue.push_back(vec![start.to_string()]);

        while let Some(path) = queue.pop_front() {
            let head = path.first().expect("path is never empty");
            if self.service(head).map(|s| s.is_admission_point).unwrap_or(false) {
                return path;
            }
            for up in self.graph().upstream(head) {
                if visited.insert(up.clone()) {
                    let mut next = path.clone();
                    next.insert(0, up.clone());
                    queue.push_back(next);
                }
            }
        }
        vec![start.to_string()]
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

        let mut make_bands = |max: f64| {
            let mut bands = BTreeMap::new();
            bands.insert("S1".to_string(), (0.0, max));
            bands
        };
        let mut schema_capacities = BTreeMap::new();
        schema_capacities.insert("Source".to_string(), make_bands(100.0));
        schema_capacities.insert("Mid".to_string(), make_bands(100.0));
        schema_capacities.insert("Sink".to_string(), make_bands(10.0));

        let mut sink_flows = BTreeMap::new();
        sink_flows.insert("S1".to_string(), (50.0, 0.0));
        let mut service_flows = BTreeMap::new();
        service_flows.insert("Sink".to_string(), sink_flows);

        let mut graph = BTreeMap::new();
        graph.insert("Source".to_string(), vec!["Mid".to_string()]);
        graph.insert("Mid".to_string(), vec!["Sink".to_string()]);
        graph.insert("Sink".to_string(), vec![]);

        PipelineConfig {
            schema_priorities,
            schema_capacities,
            service_flows,
            graph,
            admission_points: vec!["Source".to_string()],
        }
    }

    #[test]
    fn overload_path_reaches_back_to_admission_point() {
        let pipeline = Pipeline::new(&chain_config()).unwrap();
        let paths = pipeline.overload_dependency_paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].service, "Sink");
        assert_eq!(paths[0].path, vec!["Source".to_string(), "Mid".to_string(), "Sink".to_string()]);
    }
}
