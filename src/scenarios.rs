//! Named scenario builders plus a randomized topology generator built
//! on `rand` for reproducible fuzzing.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::PipelineConfig;

fn band(min: f64, max: f64) -> (f64, f64) {
    (min, max)
}

fn linear_graph(names: &[&str]) -> BTreeMap<String, Vec<String>> {
    let mut graph = BTreeMap::new();
    for window in names.windows(2) {
        graph.insert(window[0].to_string(), vec![window[1].to_string()]);
    }
    graph.insert(names.last().unwrap().to_string(), vec![]);
    graph
}

/// Scenario A: Source -> Processor -> Destination, single schema, a
/// straightforward single-hop overload.
pub fn scenario_a_linear_overload() -> PipelineConfig {
    let mut schema_priorities = BTreeMap::new();
    schema_priorities.insert("S1".to_string(), 1);

    let mut schema_capacities = BTreeMap::new();
    schema_capacities.insert("Source".to_string(), BTreeMap::from([("S1".to_string(), band(0.0, 100.0))]));
    schema_capacities.insert("Processor".to_string(), BTreeMap::from([("S1".to_string(), band(0.0, 80.0))]));
    schema_capacities.insert("Destination".to_string(), BTreeMap::from([("S1".to_string(), band(0.0, 80.0))]));

    let mut service_flows = BTreeMap::new();
    service_flows.insert("Source".to_string(), BTreeMap::from([("S1".to_string(), band(100.0, 0.0))]));
    service_flows.insert("Processor".to_string(), BTreeMap::from([("S1".to_string(), band(100.0, 0.0))]));
    service_flows.insert("Destination".to_string(), BTreeMap::from([("S1".to_string(), band(80.0, 0.0))]));

    PipelineConfig {
        schema_priorities,
        schema_capacities,
        service_flows,
        graph: linear_graph(&["Source", "Processor", "Destination"]),
        admission_points: vec!["Source".to_string()],
    }
}

/// Scenario B: two independent chains funnel into a shared, undersized
/// destination.
pub fn scenario_b_dual_path_funnel() -> PipelineConfig {
    let mut schema_priorities = BTreeMap::new();
    schema_priorities.insert("S1".to_string(), 1);

    let mut schema_capacities = BTreeMap::new();
    for name in ["Source1", "ProcA", "Source2", "ProcB"] {
        schema_capacities.insert(name.to_string(), BTreeMap::from([("S1".to_string(), band(0.0, 200.0))]));
    }
    schema_capacities.insert("Dest".to_string(), BTreeMap::from([("S1".to_string(), band(0.0, 100.0))]));

    let mut service_flows = BTreeMap::new();
    service_flows.insert("Source1".to_string(), BTreeMap::from([("S1".to_string(), band(60.0, 0.0))]));
    service_flows.insert("ProcA".to_string(), BTreeMap::from([("S1".to_string(), band(60.0, 0.0))]));
    service_flows.insert("Source2".to_string(), BTreeMap::from([("S1".to_string(), band(70.0, 0.0))]));
    service_flows.insert("ProcB".to_string(), BTreeMap::from([("S1".to_string(), band(70.0, 0.0))]));
    service_flows.insert("Dest".to_string(), BTreeMap::from([("S1".to_string(), band(130.0, 0.0))]));

    let mut graph = BTreeMap::new();
    graph.insert("Source1".to_string(), vec!["ProcA".to_string()]);
    graph.insert("ProcA".to_string(), vec!["Dest".to_string()]);
    graph.insert("Source2".to_string(), vec!["ProcB".to_string()]);
    graph.insert("ProcB".to_string(), vec!["Dest".to_string()]);
    graph.insert("Dest".to_string(), vec![]);

    PipelineConfig {
        schema_priorities,
        schema_capacities,
        service_flows,
        graph,
        admission_points: vec!["Source1".to_string(), "Source2".to_string()],
    }
}

/// Scenario C: one chain carrying two schemas of differing priority;
/// only the lower-priority schema is overloaded.
pub fn scenario_c_priority_coexistence() -> PipelineConfig {
    let mut schema_priorities = BTreeMap::new();
    schema_priorities.insert("S1".to_string(), 2);
    schema_priorities.insert("S2".to_string(), 1);

    let mut processor_bands = BTreeMap::new();
    processor_bands.insert("S1".to_string(), band(0.0, 70.0));
    processor_bands.insert("S2".to_string(), band(0.0, 30.0));
    let source_bands = processor_bands.clone();
    let dest_bands = processor_bands.clone();

    let mut schema_capacities = BTreeMap::new();
    schema_capacities.insert("Source".to_string(), source_bands);
    schema_capacities.insert("Processor".to_string(), processor_bands);
    schema_capacities.insert("Destination".to_string(), dest_bands);

    let flows = BTreeMap::from([
        ("S1".to_string(), band(70.0, 0.0)),
        ("S2".to_string(), band(50.0, 0.0)),
    ]);
    let mut service_flows = BTreeMap::new();
    service_flows.insert("Source".to_string(), flows.clone());
    service_flows.insert("Processor".to_string(), flows.clone());
    service_flows.insert("Destination".to_string(), flows);

    PipelineConfig {
        schema_priorities,
        schema_capacities,
        service_flows,
        graph: linear_graph(&["Source", "Processor", "Destination"]),
        admission_points: vec!["Source".to_string()],
    }
}

/// Scenario D: Source -> Split -> {ProcA, ProcB} -> Merger, no back edge.
pub fn scenario_d_diamond_merge() -> PipelineConfig {
    let mut schema_priorities = BTreeMap::new();
    schema_priorities.insert("S1".to_string(), 1);

    let mut schema_capacities = BTreeMap::new();
    for name in ["Source", "Split", "ProcA", "ProcB"] {
        schema_capacities.insert(name.to_string(), BTreeMap::from([("S1".to_string(), band(0.0, 200.0))]));
    }
    schema_capacities.insert("Merger".to_string(), BTreeMap::from([("S1".to_string(), band(0.0, 70.0))]));

    let mut service_flows = BTreeMap::new();
    service_flows.insert("Source".to_string(), BTreeMap::from([("S1".to_string(), band(80.0, 0.0))]));
    service_flows.insert("Split".to_string(), BTreeMap::from([("S1".to_string(), band(80.0, 0.0))]));
    service_flows.insert("ProcA".to_string(), BTreeMap::from([("S1".to_string(), band(40.0, 0.0))]));
    service_flows.insert("ProcB".to_string(), BTreeMap::from([("S1".to_string(), band(40.0, 0.0))]));
    service_flows.insert("Merger".to_string(), BTreeMap::from([("S1".to_string(), band(80.0, 0.0))]));

    let mut graph = BTreeMap::new();
    graph.insert("Source".to_string(), vec!["Split".to_string()]);
    graph.insert("Split".to_string(), vec!["ProcA".to_string(), "ProcB".to_string()]);
    graph.insert("ProcA".to_string(), vec!["Merger".to_string()]);
    graph.insert("ProcB".to_string(), vec!["Merger".to_string()]);
    graph.insert("Merger".to_string(), vec![]);

    PipelineConfig {
        schema_priorities,
        schema_capacities,
        service_flows,
        graph,
        admission_points: vec!["Source".to_string()],
    }
}

/// Scenario E: Scenario D plus a Merger -> Split back edge, closing a cycle.
pub fn scenario_e_cycle_tolerance() -> PipelineConfig {
    let mut config = scenario_d_diamond_merge();
    config
        .graph
        .get_mut("Merger")
        .expect("scenario D defines Merger")
        .push("Split".to_string());
    config
}

/// Scenario F: a schema slot pinned at zero capacity with nonzero demand.
pub fn scenario_f_zero_capacity_pin() -> PipelineConfig {
    let mut schema_priorities = BTreeMap::new();
    schema_priorities.insert("S1".to_string(), 1);

    let mut schema_capacities = BTreeMap::new();
    schema_capacities.insert("Source".to_string(), BTreeMap::from([("S1".to_string(), band(0.0, 100.0))]));
    schema_capacities.insert("Processor".to_string(), BTreeMap::from([("S1".to_string(), band(0.0, 0.0))]));

    let mut service_flows = BTreeMap::new();
    service_flows.insert("Source".to_string(), BTreeMap::from([("S1".to_string(), band(50.0, 0.0))]));
    service_flows.insert("Processor".to_string(), BTreeMap::from([("S1".to_string(), band(50.0, 0.0))]));

    PipelineConfig {
        schema_priorities,
        schema_capacities,
        service_flows,
        graph: linear_graph(&["Source", "Processor"]),
        admission_points: vec!["Source".to_string()],
    }
}

/// Two independent sources funnel into a shared processor, which fans
/// out to two destinations; two schemas of differing priority run
/// through the whole topology at once, overloaded at the processor.
pub fn scenario_multi_source_multi_destination() -> PipelineConfig {
    let mut schema_priorities = BTreeMap::new();
    schema_priorities.insert("S1".to_string(), 2);
    schema_priorities.insert("S2".to_string(), 1);

    let mut schema_capacities = BTreeMap::new();
    schema_capacities.insert(
        "Source1".to_string(),
        BTreeMap::from([("S1".to_string(), band(0.0, 60.0)), ("S2".to_string(), band(0.0, 40.0))]),
    );
    schema_capacities.insert(
        "Source2".to_string(),
        BTreeMap::from([("S1".to_string(), band(0.0, 50.0)), ("S2".to_string(), band(0.0, 30.0))]),
    );
    schema_capacities.insert(
        "Processor".to_string(),
        BTreeMap::from([("S1".to_string(), band(0.0, 100.0)), ("S2".to_string(), band(0.0, 60.0))]),
    );
    schema_capacities.insert(
        "Dest1".to_string(),
        BTreeMap::from([("S1".to_string(), band(0.0, 50.0)), ("S2".to_string(), band(0.0, 30.0))]),
    );
    schema_capacities.insert(
        "Dest2".to_string(),
        BTreeMap::from([("S1".to_string(), band(0.0, 50.0)), ("S2".to_string(), band(0.0, 30.0))]),
    );

    let mut service_flows = BTreeMap::new();
    service_flows.insert(
        "Source1".to_string(),
        BTreeMap::from([("S1".to_string(), band(70.0, 0.0)), ("S2".to_string(), band(50.0, 0.0))]),
    );
    service_flows.insert(
        "Source2".to_string(),
        BTreeMap::from([("S1".to_string(), band(60.0, 0.0)), ("S2".to_string(), band(40.0, 0.0))]),
    );
    service_flows.insert(
        "Processor".to_string(),
        BTreeMap::from([("S1".to_string(), band(130.0, 0.0)), ("S2".to_string(), band(90.0, 0.0))]),
    );
    service_flows.insert(
        "Dest1".to_string(),
        BTreeMap::from([("S1".to_string(), band(65.0, 0.0)), ("S2".to_string(), band(45.0, 0.0))]),
    );
    service_flows.insert(
        "Dest2".to_string(),
        BTreeMap::from([("S1".to_string(), band(65.0, 0.0)), ("S2".to_string(), band(45.0, 0.0))]),
    );

    let mut graph = BTreeMap::new();
    graph.insert("Source1".to_string(), vec!["Processor".to_string()]);
    graph.insert("Source2".to_string(), vec!["Processor".to_string()]);
    graph.insert("Processor".to_string(), vec!["Dest1".to_string(), "Dest2".to_string()]);
    graph.insert("Dest1".to_string(), vec![]);
    graph.insert("Dest2".to_string(), vec![]);

    PipelineConfig {
        schema_priorities,
        schema_capacities,
        service_flows,
        graph,
        admission_points: vec!["Source1".to_string(), "Source2".to_string()],
    }
}

/// A randomized linear-chain pipeline for fuzz-style exercising of the
/// resolver, seeded for reproducibility.
pub fn random_scenario(seed: u64, n_services: usize, n_schemas: usize) -> PipelineConfig {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut schema_priorities = BTreeMap::new();
    let schema_names: Vec<String> = (1..=n_schemas).map(|i| format!("S{i}")).collect();
    for name in &schema_names {
        schema_priorities.insert(name.clone(), rng.gen_range(1..=5));
    }

    let service_names: Vec<String> = (1..=n_services).map(|i| format!("Svc{i}")).collect();
    let mut schema_capacities = BTreeMap::new();
    let mut service_flows = BTreeMap::new();
    for name in &service_names {
        let mut bands = BTreeMap::new();
        let mut flows = BTreeMap::new();
        for schema in &schema_names {
            let max = rng.gen_range(20.0..200.0);
            bands.insert(schema.clone(), band(0.0, max));
            let incoming = rng.gen_range(0.0..(max * 1.5));
            flows.insert(schema.clone(), band(incoming, 0.0));
        }
        schema_capacities.insert(name.clone(), bands);
        service_flows.insert(name.clone(), flows);
    }

    let names_ref: Vec<&str> = service_names.iter().map(String::as_str).collect();
    let graph = linear_graph(&names_ref);

    PipelineConfig {
        schema_priorities,
        schema_capacities,
        service_flows,
        graph,
        admission_points: vec![service_names[0].clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;

    #[test]
    fn scenario_a_builds_and_resolves() {
        let config = scenario_a_linear_overload();
        let mut pipeline = Pipeline::new(&config).unwrap();
        pipeline.resolve_overloads();
        assert!(pipeline.service("Source").unwrap().incoming_flow("S1") <= 80.0 + 1e-6);
        let dest = pipeline.service("Destination").unwrap();
        assert_eq!(dest.status, crate::service::ServiceStatus::Normal);
    }

    #[test]
    fn scenario_c_only_lower_priority_schema_is_reduced() {
        let config = scenario_c_priority_coexistence();
        let mut pipeline = Pipeline::new(&config).unwrap();
        pipeline.resolve_overloads();
        assert_eq!(pipeline.service("Source").unwrap().incoming_flow("S1"), 70.0);
        assert!(pipeline.service("Source").unwrap().incoming_flow("S2") < 50.0);
    }

    #[test]
    fn scenario_e_terminates_with_cycle_present() {
        let config = scenario_e_cycle_tolerance();
        let mut pipeline = Pipeline::new(&config).unwrap();
        let warnings = pipeline.resolve_overloads();
        assert!(warnings.iter().all(|w| !matches!(w, crate::error::Warning::NonConvergence { .. })));
    }

    #[test]
    fn scenario_f_pins_reduction_to_full() {
        let config = scenario_f_zero_capacity_pin();
        let mut pipeline = Pipeline::new(&config).unwrap();
        let warnings = pipeline.resolve_overloads();
        assert!(warnings.iter().any(|w| matches!(w, crate::error::Warning::ZeroCapacity { .. })));
        assert_eq!(pipeline.service("Source").unwrap().incoming_flow("S1"), 0.0);
    }

    #[test]
    fn multi_source_multi_destination_converges_and_relieves_processor() {
        let config = scenario_multi_source_multi_destination();
        let mut pipeline = Pipeline::new(&config).unwrap();
        let warnings = pipeline.resolve_overloads();
        assert!(warnings.iter().all(|w| !matches!(w, crate::error::Warning::NonConvergence { .. })));

        let processor = pipeline.service("Processor").unwrap();
        assert!(processor.incoming_flow("S1") <= 100.0 + 1e-6);
        assert!(processor.incoming_flow("S2") <= 60.0 + 1e-6);

        // Both sources feed the same overloaded processor; each should
        // have been cut back from its original demand.
        assert!(pipeline.service("Source1").unwrap().incoming_flow("S1") < 70.0);
        assert!(pipeline.service("Source2").unwrap().incoming_flow("S1") < 60.0);
    }

    #[test]
    fn random_scenario_is_reproducible() {
        let a = random_scenario(42, 4, 2);
        let b = random_scenario(42, 4, 2);
        assert_eq!(a.schema_priorities, b.schema_priorities);
        assert_eq!(a.service_flows, b.service_flows);
    }
}
