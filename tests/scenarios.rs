//! End-to-end coverage of the six named scenarios against the public
//! `Pipeline` API.

use backflow::error::Warning;
use backflow::pipeline::Pipeline;
use backflow::scenarios::*;
use backflow::service::{ServiceAction, ServiceStatus};

#[test]
fn scenario_a_linear_overload_reduces_source_and_clears_destination() {
    let config = scenario_a_linear_overload();
    let mut pipeline = Pipeline::new(&config).unwrap();
    let warnings = pipeline.resolve_overloads();
    assert!(!warnings.iter().any(|w| matches!(w, Warning::NonConvergence { .. })));

    let source = pipeline.service("Source").unwrap();
    assert!(source.incoming_flow("S1") <= 80.0 + 1e-6);

    let destination = pipeline.service("Destination").unwrap();
    assert_eq!(destination.status, ServiceStatus::Normal);
    assert_eq!(destination.action, ServiceAction::NoAction);
}

#[test]
fn scenario_b_dual_path_funnel_bounds_destination_total() {
    let config = scenario_b_dual_path_funnel();
    let mut pipeline = Pipeline::new(&config).unwrap();
    pipeline.resolve_overloads();

    let dest = pipeline.service("Dest").unwrap();
    assert!(dest.incoming_flow("S1") <= 100.0 + 1e-6);

    assert!(pipeline.service("Source1").unwrap().incoming_flow("S1") < 60.0);
    assert!(pipeline.service("Source2").unwrap().incoming_flow("S1") < 70.0);
}

#[test]
fn scenario_c_priority_coexistence_protects_high_priority_schema() {
    let config = scenario_c_priority_coexistence();
    let mut pipeline = Pipeline::new(&config).unwrap();
    pipeline.resolve_overloads();

    let source = pipeline.service("Source").unwrap();
    assert_eq!(source.incoming_flow("S1"), 70.0);
    assert!(source.incoming_flow("S2") < 50.0);
}

#[test]
fn scenario_d_diamond_merge_propagates_through_both_branches() {
    let config = scenario_d_diamond_merge();
    let mut pipeline = Pipeline::new(&config).unwrap();
    pipeline.resolve_overloads();

    let merger = pipeline.service("Merger").unwrap();
    assert!(merger.incoming_flow("S1") <= 70.0 + 1e-6);

    // 12.5% cut reaches both branches and the shared upstream Split/Source,
    // and the max-seen-wins rule keeps Split/Source from being cut twice.
    assert!((pipeline.service("ProcA").unwrap().incoming_flow("S1") - 35.0).abs() < 1e-6);
    assert!((pipeline.service("ProcB").unwrap().incoming_flow("S1") - 35.0).abs() < 1e-6);
    assert!((pipeline.service("Split").unwrap().incoming_flow("S1") - 70.0).abs() < 1e-6);
    assert!((pipeline.service("Source").unwrap().incoming_flow("S1") - 70.0).abs() < 1e-6);
}

#[test]
fn scenario_e_cycle_tolerance_terminates() {
    let config = scenario_e_cycle_tolerance();
    let mut pipeline = Pipeline::new(&config).unwrap();

    let sccs = pipeline.graph().tarjan_scc();
    assert!(sccs.iter().any(|scc| scc.len() > 1));

    let warnings = pipeline.resolve_overloads();
    assert!(!warnings.iter().any(|w| matches!(w, Warning::NonConvergence { .. })));
}

#[test]
fn scenario_f_zero_capacity_pin_stays_overloaded() {
    let config = scenario_f_zero_capacity_pin();
    let mut pipeline = Pipeline::new(&config).unwrap();
    let warnings = pipeline.resolve_overloads();

    assert!(warnings.iter().any(|w| matches!(w, Warning::ZeroCapacity { .. })));
    let processor = pipeline.service("Processor").unwrap();
    assert_eq!(processor.status, ServiceStatus::Overloaded);
    assert_eq!(processor.allocated_capacity("S1"), 0.0);
    assert_eq!(pipeline.service("Source").unwrap().incoming_flow("S1"), 0.0);
}
