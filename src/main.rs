mod render;

use clap::Parser;

use backflow::ui::{make_pipeline, print_scenario_catalog, BackflowArgs};

pub fn main() {
    env_logger::init();

    let args = BackflowArgs::parse();
    if args.list_scenarios {
        print_scenario_catalog();
        return;
    }

    let mut pipeline = make_pipeline(&args).expect("invalid pipeline configuration");
    let report = pipeline.run_cycle();

    for warning in &report.warnings {
        log::warn!("{warning}");
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report.post_snapshot).expect("snapshot always serializes");
        println!("{json}");
        return;
    }

    println!("\nPre-cycle snapshot:");
    render::print_service_overview(&report.pre_snapshot);
    render::print_overload_paths(&report.overload_paths);

    println!("\nPost-cycle snapshot:");
    render::print_service_overview(&report.post_snapshot);
    render::print_flow_detail(&report.post_snapshot);
}
