//! CLI surface: argument parsing and the config/scenario composition
//! that produces a ready-to-run `Pipeline`. A TOML config is parsed and
//! then CLI overrides are layered on top of it, with CLI always taking
//! precedence.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::warn;

use crate::config::{load_toml, PipelineConfig, RunConfig};
use crate::error::PipelineError;
use crate::pipeline::Pipeline;

#[derive(Parser)]
#[command(version, about = "Resolve a service graph's per-cycle overloads and backpressure")]
pub struct BackflowArgs {
    #[arg(help = "Path to a pipeline config.toml; omit for an interactive prompt")]
    pub config_path: Option<PathBuf>,
    #[arg(long, help = "Override the log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,
    #[arg(long, help = "Override the fixpoint iteration cap")]
    pub max_iterations: Option<usize>,
    #[arg(long, help = "Run a named built-in scenario instead of a config file")]
    pub scenario: Option<String>,
    #[arg(long, help = "Emit the final snapshot as JSON instead of tables")]
    pub json: bool,
    #[arg(long, help = "List the named built-in scenarios and exit")]
    pub list_scenarios: bool,
}

/// `(name, aliases, description)` for every built-in scenario, in the
/// order `--list-scenarios` prints them.
pub const SCENARIO_CATALOG: &[(&str, &str, &str)] = &[
    ("a", "linear-overload", "Source -> Processor -> Destination, single-hop overload"),
    ("b", "dual-path-funnel", "two independent chains funnel into an undersized destination"),
    ("c", "priority-coexistence", "one chain, two schemas of differing priority, only the lower one is cut"),
    ("d", "diamond-merge", "Source -> Split -> {ProcA, ProcB} -> Merger, no back edge"),
    ("e", "cycle-tolerance", "diamond-merge plus a Merger -> Split back edge"),
    ("f", "zero-capacity-pin", "a schema slot pinned at zero capacity with nonzero demand"),
    ("m", "multi-source-multi-destination", "two sources and two destinations sharing one processor"),
];

pub fn read_toml(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("cannot read config file {}: {err}", path.display()))
}

/// Resolves a named built-in scenario, for `--scenario`.
pub fn named_scenario(name: &str) -> Option<PipelineConfig> {
    use crate::scenarios::*;
    match name {
        "a" | "linear-overload" => Some(scenario_a_linear_overload()),
        "b" | "dual-path-funnel" => Some(scenario_b_dual_path_funnel()),
        "c" | "priority-coexistence" => Some(scenario_c_priority_coexistence()),
        "d" | "diamond-merge" => Some(scenario_d_diamond_merge()),
        "e" | "cycle-tolerance" => Some(scenario_e_cycle_tolerance()),
        "f" | "zero-capacity-pin" => Some(scenario_f_zero_capacity_pin()),
        "m" | "multi-source-multi-destination" => Some(scenario_multi_source_multi_destination()),
        _ => None,
    }
}

/// Prints every entry in `SCENARIO_CATALOG`, for `--list-scenarios`.
pub fn print_scenario_catalog() {
    println!("Named scenarios (pass either form to --scenario):");
    for (short, long, description) in SCENARIO_CATALOG {
        println!("  {short:<3} {long:<32} {description}");
    }
}

/// Builds a `Pipeline` from parsed CLI args, applying TOML config or a
/// named scenario and then layering CLI overrides on top (CLI always
/// wins).
pub fn make_pipeline(args: &BackflowArgs) -> Result<Pipeline, PipelineError> {
    let (run_config, pipeline_config) = if let Some(name) = &args.scenario {
        let config = named_scenario(name).unwrap_or_else(|| {
            warn!("unknown scenario '{name}', falling back to scenario A");
            crate::scenarios::scenario_a_linear_overload()
        });
        (RunConfig::default(), config)
    } else if let Some(path) = &args.config_path {
        let toml_string = read_toml(path);
        load_toml(&toml_string).expect("invalid pipeline config")
    } else {
        crate::interactive::prompt_for_config()
    };

    let mut pipeline = Pipeline::new(&pipeline_config)?;

    let max_iterations = args
        .max_iterations
        .or(run_config.max_iterations_override)
        .unwrap_or_else(|| pipeline.max_iterations());
    pipeline.set_max_iterations(max_iterations);

    Ok(pipeline)
}
