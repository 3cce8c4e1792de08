//! Interactive stdin fallback when no config path or scenario is given.
//! Prompts per service and schema for capacity bands and flows, blank
//! input taking a default. Service and schema names themselves are
//! also read from stdin, and no name carries special meaning.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use crate::config::{PipelineConfig, RunConfig};

const DEFAULT_BAND: (f64, f64) = (10.0, 150.0);
const DEFAULT_FLOW: (f64, f64) = (150.0, 150.0);

fn prompt_line(prompt: &str) -> String {
    print!("{prompt}");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).unwrap_or(0);
    line.trim().to_string()
}

fn prompt_pair(prompt: &str, default: (f64, f64)) -> (f64, f64) {
    let line = prompt_line(prompt);
    if line.is_empty() {
        return default;
    }
    let mut parts = line.split(',').map(|s| s.trim().parse::<f64>());
    match (parts.next(), parts.next()) {
        (Some(Ok(a)), Some(Ok(b))) => (a, b),
        _ => {
            eprintln!("could not parse '{line}' as 'a,b', using default");
            default
        }
    }
}

fn prompt_names(prompt: &str) -> Vec<String> {
    prompt_line(prompt)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Prompts for schema names/priorities, then service names/admission
/// flags, then per service/schema capacity bands and flows.
pub fn prompt_for_config() -> (RunConfig, PipelineConfig) {
    println!("No config file or scenario given; entering interactive setup.");
    println!("Format for flows and capacities: min,max (blank uses a default).");

    let schema_names = prompt_names("Schema names (comma-separated), e.g. S1,S2: ");
    let mut schema_priorities = BTreeMap::new();
    for schema in &schema_names {
        let line = prompt_line(&format!("  priority for {schema} (blank = 1): "));
        let priority: u32 = line.parse().unwrap_or(1);
        schema_priorities.insert(schema.clone(), priority);
    }

    let service_names = prompt_names("Service names (comma-separated), e.g. Source,Processor: ");
    let admission_points = prompt_names("Admission-point service names (comma-separated, may be empty): ");

    let mut schema_capacities = BTreeMap::new();
    let mut service_flows = BTreeMap::new();
    for service in &service_names {
        println!("\nEnter capacities and flows for {service}:");
        let mut bands = BTreeMap::new();
        let mut flows = BTreeMap::new();
        for schema in &schema_names {
            let band = prompt_pair(&format!("  {schema} capacity (min,max): "), DEFAULT_BAND);
            let flow = prompt_pair(&format!("  {schema} flow (incoming,outgoing): "), DEFAULT_FLOW);
            bands.insert(schema.clone(), band);
            flows.insert(schema.clone(), flow);
        }
        schema_capacities.insert(service.clone(), bands);
        service_flows.insert(service.clone(), flows);
    }

    let mut graph = BTreeMap::new();
    for service in &service_names {
        let downstream = prompt_names(&format!("Downstream services for {service} (comma-separated, may be empty): "));
        graph.insert(service.clone(), downstream);
    }

    (
        RunConfig::default(),
        PipelineConfig {
            schema_priorities,
            schema_capacities,
            service_flows,
            graph,
            admission_points,
        },
    )
}
