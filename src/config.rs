//! Input configuration records plus the run-level knobs for a
//! single invocation. A top-level TOML document is split into named
//! tables, each independently deserialized with a default fallback.
//!
//! All maps here are `BTreeMap`, not `HashMap`: service/schema iteration
//! order feeds directly into the allocator's proportional passes and
//! the graph's insertion-order fallback, and a `BTreeMap` gives a
//! reproducible (alphabetical) order for free, without pulling in an
//! order-preserving map crate.

use std::collections::BTreeMap;

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&toml::Value>) -> Self {
        match section {
            Some(value) => value
                .clone()
                .try_into()
                .expect("cannot deserialize config section"),
            None => {
                warn!("config section not found, using defaults");
                Self::default()
            }
        }
    }
}

/// A (min, max) capacity band, or a (incoming, outgoing) flow pair —
/// both are TOML arrays of two numbers in the configuration file.
pub type Pair = (f64, f64);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// schema name -> positive priority.
    pub schema_priorities: BTreeMap<String, u32>,
    /// service name -> schema name -> (min_capacity, max_capacity).
    pub schema_capacities: BTreeMap<String, BTreeMap<String, Pair>>,
    /// service name -> schema name -> (incoming, outgoing).
    pub service_flows: BTreeMap<String, BTreeMap<String, Pair>>,
    /// service name -> ordered list of downstream service names.
    pub graph: BTreeMap<String, Vec<String>>,
    /// service names that are admission points.
    pub admission_points: Vec<String>,
}

impl Config for PipelineConfig {}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    pub log_level: String,
    /// Overrides `2 * |services|` when set.
    pub max_iterations_override: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            max_iterations_override: None,
        }
    }
}

impl Config for RunConfig {}

/// Parses the top-level TOML document and splits it into the `[sim]`
/// and `[pipeline]` sections, each independently defaulted.
pub fn load_toml(toml_string: &str) -> anyhow::Result<(RunConfig, PipelineConfig)> {
    let table: toml::Table = toml::from_str(toml_string)?;
    let run = RunConfig::from_section(table.get("sim"));
    let pipeline = PipelineConfig::from_section(table.get("pipeline"));
    Ok((run, pipeline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_sections_with_defaults() {
        let toml_str = r#"
            [sim]
            log_level = "debug"

            [pipeline]
            [pipeline.schema_priorities]
            S1 = 1

            [pipeline.schema_capacities.Source]
            S1 = [0.0, 100.0]

            [pipeline.service_flows.Source]
            S1 = [50.0, 50.0]

            [pipeline.graph]
            Source = []
        "#;
        let (run, pipeline) = load_toml(toml_str).unwrap();
        assert_eq!(run.log_level, "debug");
        assert_eq!(pipeline.schema_priorities["S1"], 1);
        assert_eq!(pipeline.schema_capacities["Source"]["S1"], (0.0, 100.0));
    }

    #[test]
    fn missing_sections_fall_back_to_default() {
        let (run, pipeline) = load_toml("").unwrap();
        assert_eq!(run.log_level, "warn");
        assert!(pipeline.service_flows.is_empty());
    }
}
