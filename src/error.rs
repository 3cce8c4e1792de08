//! Error taxonomy for the pipeline solver.
//!
//! `PipelineError` covers fatal configuration problems (`ConfigInvalid`
//! and friends), raised at construction time and surfaced directly to
//! the caller. `Warning` covers non-fatal conditions (`ZeroCapacity`,
//! `NonConvergence`) that don't stop resolution — they're collected on
//! the per-cycle report and also pushed through the `log::warn!`
//! channel.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("schema '{schema}' used by service '{service}' has no capacity entry")]
    MissingCapacity { service: String, schema: String },

    #[error("schema '{schema}' used by service '{service}' has no declared priority")]
    MissingPriority { service: String, schema: String },

    #[error("graph references unknown downstream service '{target}' from '{source}'")]
    UnknownDownstream { source: String, target: String },

    #[error("service '{service}' schema '{schema}': negative rate or capacity ({detail})")]
    NegativeValue {
        service: String,
        schema: String,
        detail: String,
    },

    #[error("service '{service}' schema '{schema}': capacity band min ({min}) > max ({max})")]
    InvalidCapacityBand {
        service: String,
        schema: String,
        min: f64,
        max: f64,
    },

    #[error("cycle input references unknown service '{name}'")]
    UnknownService { name: String },

    #[error("cycle input references schema '{schema}' not supported by service '{service}'")]
    UnknownSchemaForService { service: String, schema: String },
}

/// Non-fatal conditions reported out-of-band alongside a cycle's snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A schema slot has zero current capacity but nonzero incoming flow;
    /// the resolver pins it to a 100% reduction and leaves it overloaded.
    ZeroCapacity { service: String, schema: String },
    /// The resolver or the flow propagator hit its iteration cap with
    /// work still pending; the last computed state was still emitted.
    NonConvergence { phase: &'static str, iterations: usize },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::ZeroCapacity { service, schema } => write!(
                f,
                "service '{service}' schema '{schema}' has zero capacity with nonzero incoming flow"
            ),
            Warning::NonConvergence { phase, iterations } => write!(
                f,
                "{phase} hit its iteration cap ({iterations}) with work still pending"
            ),
        }
    }
}
