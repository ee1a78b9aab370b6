//! Loop closure errors.
//!
//! Every geometric error is fatal for the loop it names. A model with a
//! partially closed loop cannot produce sound equations of motion, so
//! callers abort generation on any of these.

use linkage_graph::GraphError;
use linkage_symbolics::SymbolicError;
use thiserror::Error;

/// Loop result type alias.
pub type Result<T> = std::result::Result<T, LoopError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoopError {
    /// A boundary frame sits on the chain root where the topology needs a
    /// body moved by at least one joint.
    #[error("loop {loop_name}: frame {frame} is fixed to the world, it must sit on a moving body")]
    DirectWorldConnection { loop_name: String, frame: String },

    /// The joints and frames do not have the structure the requested
    /// topology solves in closed form.
    #[error("loop {loop_name}: unsupported {topology} topology: {reason}")]
    UnsupportedTopology {
        loop_name: String,
        topology: &'static str,
        reason: String,
    },

    /// `Jv` is singular, or the closed form has no real solution, at the
    /// current configuration.
    #[error("loop {loop_name}: kinematic singularity (det Jv = {determinant:e}) at {}", format_configuration(configuration))]
    KinematicSingularity {
        loop_name: String,
        determinant: f64,
        /// Coordinate values that triggered the check, in loop order.
        configuration: Vec<(String, f64)>,
    },

    /// A joint chain was assembled inconsistently.
    #[error("invalid joint chain: {0}")]
    InvalidChain(String),

    #[error("invalid loop configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Symbolic(#[from] SymbolicError),
}

fn format_configuration(configuration: &[(String, f64)]) -> String {
    configuration
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
