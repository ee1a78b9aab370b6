//! Model errors

use linkage_graph::GraphError;
use linkage_loops::{JointId, LoopError};
use linkage_symbolics::SymbolicError;
use thiserror::Error;

/// Model result type
pub type Result<T> = std::result::Result<T, Error>;

/// Model errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("coordinate {0} is already defined")]
    DuplicateCoordinate(String),

    #[error("unknown coordinate {0}")]
    UnknownCoordinate(String),

    #[error("unknown joint {0}")]
    UnknownJoint(JointId),

    #[error("loop {0} is already registered")]
    DuplicateLoop(String),

    #[error("coordinate {coordinate}: {reason}")]
    CoordinateConflict { coordinate: String, reason: String },

    #[error("equations of motion: {0}")]
    Dynamics(String),

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Loop(#[from] LoopError),

    #[error(transparent)]
    Symbolic(#[from] SymbolicError),
}
