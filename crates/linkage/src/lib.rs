//! Multibody equation generation.
//!
//! A [`Model`] collects everything a multibody description publishes:
//! parameters, generalized coordinates, named expressions for kinematics,
//! sensors and loads, and closed kinematic loops. [`Model::generate`] then
//! hands a code generator the ordered, dependency-closed list of equations
//! for the categories it asks for.
//!
//! ```text
//! register_expression ─┐
//! register_loop ───────┼─► EquationGraph ─► build ─► generate(categories)
//! reduce_dynamics ─────┘                            │
//!                                                   └─► EquationList
//! ```
//!
//! Loops are closed in closed form by `linkage-loops`; their dependent
//! coordinates enter the graph as ordinary expressions of the independent
//! ones, so the reduced equations of motion are an ODE in the independent
//! coordinates alone.

pub mod config;
pub mod error;
pub mod model;


pub use config::ModelConfig;
pub use error::{Error, Result};
pub use model::{Model, ReducedDynamics};

pub use linkage_graph::{Category, CategorySet, EquationList, Expression, ExternalInput, GraphConfig};
pub use linkage_loops::{
    BoundaryFrame, ChainJoint, Coordinate, JointId, LoopArtifacts, LoopConfig, LoopSpec,
    LoopTopology, Posture, point,
};
pub use linkage_symbolics::{Axis, Expr, Shape, Symbol, Value};
