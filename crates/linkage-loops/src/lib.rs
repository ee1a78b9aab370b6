//! Kinematic loop closure.
//!
//! A closed loop makes some joint coordinates depend on others. For each loop
//! this crate derives, in closed form, the dependent coordinates `v(u)`, the
//! velocity map `Bvu = -Jv⁻¹·Ju` (so `v̇ = Bvu·u̇`) and the acceleration
//! correction `b′ = -Jv⁻¹·(J̇·q̇)` (so `v̈ = Bvu·ü + b′`), and registers all
//! of them as explicit expressions in an [`linkage_graph::EquationGraph`].
//! Nothing implicit ever reaches the graph.
//!
//! ```text
//! JointChain + LoopSpec ─► LoopDescriptor::calc ─► v(u), Bvu, b′ nodes
//!                              │
//!                              └─ LoopTopology::solve (closed form per topology)
//! ```

pub mod chain;
pub mod config;
pub mod descriptor;
pub mod error;
mod planar;
pub mod topology;


pub use chain::{BoundaryFrame, ChainJoint, Coordinate, JointChain, JointId, JointKind, point};
pub use config::LoopConfig;
pub use descriptor::{LoopArtifacts, LoopDescriptor, LoopSpec, LoopState};
pub use error::{LoopError, Result};
pub use topology::{LoopTopology, Posture};
