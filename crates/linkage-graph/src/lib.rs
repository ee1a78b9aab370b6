//! Equation graph for symbolic model generation.
//!
//! The graph owns every symbolic equation a model defines: one node per
//! defined symbol, edges from each node to the symbols its value reads.
//! Once everything is registered, [`EquationGraph::build_graph`] checks that
//! all references are bound, optimises the node values, and computes a
//! deterministic topological order. Callers then either prune the graph to a
//! set of categories ([`EquationGraph::reduce_graph`]) or extract the ordered
//! closure of equations a code generator needs
//! ([`EquationGraph::get_equations`]).
//!
//! A [`ValueStore`] sits beside the graph and answers "what is the current
//! value of this symbol", caching per node and invalidating only what a
//! changed input actually reaches.

pub mod category;
pub mod config;
pub mod error;
pub mod expression;
pub mod graph;
pub mod store;

pub use category::{Category, CategorySet};
pub use config::GraphConfig;
pub use error::{GraphError, Result};
pub use expression::{EquationList, Expression, ExternalInput};
pub use graph::{BuildStats, EquationGraph, ReductionStats};
pub use store::ValueStore;
