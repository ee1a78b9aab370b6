//! Equation graph errors.
//!
//! # Error Categories
//!
//! - **Registration errors**: [`GraphError::DuplicateSymbol`],
//!   [`GraphError::ShapeMismatch`], [`GraphError::EmptyCategory`]
//! - **Build errors**: [`GraphError::UnboundSymbol`], [`GraphError::CyclicDependency`]
//! - **Query errors**: [`GraphError::NoMatchingCategory`], [`GraphError::UnknownSymbol`],
//!   [`GraphError::NotAnInput`], [`GraphError::NotBuilt`]
//!
//! Every variant names the symbols or expressions involved. Simplification
//! failures are not errors at this level: they are logged and the original
//! value is kept.

use linkage_symbolics::{Shape, SymbolicError};
use thiserror::Error;

use crate::category::CategorySet;

/// Graph result type alias.
pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// A symbol was defined twice with different content, or an input was
    /// also given a defining expression.
    #[error("symbol {symbol} is already defined ({existing}); cannot redefine as {requested}")]
    DuplicateSymbol {
        symbol: String,
        existing: String,
        requested: String,
    },

    /// An expression reads a symbol that is neither defined nor a declared input.
    #[error("expression {expression} references unbound symbol {symbol}")]
    UnboundSymbol { symbol: String, expression: String },

    /// The dependency relation contains a cycle; `symbols` lists one cycle in
    /// dependency order.
    #[error("cyclic dependency: {}", symbols.join(" -> "))]
    CyclicDependency { symbols: Vec<String> },

    /// No live expression belongs to any requested category.
    #[error("no expression matches categories {categories}")]
    NoMatchingCategory { categories: CategorySet },

    /// An expression must carry at least one category.
    #[error("expression {expression} has no category")]
    EmptyCategory { expression: String },

    /// Value shape differs from the shape of the symbol it defines.
    #[error("shape mismatch for {symbol}: expected {expected}, found {found}")]
    ShapeMismatch {
        symbol: String,
        expected: Shape,
        found: Shape,
    },

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Only declared inputs can have their value changed.
    #[error("{0} is not a declared input")]
    NotAnInput(String),

    /// The operation needs a built graph.
    #[error("graph has not been built")]
    NotBuilt,

    #[error("invalid graph configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Symbolic(#[from] SymbolicError),
}
