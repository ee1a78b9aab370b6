//! Symbolic algebra for equation generation.
//!
//! This crate is the algebra collaborator used by the equation graph and the
//! loop-closure solver. It provides:
//!
//! - [`Symbol`]: identity-compared named unknowns with an explicit [`Shape`]
//! - [`Expr`]: immutable, structurally hashed scalar expression trees whose
//!   constructors keep every result in canonical form
//! - [`Value`]: a shape-tagged tensor of expressions with the matrix algebra
//!   the multibody layer needs (products, Jacobians, adjugate inverses)
//! - [`Simplifier`]: the injectable simplification capability
//!
//! Nothing here performs I/O or global mutation beyond the symbol id counter.

pub mod diff;
pub mod error;
pub mod eval;
pub mod expr;
mod hash;
pub mod rotation;
pub mod shape;
pub mod simplify;
pub mod symbol;
pub mod value;

pub use error::{Result, SymbolicError};
pub use expr::{Expr, ExprKind, Func, Relation};
pub use rotation::Axis;
pub use shape::Shape;
pub use simplify::{BasicSimplifier, NoopSimplifier, SimplifyError, Simplifier};
pub use symbol::{Atom, Domain, Symbol};
pub use value::Value;
