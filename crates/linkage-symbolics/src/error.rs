//! Errors raised by symbolic operations.
//!
//! All matrix-level operations check shapes up front; a mismatch is reported
//! with both operand shapes and the operation name instead of producing a
//! silently truncated result.

use thiserror::Error;

use crate::shape::Shape;

/// Result alias for symbolic operations.
pub type Result<T> = std::result::Result<T, SymbolicError>;

/// Errors produced by the symbolic layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SymbolicError {
    /// Operand shapes are incompatible for the requested operation.
    #[error("shape mismatch in {operation}: {left} vs {right}")]
    ShapeMismatch {
        /// Operation that rejected the operands.
        operation: &'static str,
        /// Shape of the left operand.
        left: Shape,
        /// Shape of the right operand.
        right: Shape,
    },

    /// An element index lies outside the value's shape.
    #[error("index ({row}, {col}) out of bounds for {shape}")]
    IndexOutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
        /// Shape that was indexed.
        shape: Shape,
    },

    /// A scalar was required.
    #[error("{name} is not a scalar (shape {shape})")]
    NotScalar {
        /// Symbol or operation that needed a scalar.
        name: String,
        /// Shape actually found.
        shape: Shape,
    },

    /// Element list length does not match the declared dimensions.
    #[error("expected {expected} elements, found {found}")]
    ElementCount {
        /// Elements required by the shape.
        expected: usize,
        /// Elements supplied.
        found: usize,
    },

    /// The matrix determinant is identically zero.
    #[error("matrix is structurally singular")]
    Singular,

    /// The operation does not support operands of this size.
    #[error("{operation} does not support dimension {dim}")]
    DimensionTooLarge {
        /// Operation name.
        operation: &'static str,
        /// Offending dimension.
        dim: usize,
    },
}
