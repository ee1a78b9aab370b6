//! Explicit shape tags for symbols and values.
//!
//! Shapes are canonical: an `n×1` matrix is always a [`Shape::Vector`] and a
//! `1×1` matrix is always [`Shape::Scalar`]. Use [`Shape::from_dims`] (or the
//! `vector`/`matrix` helpers) rather than constructing variants by hand so two
//! values with equal dimensions always have equal shapes.
//!
//! ```
//! # use linkage_symbolics::Shape;
//! assert_eq!(Shape::matrix(3, 1), Shape::Vector { dim: 3 });
//! assert_eq!(Shape::matrix(1, 1), Shape::Scalar);
//! assert_eq!(Shape::matrix(2, 3).component_count(), 6);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geometric structure of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// Single component.
    Scalar,

    /// Column vector.
    Vector {
        /// Number of components.
        dim: usize,
    },

    /// Row-major matrix.
    Matrix {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },
}

impl Shape {
    /// Canonical shape for a `rows × cols` array.
    pub fn from_dims(rows: usize, cols: usize) -> Self {
        match (rows, cols) {
            (1, 1) => Shape::Scalar,
            (dim, 1) => Shape::Vector { dim },
            (rows, cols) => Shape::Matrix { rows, cols },
        }
    }

    /// Canonical column-vector shape.
    pub fn vector(dim: usize) -> Self {
        Self::from_dims(dim, 1)
    }

    /// Canonical matrix shape.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self::from_dims(rows, cols)
    }

    /// Number of rows (vectors are columns).
    pub fn rows(&self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Vector { dim } => *dim,
            Shape::Matrix { rows, .. } => *rows,
        }
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        match self {
            Shape::Scalar | Shape::Vector { .. } => 1,
            Shape::Matrix { cols, .. } => *cols,
        }
    }

    /// Total number of components.
    pub fn component_count(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Scalar)
    }

    /// True for scalars and column vectors.
    pub fn is_column(&self) -> bool {
        self.cols() == 1
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "Scalar"),
            Shape::Vector { dim } => write!(f, "Vector<{dim}>"),
            Shape::Matrix { rows, cols } => write!(f, "Matrix<{rows}x{cols}>"),
        }
    }
}
