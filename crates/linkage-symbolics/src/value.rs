//! Shape-tagged tensors of expressions.
//!
//! A [`Value`] is what an equation defines: a scalar, a column vector, or a
//! row-major matrix of [`Expr`] elements. Every binary operation checks shapes
//! and returns [`SymbolicError::ShapeMismatch`] instead of broadcasting.

use std::collections::HashMap;
use std::ops::Range;

use indexmap::IndexSet;
use serde::Serialize;

use crate::error::{Result, SymbolicError};
use crate::expr::Expr;
use crate::shape::Shape;
use crate::symbol::{Atom, Symbol};

/// Largest square dimension supported by determinant and inverse.
const MAX_SQUARE_DIM: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Value {
    shape: Shape,
    elements: Vec<Expr>,
}

impl Value {
    pub(crate) fn from_parts(shape: Shape, elements: Vec<Expr>) -> Self {
        debug_assert_eq!(shape.component_count(), elements.len());
        Self { shape, elements }
    }

    pub fn scalar(expr: impl Into<Expr>) -> Self {
        Self::from_parts(Shape::Scalar, vec![expr.into()])
    }

    /// Column vector; a single element yields a scalar.
    pub fn vector(elements: Vec<Expr>) -> Self {
        Self::from_parts(Shape::vector(elements.len()), elements)
    }

    pub fn matrix(rows: usize, cols: usize, elements: Vec<Expr>) -> Result<Self> {
        if elements.len() != rows * cols {
            return Err(SymbolicError::ElementCount {
                expected: rows * cols,
                found: elements.len(),
            });
        }
        Ok(Self::from_parts(Shape::matrix(rows, cols), elements))
    }

    pub fn from_rows(rows: Vec<Vec<Expr>>) -> Result<Self> {
        let n = rows.len();
        let cols = rows.first().map_or(0, Vec::len);
        let mut elements = Vec::with_capacity(n * cols);
        for row in rows {
            if row.len() != cols {
                return Err(SymbolicError::ElementCount {
                    expected: cols,
                    found: row.len(),
                });
            }
            elements.extend(row);
        }
        Self::matrix(n, cols, elements)
    }

    /// Numeric value of the given shape.
    pub fn from_numbers(shape: Shape, numbers: &[f64]) -> Result<Self> {
        Self::matrix(
            shape.rows(),
            shape.cols(),
            numbers.iter().copied().map(Expr::number).collect(),
        )
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::from_parts(Shape::matrix(rows, cols), vec![Expr::zero(); rows * cols])
    }

    pub fn identity(n: usize) -> Self {
        let elements = (0..n * n)
            .map(|i| if i / n == i % n { Expr::one() } else { Expr::zero() })
            .collect();
        Self::from_parts(Shape::matrix(n, n), elements)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape.rows()
    }

    pub fn cols(&self) -> usize {
        self.shape.cols()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Expr] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Expr> {
        self.elements
    }

    pub fn get(&self, row: usize, col: usize) -> Result<&Expr> {
        if row >= self.rows() || col >= self.cols() {
            return Err(SymbolicError::IndexOutOfBounds {
                row,
                col,
                shape: self.shape,
            });
        }
        Ok(&self.elements[row * self.cols() + col])
    }

    /// Element in row-major order.
    pub fn element(&self, index: usize) -> Result<&Expr> {
        let cols = self.cols().max(1);
        self.get(index / cols, index % cols)
    }

    pub fn as_scalar(&self) -> Result<&Expr> {
        if !self.shape.is_scalar() {
            return Err(SymbolicError::NotScalar {
                name: "value".to_string(),
                shape: self.shape,
            });
        }
        Ok(&self.elements[0])
    }

    pub fn map(&self, f: impl FnMut(&Expr) -> Expr) -> Value {
        Self::from_parts(self.shape, self.elements.iter().map(f).collect())
    }

    /// Apply a fallible transformation element-wise.
    pub fn try_map<E>(&self, f: impl FnMut(&Expr) -> std::result::Result<Expr, E>) -> std::result::Result<Value, E> {
        let elements = self.elements.iter().map(f).collect::<std::result::Result<Vec<_>, E>>()?;
        Ok(Self::from_parts(self.shape, elements))
    }

    pub fn transpose(&self) -> Value {
        let (rows, cols) = (self.rows(), self.cols());
        let elements = (0..cols)
            .flat_map(|c| (0..rows).map(move |r| (r, c)))
            .map(|(r, c)| self.elements[r * cols + c].clone())
            .collect();
        Self::from_parts(Shape::matrix(cols, rows), elements)
    }

    fn zip_with(
        &self,
        other: &Value,
        operation: &'static str,
        f: impl Fn(&Expr, &Expr) -> Expr,
    ) -> Result<Value> {
        if self.shape != other.shape {
            return Err(SymbolicError::ShapeMismatch {
                operation,
                left: self.shape,
                right: other.shape,
            });
        }
        let elements = self
            .elements
            .iter()
            .zip(&other.elements)
            .map(|(a, b)| f(a, b))
            .collect();
        Ok(Self::from_parts(self.shape, elements))
    }

    pub fn try_add(&self, other: &Value) -> Result<Value> {
        self.zip_with(other, "add", |a, b| a + b)
    }

    pub fn try_sub(&self, other: &Value) -> Result<Value> {
        self.zip_with(other, "sub", |a, b| a - b)
    }

    pub fn scale(&self, factor: &Expr) -> Value {
        self.map(|e| e * factor)
    }

    pub fn negate(&self) -> Value {
        self.map(|e| -e)
    }

    /// Matrix product; a scalar operand scales the other one.
    pub fn matmul(&self, other: &Value) -> Result<Value> {
        if self.shape.is_scalar() {
            return Ok(other.scale(&self.elements[0]));
        }
        if other.shape.is_scalar() {
            return Ok(self.scale(&other.elements[0]));
        }
        if self.cols() != other.rows() {
            return Err(SymbolicError::ShapeMismatch {
                operation: "matmul",
                left: self.shape,
                right: other.shape,
            });
        }
        let (n, inner, m) = (self.rows(), self.cols(), other.cols());
        let mut elements = Vec::with_capacity(n * m);
        for i in 0..n {
            for j in 0..m {
                elements.push(Expr::add_all((0..inner).map(|k| {
                    &self.elements[i * inner + k] * &other.elements[k * m + j]
                })));
            }
        }
        Ok(Self::from_parts(Shape::matrix(n, m), elements))
    }

    pub fn dot(&self, other: &Value) -> Result<Expr> {
        if !self.shape.is_column() || self.shape != other.shape {
            return Err(SymbolicError::ShapeMismatch {
                operation: "dot",
                left: self.shape,
                right: other.shape,
            });
        }
        Ok(Expr::add_all(
            self.elements.iter().zip(&other.elements).map(|(a, b)| a * b),
        ))
    }

    /// Euclidean norm of a vector.
    pub fn norm(&self) -> Result<Expr> {
        Ok(self.dot(self)?.sqrt())
    }

    pub fn cross(&self, other: &Value) -> Result<Value> {
        if self.shape != Shape::vector(3) || other.shape != Shape::vector(3) {
            return Err(SymbolicError::ShapeMismatch {
                operation: "cross",
                left: self.shape,
                right: other.shape,
            });
        }
        let (a, b) = (&self.elements, &other.elements);
        Ok(Value::vector(vec![
            &a[1] * &b[2] - &a[2] * &b[1],
            &a[2] * &b[0] - &a[0] * &b[2],
            &a[0] * &b[1] - &a[1] * &b[0],
        ]))
    }

    /// Stack values vertically; all parts must have the same column count.
    pub fn vstack(parts: &[Value]) -> Result<Value> {
        let Some(first) = parts.first() else {
            return Ok(Value::zeros(0, 1));
        };
        let cols = first.cols();
        let mut rows = 0;
        let mut elements = Vec::new();
        for part in parts {
            if part.cols() != cols {
                return Err(SymbolicError::ShapeMismatch {
                    operation: "vstack",
                    left: first.shape,
                    right: part.shape,
                });
            }
            rows += part.rows();
            elements.extend(part.elements.iter().cloned());
        }
        Ok(Self::from_parts(Shape::matrix(rows, cols), elements))
    }

    /// Elements of a column value picked by index, as a vector.
    pub fn select(&self, indices: &[usize]) -> Result<Value> {
        let elements = indices
            .iter()
            .map(|&i| self.element(i).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::vector(elements))
    }

    /// Sub-matrix made of the given column range.
    pub fn columns(&self, range: Range<usize>) -> Result<Value> {
        if range.end > self.cols() || range.start > range.end {
            return Err(SymbolicError::IndexOutOfBounds {
                row: 0,
                col: range.end,
                shape: self.shape,
            });
        }
        let width = range.end - range.start;
        let mut elements = Vec::with_capacity(self.rows() * width);
        for r in 0..self.rows() {
            for c in range.clone() {
                elements.push(self.elements[r * self.cols() + c].clone());
            }
        }
        Ok(Self::from_parts(Shape::matrix(self.rows(), width), elements))
    }

    /// Jacobian `∂self/∂vars` of a scalar or column vector.
    pub fn jacobian(&self, vars: &[Atom]) -> Result<Value> {
        if !self.shape.is_column() {
            return Err(SymbolicError::ShapeMismatch {
                operation: "jacobian",
                left: self.shape,
                right: Shape::vector(vars.len()),
            });
        }
        let mut elements = Vec::with_capacity(self.len() * vars.len());
        for expr in &self.elements {
            for var in vars {
                elements.push(expr.diff(var));
            }
        }
        Ok(Self::from_parts(Shape::matrix(self.len(), vars.len()), elements))
    }

    /// Determinant by cofactor expansion with memoised minors.
    pub fn determinant(&self) -> Result<Expr> {
        let n = self.square_dim("determinant")?;
        let full = full_mask(n);
        Ok(self.minor(full, full, &mut HashMap::new()))
    }

    /// Inverse via adjugate over determinant.
    pub fn inverse(&self) -> Result<Value> {
        let n = self.square_dim("inverse")?;
        let full = full_mask(n);
        let mut memo = HashMap::new();
        let det = self.minor(full, full, &mut memo);
        if det.is_zero() {
            return Err(SymbolicError::Singular);
        }
        let inv_det = det.recip();
        let mut elements = vec![Expr::zero(); n * n];
        for i in 0..n {
            for j in 0..n {
                let cofactor = self.minor(full & !(1 << i), full & !(1 << j), &mut memo);
                let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
                elements[j * n + i] = Expr::mul_all([Expr::number(sign), cofactor, inv_det.clone()]);
            }
        }
        Ok(Self::from_parts(Shape::matrix(n, n), elements))
    }

    fn square_dim(&self, operation: &'static str) -> Result<usize> {
        if self.rows() != self.cols() {
            return Err(SymbolicError::ShapeMismatch {
                operation,
                left: self.shape,
                right: self.shape,
            });
        }
        if self.rows() > MAX_SQUARE_DIM {
            return Err(SymbolicError::DimensionTooLarge {
                operation,
                dim: self.rows(),
            });
        }
        Ok(self.rows())
    }

    /// Determinant of the sub-matrix selected by two equal-size bit masks,
    /// expanded along its first row.
    fn minor(&self, row_mask: u64, col_mask: u64, memo: &mut HashMap<(u64, u64), Expr>) -> Expr {
        if row_mask == 0 {
            return Expr::one();
        }
        if let Some(hit) = memo.get(&(row_mask, col_mask)) {
            return hit.clone();
        }
        let row = row_mask.trailing_zeros() as usize;
        let rest = row_mask & !(1 << row);
        let cols = self.cols();
        let mut terms = Vec::new();
        let mut sign = 1.0;
        for col in 0..cols {
            if col_mask & (1 << col) == 0 {
                continue;
            }
            let entry = &self.elements[row * cols + col];
            if !entry.is_zero() {
                let sub = self.minor(rest, col_mask & !(1 << col), memo);
                terms.push(Expr::mul_all([Expr::number(sign), entry.clone(), sub]));
            }
            sign = -sign;
        }
        let det = Expr::add_all(terms);
        memo.insert((row_mask, col_mask), det.clone());
        det
    }

    pub fn substitute<F>(&self, lookup: &F) -> Value
    where
        F: Fn(&Atom) -> Option<Expr>,
    {
        self.map(|e| e.substitute(lookup))
    }

    pub fn evaluate<F>(&self, lookup: &F) -> Option<Vec<f64>>
    where
        F: Fn(&Atom) -> Option<f64>,
    {
        self.elements.iter().map(|e| e.evaluate(lookup)).collect()
    }

    /// Element values if every element is a number.
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        self.elements.iter().map(Expr::as_number).collect()
    }

    pub fn atoms(&self) -> IndexSet<Atom> {
        let mut atoms = IndexSet::new();
        for e in &self.elements {
            atoms.extend(e.atoms());
        }
        atoms
    }

    pub fn free_symbols(&self) -> IndexSet<Symbol> {
        self.atoms().into_iter().map(|a| a.symbol().clone()).collect()
    }

    pub fn operation_count(&self) -> usize {
        self.elements.iter().map(Expr::operation_count).sum()
    }

    /// The symbol this value merely re-exposes, element for element.
    pub fn alias_target(&self) -> Option<Symbol> {
        let first = self.elements.first()?.as_atom()?.symbol().clone();
        if first.shape() != self.shape {
            return None;
        }
        let aliased = first.value();
        (aliased.elements == self.elements).then_some(first)
    }
}

fn full_mask(n: usize) -> u64 {
    (1u64 << n) - 1
}

impl From<Expr> for Value {
    fn from(expr: Expr) -> Self {
        Value::scalar(expr)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::scalar(Expr::number(number))
    }
}

impl From<&Symbol> for Value {
    fn from(symbol: &Symbol) -> Self {
        symbol.value()
    }
}
