//! Named unknowns and the atoms that reference them.
//!
//! A [`Symbol`] is compared by identity: two symbols created with the same
//! name are still distinct. Each symbol carries a fixed [`Shape`]; elements of
//! vector and matrix symbols are referenced inside expressions through
//! [`Atom::Entry`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Result, SymbolicError};
use crate::expr::Expr;
use crate::hash::NodeHash;
use crate::shape::Shape;
use crate::value::Value;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// Value domain assumed for a symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    #[default]
    Real,
    NonNegative,
    Positive,
}

#[derive(Debug)]
struct SymbolInfo {
    id: u64,
    name: String,
    shape: Shape,
    domain: Domain,
}

/// A named, shape-tagged unknown.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolInfo>);

impl Symbol {
    /// Create a fresh real-valued symbol.
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self::with_domain(name, shape, Domain::Real)
    }

    /// Create a fresh symbol with an explicit domain.
    pub fn with_domain(name: impl Into<String>, shape: Shape, domain: Domain) -> Self {
        let id = NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed);
        Symbol(Arc::new(SymbolInfo {
            id,
            name: name.into(),
            shape,
            domain,
        }))
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, Shape::Scalar)
    }

    pub fn vector(name: impl Into<String>, dim: usize) -> Self {
        Self::new(name, Shape::vector(dim))
    }

    pub fn matrix(name: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self::new(name, Shape::matrix(rows, cols))
    }

    /// Process-unique identity.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn shape(&self) -> Shape {
        self.0.shape
    }

    pub fn domain(&self) -> Domain {
        self.0.domain
    }

    /// Reference a scalar symbol inside an expression.
    pub fn expr(&self) -> Result<Expr> {
        if !self.shape().is_scalar() {
            return Err(SymbolicError::NotScalar {
                name: self.name().to_string(),
                shape: self.shape(),
            });
        }
        Ok(Expr::atom(Atom::Symbol(self.clone())))
    }

    /// Reference element `(row, col)`; for a scalar only `(0, 0)` is valid.
    pub fn entry(&self, row: usize, col: usize) -> Result<Expr> {
        let shape = self.shape();
        if row >= shape.rows() || col >= shape.cols() {
            return Err(SymbolicError::IndexOutOfBounds { row, col, shape });
        }
        Ok(Expr::atom(self.atom_at(row, col)))
    }

    /// Reference the `index`-th element in row-major order.
    pub fn at(&self, index: usize) -> Result<Expr> {
        let cols = self.shape().cols().max(1);
        self.entry(index / cols, index % cols)
    }

    /// The whole symbol as a value of element references.
    pub fn value(&self) -> Value {
        let shape = self.shape();
        let elements = (0..shape.rows())
            .flat_map(|row| (0..shape.cols()).map(move |col| (row, col)))
            .map(|(row, col)| Expr::atom(self.atom_at(row, col)))
            .collect();
        Value::from_parts(shape, elements)
    }

    fn atom_at(&self, row: usize, col: usize) -> Atom {
        if self.shape().is_scalar() {
            Atom::Symbol(self.clone())
        } else {
            Atom::Entry {
                symbol: self.clone(),
                row,
                col,
            }
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.0.name, self.0.id)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Leaf of an expression: a scalar symbol or one element of a non-scalar one.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Atom {
    Symbol(Symbol),
    Entry { symbol: Symbol, row: usize, col: usize },
}

impl Atom {
    /// The symbol this atom reads from.
    pub fn symbol(&self) -> &Symbol {
        match self {
            Atom::Symbol(symbol) | Atom::Entry { symbol, .. } => symbol,
        }
    }

    /// Row-major position within the symbol's value.
    pub fn flat_index(&self) -> usize {
        match self {
            Atom::Symbol(_) => 0,
            Atom::Entry { symbol, row, col } => row * symbol.shape().cols() + col,
        }
    }

    pub(crate) fn stable_hash(&self, hash: NodeHash) -> NodeHash {
        let hash = hash.bytes(self.symbol().name().as_bytes());
        match self {
            Atom::Symbol(_) => hash,
            Atom::Entry { row, col, .. } => hash.word(*row as u64).word(*col as u64),
        }
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Symbol(symbol) => write!(f, "{symbol}"),
            Atom::Entry { symbol, row, col } => match symbol.shape() {
                Shape::Matrix { .. } => write!(f, "{symbol}[{row},{col}]"),
                _ => write!(f, "{symbol}[{row}]"),
            },
        }
    }
}
