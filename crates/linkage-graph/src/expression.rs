//! Registered expressions and extracted equation lists.

use linkage_symbolics::{Shape, Symbol, Value};
use serde::Serialize;

use crate::category::CategorySet;

/// A named definition `symbol := value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    pub name: String,
    pub symbol: Symbol,
    pub value: Value,
    pub categories: CategorySet,
}

/// An input read by extracted equations but not defined by them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalInput {
    pub symbol: Symbol,
    pub shape: Shape,
    pub categories: CategorySet,
}

/// Ordered equations handed to a code generator.
///
/// Every symbol an equation reads is either defined by an earlier equation
/// or listed in `inputs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EquationList {
    pub equations: Vec<Expression>,
    pub inputs: Vec<ExternalInput>,
}

impl EquationList {
    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Expression> {
        self.equations.iter()
    }

    /// Position of the equation defining `symbol`.
    pub fn position(&self, symbol: &Symbol) -> Option<usize> {
        self.equations.iter().position(|e| &e.symbol == symbol)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Expression> {
        self.position(symbol).map(|i| &self.equations[i])
    }

    pub fn symbols(&self) -> Vec<&Symbol> {
        self.equations.iter().map(|e| &e.symbol).collect()
    }
}
