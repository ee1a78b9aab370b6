//! Traversal, substitution and numeric evaluation of expressions.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

use crate::expr::{Expr, ExprKind};
use crate::symbol::{Atom, Symbol};

impl Expr {
    /// Distinct atoms in first-occurrence (depth-first, left-to-right) order.
    pub fn atoms(&self) -> IndexSet<Atom> {
        let mut atoms = IndexSet::new();
        collect_atoms(self, &mut atoms, &mut HashSet::new());
        atoms
    }

    /// Distinct symbols referenced, in first-occurrence order.
    pub fn free_symbols(&self) -> IndexSet<Symbol> {
        self.atoms().into_iter().map(|a| a.symbol().clone()).collect()
    }

    /// Replace atoms for which `lookup` returns a replacement, re-canonicalising
    /// every rebuilt node.
    pub fn substitute<F>(&self, lookup: &F) -> Expr
    where
        F: Fn(&Atom) -> Option<Expr>,
    {
        let mut memo = HashMap::new();
        substitute_memo(self, lookup, &mut memo)
    }

    /// Numeric value with atoms bound by `lookup`; `None` if any atom is
    /// unbound.
    pub fn evaluate<F>(&self, lookup: &F) -> Option<f64>
    where
        F: Fn(&Atom) -> Option<f64>,
    {
        let value = match self.kind() {
            ExprKind::Number(v) => *v,
            ExprKind::Atom(atom) => lookup(atom)?,
            ExprKind::Add(terms) => {
                let mut sum = 0.0;
                for term in terms {
                    sum += term.evaluate(lookup)?;
                }
                sum
            }
            ExprKind::Mul(factors) => {
                let mut product = 1.0;
                for factor in factors {
                    product *= factor.evaluate(lookup)?;
                }
                product
            }
            ExprKind::Pow(base, exponent) => {
                let b = base.evaluate(lookup)?;
                let e = exponent.evaluate(lookup)?;
                if e.fract() == 0.0 && e.abs() <= i32::MAX as f64 {
                    b.powi(e as i32)
                } else {
                    b.powf(e)
                }
            }
            ExprKind::Call(func, arg) => func.apply(arg.evaluate(lookup)?),
            ExprKind::Atan2(y, x) => y.evaluate(lookup)?.atan2(x.evaluate(lookup)?),
            ExprKind::If {
                relation,
                lhs,
                rhs,
                then,
                otherwise,
            } => {
                if relation.holds(lhs.evaluate(lookup)?, rhs.evaluate(lookup)?) {
                    then.evaluate(lookup)?
                } else {
                    otherwise.evaluate(lookup)?
                }
            }
        };
        Some(value)
    }

    /// Number of arithmetic operations when evaluated as a tree.
    pub fn operation_count(&self) -> usize {
        match self.kind() {
            ExprKind::Number(_) | ExprKind::Atom(_) => 0,
            ExprKind::Add(items) | ExprKind::Mul(items) => {
                items.len() - 1 + items.iter().map(Expr::operation_count).sum::<usize>()
            }
            _ => 1 + self.children().into_iter().map(Expr::operation_count).sum::<usize>(),
        }
    }
}

fn collect_atoms(expr: &Expr, atoms: &mut IndexSet<Atom>, seen: &mut HashSet<usize>) {
    if !seen.insert(expr.node_key()) {
        return;
    }
    match expr.kind() {
        ExprKind::Atom(atom) => {
            atoms.insert(atom.clone());
        }
        _ => {
            for child in expr.children() {
                collect_atoms(child, atoms, seen);
            }
        }
    }
}

fn substitute_memo<F>(expr: &Expr, lookup: &F, memo: &mut HashMap<usize, Expr>) -> Expr
where
    F: Fn(&Atom) -> Option<Expr>,
{
    if let Some(hit) = memo.get(&expr.node_key()) {
        return hit.clone();
    }
    let result = match expr.kind() {
        ExprKind::Number(_) => expr.clone(),
        ExprKind::Atom(atom) => lookup(atom).unwrap_or_else(|| expr.clone()),
        _ => expr.map_children(|child| substitute_memo(child, lookup, memo)),
    };
    memo.insert(expr.node_key(), result.clone());
    result
}
