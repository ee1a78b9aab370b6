//! The injectable simplification capability.
//!
//! The equation graph never depends on a concrete algebra engine for
//! simplification; it receives a `&dyn Simplifier`. Implementations must be
//! deterministic and thread-safe because the graph may simplify nodes in
//! parallel. A failure is recoverable: the caller keeps the unsimplified
//! expression.

use std::collections::HashMap;

use thiserror::Error;

use crate::expr::{Expr, ExprKind, Func};
use crate::value::Value;

/// Simplification failed for one expression.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot simplify expression: {reason}")]
pub struct SimplifyError {
    pub reason: String,
}

/// Expression simplification strategy.
pub trait Simplifier: Send + Sync {
    fn simplify(&self, expr: &Expr) -> Result<Expr, SimplifyError>;

    fn simplify_value(&self, value: &Value) -> Result<Value, SimplifyError> {
        value.try_map(|e| self.simplify(e))
    }
}

/// Returns every expression unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSimplifier;

impl Simplifier for NoopSimplifier {
    fn simplify(&self, expr: &Expr) -> Result<Expr, SimplifyError> {
        Ok(expr.clone())
    }
}

/// Canonical rebuild plus collection of `c·R·sin²(x) + c·R·cos²(x)` into `c·R`.
///
/// Expressions larger than `max_operations` are rejected rather than walked.
#[derive(Debug, Clone, Copy)]
pub struct BasicSimplifier {
    pub max_operations: usize,
}

impl Default for BasicSimplifier {
    fn default() -> Self {
        Self {
            max_operations: 250_000,
        }
    }
}

impl Simplifier for BasicSimplifier {
    fn simplify(&self, expr: &Expr) -> Result<Expr, SimplifyError> {
        let operations = expr.operation_count();
        if operations > self.max_operations {
            return Err(SimplifyError {
                reason: format!(
                    "{operations} operations exceeds limit of {}",
                    self.max_operations
                ),
            });
        }
        Ok(rewrite(expr, &mut HashMap::new()))
    }
}

fn rewrite(expr: &Expr, memo: &mut HashMap<usize, Expr>) -> Expr {
    if let Some(hit) = memo.get(&expr.node_key()) {
        return hit.clone();
    }
    let rebuilt = expr.map_children(|child| rewrite(child, memo));
    let result = match rebuilt.kind() {
        ExprKind::Add(terms) => collect_pythagorean(terms),
        _ => rebuilt.clone(),
    };
    memo.insert(expr.node_key(), result.clone());
    result
}

/// `sin(x)^2` argument, if `factor` has that form.
fn squared_sine_argument(factor: &Expr) -> Option<&Expr> {
    match factor.kind() {
        ExprKind::Pow(base, exponent) if exponent.as_number() == Some(2.0) => match base.kind() {
            ExprKind::Call(Func::Sin, arg) => Some(arg),
            _ => None,
        },
        _ => None,
    }
}

fn factors_of(term: &Expr) -> Vec<Expr> {
    match term.kind() {
        ExprKind::Mul(factors) => factors.clone(),
        _ => vec![term.clone()],
    }
}

fn collect_pythagorean(terms: &[Expr]) -> Expr {
    let mut terms = terms.to_vec();
    let mut changed = true;
    while changed {
        changed = false;
        'outer: for i in 0..terms.len() {
            let factors = factors_of(&terms[i]);
            for (k, factor) in factors.iter().enumerate() {
                let Some(arg) = squared_sine_argument(factor) else {
                    continue;
                };
                let rest: Vec<Expr> = factors
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != k)
                    .map(|(_, f)| f.clone())
                    .collect();
                let partner = Expr::mul_all(
                    rest.iter().cloned().chain(std::iter::once(arg.cos().powi(2))),
                );
                if let Some(j) = terms.iter().position(|t| *t == partner) {
                    let (hi, lo) = if i > j { (i, j) } else { (j, i) };
                    terms.remove(hi);
                    terms.remove(lo);
                    terms.push(Expr::mul_all(rest));
                    changed = true;
                    break 'outer;
                }
            }
        }
    }
    Expr::add_all(terms)
}
