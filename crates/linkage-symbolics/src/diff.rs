//! Symbolic differentiation.
//!
//! Derivatives are taken with respect to a single [`Atom`]. Shared subtrees
//! are differentiated once per call through a node-identity memo, so
//! Jacobians of expressions that reuse large intermediate terms stay linear in
//! the number of distinct nodes.

use std::collections::HashMap;

use crate::expr::{Expr, ExprKind, Func};
use crate::symbol::Atom;

impl Expr {
    /// Partial derivative with respect to `var`.
    pub fn diff(&self, var: &Atom) -> Expr {
        let mut memo = HashMap::new();
        diff_memo(self, var, &mut memo)
    }

    /// True if `var` occurs anywhere in the expression.
    pub fn depends_on(&self, var: &Atom) -> bool {
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr.kind() {
                ExprKind::Atom(atom) if atom == var => return true,
                _ => stack.extend(expr.children()),
            }
        }
        false
    }
}

fn diff_memo(expr: &Expr, var: &Atom, memo: &mut HashMap<usize, Expr>) -> Expr {
    if let Some(hit) = memo.get(&expr.node_key()) {
        return hit.clone();
    }
    let result = match expr.kind() {
        ExprKind::Number(_) => Expr::zero(),
        ExprKind::Atom(atom) => {
            if atom == var {
                Expr::one()
            } else {
                Expr::zero()
            }
        }
        ExprKind::Add(terms) => Expr::add_all(terms.iter().map(|t| diff_memo(t, var, memo))),
        ExprKind::Mul(factors) => {
            let mut terms = Vec::new();
            for (i, factor) in factors.iter().enumerate() {
                let d = diff_memo(factor, var, memo);
                if d.is_zero() {
                    continue;
                }
                let others = factors
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, f)| f.clone());
                terms.push(Expr::mul_all(others.chain(std::iter::once(d))));
            }
            Expr::add_all(terms)
        }
        ExprKind::Pow(base, exponent) => {
            let db = diff_memo(base, var, memo);
            let de = diff_memo(exponent, var, memo);
            if de.is_zero() {
                if db.is_zero() {
                    Expr::zero()
                } else {
                    Expr::mul_all([
                        exponent.clone(),
                        Expr::pow(base.clone(), exponent - 1.0),
                        db,
                    ])
                }
            } else {
                expr * (de * base.ln() + exponent * db / base)
            }
        }
        ExprKind::Call(func, arg) => {
            let d = diff_memo(arg, var, memo);
            if d.is_zero() {
                Expr::zero()
            } else {
                call_derivative(*func, arg) * d
            }
        }
        ExprKind::Atan2(y, x) => {
            let dy = diff_memo(y, var, memo);
            let dx = diff_memo(x, var, memo);
            if dy.is_zero() && dx.is_zero() {
                Expr::zero()
            } else {
                (x * dy - y * dx) / (x.powi(2) + y.powi(2))
            }
        }
        ExprKind::If {
            relation,
            lhs,
            rhs,
            then,
            otherwise,
        } => Expr::if_then_else(
            *relation,
            lhs.clone(),
            rhs.clone(),
            diff_memo(then, var, memo),
            diff_memo(otherwise, var, memo),
        ),
    };
    memo.insert(expr.node_key(), result.clone());
    result
}

/// Outer derivative `f'(arg)`.
fn call_derivative(func: Func, arg: &Expr) -> Expr {
    match func {
        Func::Sin => arg.cos(),
        Func::Cos => -arg.sin(),
        Func::Tan => 1.0 + arg.tan().powi(2),
        Func::Asin => (1.0 - arg.powi(2)).sqrt().recip(),
        Func::Acos => -(1.0 - arg.powi(2)).sqrt().recip(),
        Func::Atan => (1.0 + arg.powi(2)).recip(),
        Func::Sqrt => 0.5 * arg.sqrt().recip(),
        Func::Abs => arg.sign(),
        Func::Sign => Expr::zero(),
        Func::Exp => arg.exp(),
        Func::Ln => arg.recip(),
    }
}
