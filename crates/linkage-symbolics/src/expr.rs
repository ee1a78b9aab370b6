//! Immutable scalar expression trees.
//!
//! An [`Expr`] is a cheap handle to a reference-counted node. Nodes are only
//! built through the constructors in this module, which keep every result in
//! canonical form:
//!
//! - sums and products are flattened and their operands ordered by a stable
//!   structural key, so `a + b` and `b + a` are the same expression
//! - numeric operands are folded (`2 * x * 3` becomes `6*x`)
//! - like terms and like bases are collected (`x + x` becomes `2*x`,
//!   `x * x` becomes `x^2`)
//! - folding never introduces non-finite numbers; `1/0` stays symbolic
//!
//! Equality is structural and uses a precomputed FNV-1a hash as a fast path.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::hash::NodeHash;
use crate::symbol::Atom;

/// Elementary unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sqrt,
    Abs,
    Sign,
    Exp,
    Ln,
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Sign => "sign",
            Func::Exp => "exp",
            Func::Ln => "ln",
        }
    }

    /// Evaluate the function numerically.
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
            Func::Sign => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
        }
    }
}

/// Comparison used by conditional expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Less,
    Greater,
    Equal,
}

impl Relation {
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Relation::Less => lhs < rhs,
            Relation::Greater => lhs > rhs,
            Relation::Equal => lhs == rhs,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Relation::Less => "<",
            Relation::Greater => ">",
            Relation::Equal => "==",
        }
    }
}

/// Node variants of an expression tree.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(f64),
    Atom(Atom),
    /// n-ary sum, at least two operands, at most one numeric operand (first).
    Add(Vec<Expr>),
    /// n-ary product, at least two operands, at most one numeric coefficient (first).
    Mul(Vec<Expr>),
    Pow(Expr, Expr),
    Call(Func, Expr),
    /// `atan2(y, x)`.
    Atan2(Expr, Expr),
    If {
        relation: Relation,
        lhs: Expr,
        rhs: Expr,
        then: Expr,
        otherwise: Expr,
    },
}

impl PartialEq for ExprKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::Atom(a), Self::Atom(b)) => a == b,
            (Self::Add(a), Self::Add(b)) | (Self::Mul(a), Self::Mul(b)) => a == b,
            (Self::Pow(a0, a1), Self::Pow(b0, b1)) | (Self::Atan2(a0, a1), Self::Atan2(b0, b1)) => {
                a0 == b0 && a1 == b1
            }
            (Self::Call(f, a), Self::Call(g, b)) => f == g && a == b,
            (
                Self::If {
                    relation: r0,
                    lhs: l0,
                    rhs: h0,
                    then: t0,
                    otherwise: o0,
                },
                Self::If {
                    relation: r1,
                    lhs: l1,
                    rhs: h1,
                    then: t1,
                    otherwise: o1,
                },
            ) => r0 == r1 && l0 == l1 && h0 == h1 && t0 == t1 && o0 == o1,
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Node {
    kind: ExprKind,
    hash: u64,
}

/// Handle to an immutable expression node.
#[derive(Clone)]
pub struct Expr(Arc<Node>);

impl Expr {
    fn from_kind(kind: ExprKind) -> Self {
        let hash = structural_hash(&kind);
        Expr(Arc::new(Node { kind, hash }))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// Stable structural hash (independent of process state).
    pub fn structural_hash(&self) -> u64 {
        self.0.hash
    }

    /// Identity of the underlying node, used as a memo key while a tree is alive.
    pub(crate) fn node_key(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn number(value: f64) -> Self {
        let value = if value == 0.0 {
            0.0
        } else if value.is_nan() {
            f64::NAN
        } else {
            value
        };
        Self::from_kind(ExprKind::Number(value))
    }

    pub fn zero() -> Self {
        Self::number(0.0)
    }

    pub fn one() -> Self {
        Self::number(1.0)
    }

    pub fn atom(atom: Atom) -> Self {
        Self::from_kind(ExprKind::Atom(atom))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.kind() {
            ExprKind::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self.kind() {
            ExprKind::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_number() == Some(0.0)
    }

    pub fn is_one(&self) -> bool {
        self.as_number() == Some(1.0)
    }

    /// Canonical sum of `terms`.
    pub fn add_all<I: IntoIterator<Item = Expr>>(terms: I) -> Expr {
        let mut constant = 0.0;
        let mut collected: IndexMap<Expr, f64> = IndexMap::new();
        for term in terms {
            collect_term(term, &mut constant, &mut collected);
        }

        let mut out = Vec::with_capacity(collected.len() + 1);
        for (rest, coefficient) in collected {
            if coefficient == 0.0 {
                continue;
            }
            if coefficient == 1.0 {
                out.push(rest);
            } else {
                out.push(Expr::mul_all([Expr::number(coefficient), rest]));
            }
        }
        if constant != 0.0 {
            out.push(Expr::number(constant));
        }

        match out.len() {
            0 => Expr::zero(),
            1 => out.remove(0),
            _ => {
                out.sort_by_key(order_key);
                Expr::from_kind(ExprKind::Add(out))
            }
        }
    }

    /// Canonical product of `factors`.
    pub fn mul_all<I: IntoIterator<Item = Expr>>(factors: I) -> Expr {
        let mut coefficient = 1.0;
        let mut bases: IndexMap<Expr, Vec<Expr>> = IndexMap::new();
        for factor in factors {
            collect_factor(factor, &mut coefficient, &mut bases);
        }
        if coefficient == 0.0 {
            return Expr::zero();
        }

        let mut out = Vec::with_capacity(bases.len() + 1);
        for (base, exponents) in bases {
            let power = Expr::pow(base, Expr::add_all(exponents));
            match power.kind() {
                ExprKind::Number(v) => coefficient *= v,
                ExprKind::Mul(inner) => {
                    for factor in inner {
                        match factor.as_number() {
                            Some(v) => coefficient *= v,
                            None => out.push(factor.clone()),
                        }
                    }
                }
                _ => out.push(power),
            }
        }
        if coefficient == 0.0 {
            return Expr::zero();
        }
        if out.is_empty() {
            return Expr::number(coefficient);
        }

        out.sort_by_key(order_key);
        if coefficient != 1.0 {
            out.insert(0, Expr::number(coefficient));
        }
        if out.len() == 1 {
            return out.remove(0);
        }
        Expr::from_kind(ExprKind::Mul(out))
    }

    /// `base ^ exponent`.
    pub fn pow(base: Expr, exponent: Expr) -> Expr {
        if let Some(e) = exponent.as_number() {
            if e == 0.0 {
                return Expr::one();
            }
            if e == 1.0 {
                return base;
            }
            let integral = e.fract() == 0.0 && e.abs() <= i32::MAX as f64;
            if let Some(b) = base.as_number() {
                let folded = if integral { b.powi(e as i32) } else { b.powf(e) };
                if folded.is_finite() {
                    return Expr::number(folded);
                }
            }
            if integral {
                match base.kind() {
                    ExprKind::Pow(inner, inner_exponent) => {
                        return Expr::pow(
                            inner.clone(),
                            Expr::mul_all([inner_exponent.clone(), exponent.clone()]),
                        );
                    }
                    ExprKind::Mul(factors) => {
                        return Expr::mul_all(
                            factors.iter().map(|f| Expr::pow(f.clone(), exponent.clone())),
                        );
                    }
                    _ => {}
                }
            }
        }
        if base.is_one() {
            return Expr::one();
        }
        Expr::from_kind(ExprKind::Pow(base, exponent))
    }

    pub fn call(func: Func, arg: Expr) -> Expr {
        if let Some(a) = arg.as_number() {
            let folded = func.apply(a);
            if folded.is_finite() {
                return Expr::number(folded);
            }
        }
        Expr::from_kind(ExprKind::Call(func, arg))
    }

    pub fn atan2(y: Expr, x: Expr) -> Expr {
        if let (Some(yv), Some(xv)) = (y.as_number(), x.as_number()) {
            return Expr::number(yv.atan2(xv));
        }
        Expr::from_kind(ExprKind::Atan2(y, x))
    }

    /// `if lhs <relation> rhs { then } else { otherwise }`.
    pub fn if_then_else(relation: Relation, lhs: Expr, rhs: Expr, then: Expr, otherwise: Expr) -> Expr {
        if let (Some(l), Some(r)) = (lhs.as_number(), rhs.as_number()) {
            return if relation.holds(l, r) { then } else { otherwise };
        }
        if then == otherwise {
            return then;
        }
        Expr::from_kind(ExprKind::If {
            relation,
            lhs,
            rhs,
            then,
            otherwise,
        })
    }

    pub fn powi(&self, n: i32) -> Expr {
        Expr::pow(self.clone(), Expr::number(n as f64))
    }

    pub fn recip(&self) -> Expr {
        self.powi(-1)
    }

    pub fn sin(&self) -> Expr {
        Expr::call(Func::Sin, self.clone())
    }

    pub fn cos(&self) -> Expr {
        Expr::call(Func::Cos, self.clone())
    }

    pub fn tan(&self) -> Expr {
        Expr::call(Func::Tan, self.clone())
    }

    pub fn asin(&self) -> Expr {
        Expr::call(Func::Asin, self.clone())
    }

    pub fn acos(&self) -> Expr {
        Expr::call(Func::Acos, self.clone())
    }

    pub fn atan(&self) -> Expr {
        Expr::call(Func::Atan, self.clone())
    }

    pub fn sqrt(&self) -> Expr {
        Expr::call(Func::Sqrt, self.clone())
    }

    pub fn abs(&self) -> Expr {
        Expr::call(Func::Abs, self.clone())
    }

    pub fn sign(&self) -> Expr {
        Expr::call(Func::Sign, self.clone())
    }

    pub fn exp(&self) -> Expr {
        Expr::call(Func::Exp, self.clone())
    }

    pub fn ln(&self) -> Expr {
        Expr::call(Func::Ln, self.clone())
    }

    /// Direct operands of this node, in canonical order.
    pub fn children(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::Number(_) | ExprKind::Atom(_) => Vec::new(),
            ExprKind::Add(items) | ExprKind::Mul(items) => items.iter().collect(),
            ExprKind::Pow(a, b) | ExprKind::Atan2(a, b) => vec![a, b],
            ExprKind::Call(_, arg) => vec![arg],
            ExprKind::If {
                lhs,
                rhs,
                then,
                otherwise,
                ..
            } => vec![lhs, rhs, then, otherwise],
        }
    }

    /// Rebuild this node from transformed operands through the canonical
    /// constructors. Leaves are returned unchanged.
    pub fn map_children(&self, mut f: impl FnMut(&Expr) -> Expr) -> Expr {
        match self.kind() {
            ExprKind::Number(_) | ExprKind::Atom(_) => self.clone(),
            ExprKind::Add(terms) => Expr::add_all(terms.iter().map(&mut f)),
            ExprKind::Mul(factors) => Expr::mul_all(factors.iter().map(&mut f)),
            ExprKind::Pow(base, exponent) => Expr::pow(f(base), f(exponent)),
            ExprKind::Call(func, arg) => Expr::call(*func, f(arg)),
            ExprKind::Atan2(y, x) => {
                let y = f(y);
                Expr::atan2(y, f(x))
            }
            ExprKind::If {
                relation,
                lhs,
                rhs,
                then,
                otherwise,
            } => {
                let lhs = f(lhs);
                let rhs = f(rhs);
                let then = f(then);
                Expr::if_then_else(*relation, lhs, rhs, then, f(otherwise))
            }
        }
    }

    /// Split a product into its numeric coefficient and the remaining factors.
    pub fn split_coefficient(&self) -> (f64, Expr) {
        if let ExprKind::Mul(factors) = self.kind()
            && let Some(c) = factors.first().and_then(Expr::as_number)
        {
            let rest = &factors[1..];
            let rest = if rest.len() == 1 {
                rest[0].clone()
            } else {
                Expr::from_kind(ExprKind::Mul(rest.to_vec()))
            };
            return (c, rest);
        }
        if let ExprKind::Number(v) = self.kind() {
            return (*v, Expr::one());
        }
        (1.0, self.clone())
    }

    /// True for leaves (numbers and atoms).
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind(), ExprKind::Number(_) | ExprKind::Atom(_))
    }

    fn precedence(&self) -> u8 {
        match self.kind() {
            ExprKind::Add(_) => PREC_ADD,
            ExprKind::Number(v) if *v < 0.0 => PREC_ADD,
            ExprKind::Mul(_) => PREC_MUL,
            ExprKind::Pow(..) => PREC_POW,
            _ => PREC_LEAF,
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        if self.precedence() < parent {
            f.write_str("(")?;
            self.write_inner(f)?;
            f.write_str(")")
        } else {
            self.write_inner(f)
        }
    }

    fn write_inner(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Number(v) => write_number(f, *v),
            ExprKind::Atom(atom) => write!(f, "{atom}"),
            ExprKind::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i == 0 {
                        term.write(f, PREC_ADD)?;
                        continue;
                    }
                    let (coefficient, rest) = term.split_coefficient();
                    if coefficient < 0.0 {
                        f.write_str(" - ")?;
                        Expr::mul_all([Expr::number(-coefficient), rest]).write(f, PREC_MUL)?;
                    } else {
                        f.write_str(" + ")?;
                        term.write(f, PREC_MUL)?;
                    }
                }
                Ok(())
            }
            ExprKind::Mul(factors) => {
                let mut numerator = Vec::new();
                let mut denominator = Vec::new();
                let mut coefficient = 1.0;
                for factor in factors {
                    match factor.kind() {
                        ExprKind::Number(v) => coefficient = *v,
                        ExprKind::Pow(base, exponent)
                            if exponent.as_number().is_some_and(|e| e < 0.0) =>
                        {
                            denominator.push(Expr::pow(base.clone(), -exponent));
                        }
                        _ => numerator.push(factor.clone()),
                    }
                }
                if coefficient == -1.0 && !numerator.is_empty() {
                    f.write_str("-")?;
                } else if coefficient != 1.0 || numerator.is_empty() {
                    write_number(f, coefficient)?;
                    if !numerator.is_empty() {
                        f.write_str("*")?;
                    }
                }
                for (i, factor) in numerator.iter().enumerate() {
                    if i > 0 {
                        f.write_str("*")?;
                    }
                    factor.write(f, PREC_MUL)?;
                }
                if !denominator.is_empty() {
                    f.write_str("/")?;
                    if denominator.len() == 1 {
                        denominator[0].write(f, PREC_POW)?;
                    } else {
                        f.write_str("(")?;
                        for (i, factor) in denominator.iter().enumerate() {
                            if i > 0 {
                                f.write_str("*")?;
                            }
                            factor.write(f, PREC_MUL)?;
                        }
                        f.write_str(")")?;
                    }
                }
                Ok(())
            }
            ExprKind::Pow(base, exponent) => {
                base.write(f, PREC_LEAF)?;
                f.write_str("^")?;
                exponent.write(f, PREC_LEAF)
            }
            ExprKind::Call(func, arg) => {
                write!(f, "{}(", func.name())?;
                arg.write(f, 0)?;
                f.write_str(")")
            }
            ExprKind::Atan2(y, x) => {
                f.write_str("atan2(")?;
                y.write(f, 0)?;
                f.write_str(", ")?;
                x.write(f, 0)?;
                f.write_str(")")
            }
            ExprKind::If {
                relation,
                lhs,
                rhs,
                then,
                otherwise,
            } => {
                f.write_str("if(")?;
                lhs.write(f, 0)?;
                write!(f, " {} ", relation.symbol())?;
                rhs.write(f, 0)?;
                f.write_str(", ")?;
                then.write(f, 0)?;
                f.write_str(", ")?;
                otherwise.write(f, 0)?;
                f.write_str(")")
            }
        }
    }
}

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_POW: u8 = 3;
const PREC_LEAF: u8 = 4;

fn write_number(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        write!(f, "{}", v as i64)
    } else {
        write!(f, "{v:?}")
    }
}

fn collect_term(term: Expr, constant: &mut f64, collected: &mut IndexMap<Expr, f64>) {
    match term.kind() {
        ExprKind::Number(v) => *constant += v,
        ExprKind::Add(children) => {
            for child in children {
                collect_term(child.clone(), constant, collected);
            }
        }
        _ => {
            let (coefficient, rest) = term.split_coefficient();
            *collected.entry(rest).or_insert(0.0) += coefficient;
        }
    }
}

fn collect_factor(factor: Expr, coefficient: &mut f64, bases: &mut IndexMap<Expr, Vec<Expr>>) {
    match factor.kind() {
        ExprKind::Number(v) => *coefficient *= v,
        ExprKind::Mul(children) => {
            for child in children {
                collect_factor(child.clone(), coefficient, bases);
            }
        }
        ExprKind::Pow(base, exponent) => {
            bases.entry(base.clone()).or_default().push(exponent.clone());
        }
        _ => bases.entry(factor).or_default().push(Expr::one()),
    }
}

/// Canonical operand order: numbers, atoms, calls and powers, compound nodes.
fn order_key(expr: &Expr) -> (u8, u64) {
    let rank = match expr.kind() {
        ExprKind::Number(_) => 0,
        ExprKind::Atom(_) => 1,
        ExprKind::Call(..) | ExprKind::Pow(..) => 2,
        _ => 3,
    };
    (rank, expr.structural_hash())
}

fn structural_hash(kind: &ExprKind) -> u64 {
    let of = |items: &[&Expr]| items.iter().map(|e| e.0.hash).collect::<Vec<u64>>();
    let hash = match kind {
        ExprKind::Number(v) => NodeHash::tagged("n").word(v.to_bits()),
        ExprKind::Atom(atom) => atom.stable_hash(NodeHash::tagged("a")),
        ExprKind::Add(terms) => NodeHash::tagged("+").children(terms.iter().map(|e| e.0.hash)),
        ExprKind::Mul(factors) => NodeHash::tagged("*").children(factors.iter().map(|e| e.0.hash)),
        ExprKind::Pow(base, exponent) => NodeHash::tagged("^").children(of(&[base, exponent])),
        ExprKind::Call(func, arg) => NodeHash::tagged("f")
            .bytes(func.name().as_bytes())
            .word(arg.0.hash),
        ExprKind::Atan2(y, x) => NodeHash::tagged("atan2").children(of(&[y, x])),
        ExprKind::If {
            relation,
            lhs,
            rhs,
            then,
            otherwise,
        } => NodeHash::tagged("if")
            .bytes(relation.symbol().as_bytes())
            .children(of(&[lhs, rhs, then, otherwise])),
    };
    hash.finish()
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.0.hash == other.0.hash && self.0.kind == other.0.kind)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 0)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::number(value)
    }
}

impl From<Atom> for Expr {
    fn from(atom: Atom) -> Self {
        Expr::atom(atom)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $combine:expr) => {
        impl std::ops::$trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                ($combine)(self, rhs)
            }
        }
        impl std::ops::$trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                ($combine)(self, rhs.clone())
            }
        }
        impl std::ops::$trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                ($combine)(self.clone(), rhs)
            }
        }
        impl std::ops::$trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                ($combine)(self.clone(), rhs.clone())
            }
        }
        impl std::ops::$trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                ($combine)(self, Expr::number(rhs))
            }
        }
        impl std::ops::$trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                ($combine)(self.clone(), Expr::number(rhs))
            }
        }
        impl std::ops::$trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                ($combine)(Expr::number(self), rhs)
            }
        }
        impl std::ops::$trait<&Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                ($combine)(Expr::number(self), rhs.clone())
            }
        }
    };
}

impl_binary_op!(Add, add, |a: Expr, b: Expr| Expr::add_all([a, b]));
impl_binary_op!(Sub, sub, |a: Expr, b: Expr| Expr::add_all([
    a,
    Expr::mul_all([Expr::number(-1.0), b])
]));
impl_binary_op!(Mul, mul, |a: Expr, b: Expr| Expr::mul_all([a, b]));
impl_binary_op!(Div, div, |a: Expr, b: Expr| Expr::mul_all([a, b.recip()]));

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::mul_all([Expr::number(-1.0), self])
    }
}

impl std::ops::Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::mul_all([Expr::number(-1.0), self.clone()])
    }
}
