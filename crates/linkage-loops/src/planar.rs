//! Symbolic plane geometry used by the planar closed forms.

use linkage_symbolics::{Axis, Expr, Value};

use crate::error::Result;

/// A point or offset in the motion plane of a rotation axis.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Planar {
    pub(crate) x: Expr,
    pub(crate) y: Expr,
}

impl Planar {
    pub(crate) fn new(x: Expr, y: Expr) -> Self {
        Self { x, y }
    }

    /// In-plane components of a 3-vector, ordered so a positive rotation
    /// about `axis` turns `x` towards `y`.
    pub(crate) fn project(value: &Value, axis: Axis) -> Result<Self> {
        let (a, b) = axis.plane();
        Ok(Self::new(value.element(a)?.clone(), value.element(b)?.clone()))
    }

    pub(crate) fn add(&self, other: &Planar) -> Planar {
        Planar::new(&self.x + &other.x, &self.y + &other.y)
    }

    pub(crate) fn sub(&self, other: &Planar) -> Planar {
        Planar::new(&self.x - &other.x, &self.y - &other.y)
    }

    pub(crate) fn scale(&self, factor: &Expr) -> Planar {
        Planar::new(&self.x * factor, &self.y * factor)
    }

    pub(crate) fn dot(&self, other: &Planar) -> Expr {
        &self.x * &other.x + &self.y * &other.y
    }

    pub(crate) fn length_squared(&self) -> Expr {
        self.dot(self)
    }

    pub(crate) fn length(&self) -> Expr {
        self.length_squared().sqrt()
    }

    /// Polar angle, `atan2(y, x)`.
    pub(crate) fn angle(&self) -> Expr {
        Expr::atan2(self.y.clone(), self.x.clone())
    }

    pub(crate) fn rotate(&self, angle: &Expr) -> Planar {
        let (c, s) = (angle.cos(), angle.sin());
        Planar::new(
            &self.x * &c - &self.y * &s,
            &self.x * &s + &self.y * &c,
        )
    }

    /// Quarter turn in the positive sense.
    pub(crate) fn perp(&self) -> Planar {
        Planar::new(-&self.y, self.x.clone())
    }
}

/// One intersection of the circles `|P - c1| = r1` and `|P - c2| = r2`.
/// `sign` picks the side of the line `c1 → c2`: `+1` left, `-1` right.
pub(crate) fn circle_intersection(c1: &Planar, r1: &Expr, c2: &Planar, r2: &Expr, sign: f64) -> Planar {
    let between = c2.sub(c1);
    let d2 = between.length_squared();
    let d = d2.sqrt();
    let a = (r1.powi(2) - r2.powi(2) + &d2) / (2.0 * &d);
    let h = (r1.powi(2) - a.powi(2)).sqrt();
    c1.add(&between.scale(&(&a / &d)))
        .add(&between.perp().scale(&(sign * (h / d))))
}
