//! Elementary rotations about the coordinate axes.

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::value::Value;

/// Coordinate axis of a three-dimensional frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> [f64; 3] {
        let mut unit = [0.0; 3];
        unit[self.index()] = 1.0;
        unit
    }

    /// Axis parallel to `direction`, if any, with the sign of the alignment.
    pub fn aligned_with(direction: [f64; 3]) -> Option<(Axis, f64)> {
        const EPS: f64 = 1e-12;
        let norm = direction.iter().map(|d| d * d).sum::<f64>().sqrt();
        if norm < EPS {
            return None;
        }
        [Axis::X, Axis::Y, Axis::Z].into_iter().find_map(|axis| {
            let along = direction[axis.index()] / norm;
            ((along.abs() - 1.0).abs() < EPS).then_some((axis, along.signum()))
        })
    }

    /// In-plane coordinate indices `(a, b)` such that a positive rotation
    /// about this axis turns `a` towards `b`.
    pub fn plane(self) -> (usize, usize) {
        match self {
            Axis::X => (1, 2),
            Axis::Y => (2, 0),
            Axis::Z => (0, 1),
        }
    }

    /// Rotation matrix for a right-handed rotation by `angle`.
    pub fn rotation(self, angle: &Expr) -> Value {
        let (c, s) = (angle.cos(), angle.sin());
        let (o, l) = (Expr::zero(), Expr::one());
        let rows = match self {
            Axis::X => [
                [l.clone(), o.clone(), o.clone()],
                [o.clone(), c.clone(), -&s],
                [o, s, c],
            ],
            Axis::Y => [
                [c.clone(), o.clone(), s.clone()],
                [o.clone(), l, o.clone()],
                [-&s, o, c],
            ],
            Axis::Z => [
                [c.clone(), -&s, o.clone()],
                [s, c, o.clone()],
                [o.clone(), o, l],
            ],
        };
        Value::from_parts(
            crate::shape::Shape::matrix(3, 3),
            rows.into_iter().flatten().collect(),
        )
    }
}
