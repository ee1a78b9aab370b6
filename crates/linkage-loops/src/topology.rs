//! Loop topologies and their closed-form solutions.
//!
//! Every topology turns the same inputs (a joint chain, two boundary frames,
//! the caller's independent/dependent partition) into a [`Geometry`]: the
//! constraint `Φ(u, v)` and explicit expressions `v(u)` that satisfy it. The
//! structure each closed form relies on is checked first; anything else is
//! [`LoopError::UnsupportedTopology`].
//!
//! Planar topologies work in the plane of their common revolute axis and
//! constrain the two in-plane components of the frame mismatch. Positions are
//! taken relative to the deepest joint both frames share, so a mechanism may
//! sit on a moving base.

use indexmap::IndexSet;
use linkage_symbolics::{Axis, Expr, Value};
use serde::{Deserialize, Serialize};

use crate::chain::{BoundaryFrame, ChainJoint, Coordinate, JointChain, JointId, JointKind};
use crate::error::{LoopError, Result};
use crate::planar::{Planar, circle_intersection};

/// Branch choice for closed forms with two solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Posture {
    Positive,
    Negative,
}

impl Posture {
    pub fn sign(self) -> f64 {
        match self {
            Posture::Positive => 1.0,
            Posture::Negative => -1.0,
        }
    }
}

/// The closed-form solutions available for a loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopTopology {
    /// Planar four-bar. Frame A on joint B (child of revolute A), frame B on
    /// revolute D; `u = [A]`, `v = [B, D]`.
    FourBar { posture: Posture },
    /// Four-bar whose output link slides. Frame A on revolute B (child of
    /// revolute A), frame B on a prismatic joint carried by revolute D;
    /// `u = [A, B]`, `v = [slider, D]`.
    FourBarTrans,
    /// Crank against a pivoting slider. Frame A on revolute A, frame B on a
    /// prismatic joint carried by revolute C; `u = [A]`, `v = [slider, C]`.
    ThreeBarTrans,
    /// Crank driving a rod whose far end rides a slider. Frame A on revolute
    /// A (the crank), frame B on revolute B carried by prismatic C; both sit
    /// on the shared base and the slider does not rotate. `u = [A]`,
    /// `v = [C, B]` with `B` measured against the base; `posture` picks the
    /// slider position ahead of (`Positive`) or behind the crank along C.
    CrankSlider { posture: Posture },
    /// Rack, then two revolutes reaching a point fixed on the base. Frame A
    /// on the base, frame B on the last revolute; `u = [rack]`,
    /// `v = [first revolute, second revolute]`.
    ///
    /// Which side of the rack the kingpin and the knuckle sit on comes from
    /// their signed anchor positions, so a left and a right wheel are the
    /// same topology with mirrored anchors. `posture` picks the side of the
    /// line from tie rod pivot to kingpin that the knuckle pivot lies on;
    /// mirroring the anchors flips it.
    Steering { posture: Posture },
    /// Platform chain against a leg of revolute Y, revolute Z and a prismatic
    /// joint along x; `u` = the platform joints, `v = [length, Y, Z]`.
    Hexapod,
    /// [`LoopTopology::Hexapod`] with the Z axis offset from the Y axis
    /// along the leg.
    HexapodWithOffset,
    /// `v = ratio * u` for one coordinate each.
    Transmission { ratio: f64 },
    /// `v = expression(u)` for one dependent coordinate.
    ExplicitJoint { expression: Expr },
}

impl LoopTopology {
    pub fn name(&self) -> &'static str {
        match self {
            LoopTopology::FourBar { .. } => "four-bar",
            LoopTopology::FourBarTrans => "four-bar-trans",
            LoopTopology::ThreeBarTrans => "three-bar-trans",
            LoopTopology::CrankSlider { .. } => "crank-slider",
            LoopTopology::Steering { .. } => "steering",
            LoopTopology::Hexapod => "hexapod",
            LoopTopology::HexapodWithOffset => "hexapod-with-offset",
            LoopTopology::Transmission { .. } => "transmission",
            LoopTopology::ExplicitJoint { .. } => "explicit-joint",
        }
    }

    /// Whether frame A may sit on the shared base rather than on a body
    /// moved by a loop joint.
    pub(crate) fn frame_a_on_base(&self) -> bool {
        matches!(self, LoopTopology::Steering { .. })
    }

    pub(crate) fn solve(&self, input: &LoopInput<'_>) -> Result<Geometry> {
        let (a, b) = input.chain.branches(input.frame_a.body, input.frame_b.body)?;
        match self {
            LoopTopology::FourBar { posture } => four_bar(input, &a, &b, *posture),
            LoopTopology::FourBarTrans => four_bar_trans(input, &a, &b),
            LoopTopology::ThreeBarTrans => three_bar_trans(input, &a, &b),
            LoopTopology::CrankSlider { posture } => crank_slider(input, &a, &b, *posture),
            LoopTopology::Steering { posture } => steering(input, &a, &b, *posture),
            LoopTopology::Hexapod => hexapod(input, &a, &b, false),
            LoopTopology::HexapodWithOffset => hexapod(input, &a, &b, true),
            LoopTopology::Transmission { ratio } => transmission(input, *ratio),
            LoopTopology::ExplicitJoint { expression } => explicit_joint(input, expression),
        }
    }
}

/// A loop closure solved for its dependent coordinates.
#[derive(Debug, Clone)]
pub(crate) struct Geometry {
    pub(crate) independent: Vec<Coordinate>,
    pub(crate) dependent: Vec<Coordinate>,
    /// `Φ(u, v)`, one component per dependent coordinate.
    pub(crate) constraint: Value,
    /// `v(u)` in the order of `dependent`.
    pub(crate) solution: Vec<Expr>,
}

pub(crate) struct LoopInput<'a> {
    pub(crate) name: &'a str,
    pub(crate) topology: &'static str,
    pub(crate) chain: &'a JointChain,
    pub(crate) frame_a: &'a BoundaryFrame,
    pub(crate) frame_b: &'a BoundaryFrame,
    pub(crate) independent: &'a [JointId],
    pub(crate) dependent: &'a [JointId],
}

impl LoopInput<'_> {
    fn unsupported(&self, reason: impl Into<String>) -> LoopError {
        LoopError::UnsupportedTopology {
            loop_name: self.name.to_string(),
            topology: self.topology,
            reason: reason.into(),
        }
    }

    fn joint(&self, id: JointId) -> Result<&ChainJoint> {
        self.chain.joint(id)
    }

    fn names(&self, ids: &[JointId]) -> String {
        let names: Vec<&str> = ids
            .iter()
            .map(|&id| self.chain.get(id).map_or("?", |j| j.name.as_str()))
            .collect();
        format!("[{}]", names.join(", "))
    }

    fn expect_branch(&self, branch: &[JointId], len: usize, frame: &BoundaryFrame) -> Result<()> {
        if branch.len() != len {
            return Err(self.unsupported(format!(
                "expected {len} joint(s) between the shared base and frame {}, found {}",
                frame.name,
                self.names(branch)
            )));
        }
        Ok(())
    }

    fn revolute_axis(&self, id: JointId) -> Result<Axis> {
        let joint = self.joint(id)?;
        match joint.kind {
            JointKind::Revolute { axis } => Ok(axis),
            JointKind::Prismatic { .. } => {
                Err(self.unsupported(format!("joint {} must be revolute", joint.name)))
            }
        }
    }

    fn prismatic_direction(&self, id: JointId) -> Result<[f64; 3]> {
        let joint = self.joint(id)?;
        match joint.kind {
            JointKind::Prismatic { direction } => Ok(direction),
            JointKind::Revolute { .. } => {
                Err(self.unsupported(format!("joint {} must be prismatic", joint.name)))
            }
        }
    }

    /// The axis shared by every listed revolute joint.
    fn common_axis(&self, ids: &[JointId]) -> Result<Axis> {
        let mut axes = IndexSet::new();
        for &id in ids {
            axes.insert(self.revolute_axis(id)?);
        }
        match axes.len() {
            1 => Ok(axes[0]),
            _ => Err(self.unsupported(format!(
                "revolute joints {} must share one axis",
                self.names(ids)
            ))),
        }
    }

    /// A prismatic direction lying in the plane of `axis`, as a unit vector.
    fn in_plane_direction(&self, id: JointId, axis: Axis) -> Result<Planar> {
        let direction = self.prismatic_direction(id)?;
        if direction[axis.index()].abs() > 1e-12 {
            return Err(self.unsupported(format!(
                "prismatic joint {} must move in the plane normal to {axis:?}",
                self.joint(id)?.name
            )));
        }
        let (a, b) = axis.plane();
        Ok(Planar::new(
            Expr::number(direction[a]),
            Expr::number(direction[b]),
        ))
    }

    /// Check the caller's partition against the one the topology needs and
    /// return the coordinates in the topology's order.
    fn partition(
        &self,
        independent: &[JointId],
        dependent: &[JointId],
    ) -> Result<(Vec<Coordinate>, Vec<Coordinate>)> {
        let same = |given: &[JointId], expected: &[JointId]| {
            let given: IndexSet<_> = given.iter().collect();
            given.len() == expected.len() && expected.iter().all(|id| given.contains(id))
        };
        if !same(self.independent, independent) {
            return Err(self.unsupported(format!(
                "independent joints must be {}, got {}",
                self.names(independent),
                self.names(self.independent)
            )));
        }
        if !same(self.dependent, dependent) {
            return Err(self.unsupported(format!(
                "dependent joints must be {}, got {}",
                self.names(dependent),
                self.names(self.dependent)
            )));
        }
        Ok((self.coordinates(independent)?, self.coordinates(dependent)?))
    }

    fn coordinates(&self, ids: &[JointId]) -> Result<Vec<Coordinate>> {
        ids.iter()
            .map(|&id| Ok(self.joint(id)?.coordinate.clone()))
            .collect()
    }

    fn planar(&self, value: &Value, axis: Axis) -> Result<Planar> {
        Planar::project(value, axis)
    }

    /// Frame A minus frame B, relative to the shared base, optionally
    /// projected onto the plane of `axis`.
    fn constraint(&self, a: &[JointId], b: &[JointId], plane: Option<Axis>) -> Result<Value> {
        let mismatch = self
            .chain
            .frame_position(a, self.frame_a)?
            .try_sub(&self.chain.frame_position(b, self.frame_b)?)?;
        match plane {
            Some(axis) => {
                let (i, j) = axis.plane();
                Ok(mismatch.select(&[i, j])?)
            }
            None => Ok(mismatch),
        }
    }
}

fn four_bar(input: &LoopInput<'_>, a: &[JointId], b: &[JointId], posture: Posture) -> Result<Geometry> {
    input.expect_branch(a, 2, input.frame_a)?;
    input.expect_branch(b, 1, input.frame_b)?;
    let (ja, jb, jd) = (a[0], a[1], b[0]);
    let axis = input.common_axis(&[ja, jb, jd])?;
    let (independent, dependent) = input.partition(&[ja], &[jb, jd])?;
    let qa = independent[0].position();

    let pa = input.planar(&input.joint(ja)?.anchor, axis)?;
    let b0 = input.planar(&input.joint(jb)?.anchor, axis)?;
    let c3 = input.planar(&input.frame_a.position, axis)?;
    let pd = input.planar(&input.joint(jd)?.anchor, axis)?;
    let c4 = input.planar(&input.frame_b.position, axis)?;

    let pb = pa.add(&b0.rotate(&qa));
    let pc = circle_intersection(&pb, &c3.length(), &pd, &c4.length(), posture.sign());
    let q_b = pc.sub(&pb).angle() - c3.angle() - &qa;
    let q_d = pc.sub(&pd).angle() - c4.angle();

    Ok(Geometry {
        constraint: input.constraint(a, b, Some(axis))?,
        independent,
        dependent,
        solution: vec![q_b, q_d],
    })
}

/// Slider solution shared by the `*Trans` topologies: the pivoting link
/// carries `offset + s * direction` and must reach `target` (relative to its
/// pivot). Returns `(s, pivot angle)`.
fn slider_solution(offset: &Planar, direction: &Planar, target: &Planar) -> (Expr, Expr) {
    let along = offset.dot(direction);
    let s = -&along
        + (along.powi(2) - offset.length_squared() + target.length_squared()).sqrt();
    let angle = target.angle() - offset.add(&direction.scale(&s)).angle();
    (s, angle)
}

fn four_bar_trans(input: &LoopInput<'_>, a: &[JointId], b: &[JointId]) -> Result<Geometry> {
    input.expect_branch(a, 2, input.frame_a)?;
    input.expect_branch(b, 2, input.frame_b)?;
    let (ja, jb, jd, js) = (a[0], a[1], b[0], b[1]);
    let axis = input.common_axis(&[ja, jb, jd])?;
    let direction = input.in_plane_direction(js, axis)?;
    let (independent, dependent) = input.partition(&[ja, jb], &[js, jd])?;
    let (qa, qb) = (independent[0].position(), independent[1].position());

    let pa = input.planar(&input.joint(ja)?.anchor, axis)?;
    let b0 = input.planar(&input.joint(jb)?.anchor, axis)?;
    let c3 = input.planar(&input.frame_a.position, axis)?;
    let pd = input.planar(&input.joint(jd)?.anchor, axis)?;
    let offset = input
        .planar(&input.joint(js)?.anchor, axis)?
        .add(&input.planar(&input.frame_b.position, axis)?);

    let target = pa
        .add(&b0.rotate(&qa))
        .add(&c3.rotate(&(&qa + &qb)))
        .sub(&pd);
    let (s, q_d) = slider_solution(&offset, &direction, &target);

    Ok(Geometry {
        constraint: input.constraint(a, b, Some(axis))?,
        independent,
        dependent,
        solution: vec![s, q_d],
    })
}

fn three_bar_trans(input: &LoopInput<'_>, a: &[JointId], b: &[JointId]) -> Result<Geometry> {
    input.expect_branch(a, 1, input.frame_a)?;
    input.expect_branch(b, 2, input.frame_b)?;
    let (ja, jc, js) = (a[0], b[0], b[1]);
    let axis = input.common_axis(&[ja, jc])?;
    let direction = input.in_plane_direction(js, axis)?;
    let (independent, dependent) = input.partition(&[ja], &[js, jc])?;
    let qa = independent[0].position();

    let pa = input.planar(&input.joint(ja)?.anchor, axis)?;
    let c2 = input.planar(&input.frame_a.position, axis)?;
    let pc = input.planar(&input.joint(jc)?.anchor, axis)?;
    let offset = input
        .planar(&input.joint(js)?.anchor, axis)?
        .add(&input.planar(&input.frame_b.position, axis)?);

    let target = pa.add(&c2.rotate(&qa)).sub(&pc);
    let (s, q_c) = slider_solution(&offset, &direction, &target);

    Ok(Geometry {
        constraint: input.constraint(a, b, Some(axis))?,
        independent,
        dependent,
        solution: vec![s, q_c],
    })
}

fn crank_slider(input: &LoopInput<'_>, a: &[JointId], b: &[JointId], posture: Posture) -> Result<Geometry> {
    input.expect_branch(a, 1, input.frame_a)?;
    input.expect_branch(b, 2, input.frame_b)?;
    let (ja, jc, jb) = (a[0], b[0], b[1]);
    let axis = input.common_axis(&[ja, jb])?;
    let direction = input.in_plane_direction(jc, axis)?;
    let (independent, dependent) = input.partition(&[ja], &[jc, jb])?;
    let qa = independent[0].position();

    let pa = input.planar(&input.joint(ja)?.anchor, axis)?;
    let c1 = input.planar(&input.frame_a.position, axis)?;
    let pc = input.planar(&input.joint(jc)?.anchor, axis)?;
    let b0 = input.planar(&input.joint(jb)?.anchor, axis)?;
    let c2 = input.planar(&input.frame_b.position, axis)?;

    // crank pin relative to the rod pivot at zero slide
    let target = pa.add(&c1.rotate(&qa)).sub(&pc).sub(&b0);
    let along = target.dot(&direction);
    let reach = (along.powi(2) - target.length_squared() + c2.length_squared()).sqrt();
    let s = &along + posture.sign() * reach;
    let q_b = target.sub(&direction.scale(&s)).angle() - c2.angle();

    Ok(Geometry {
        constraint: input.constraint(a, b, Some(axis))?,
        independent,
        dependent,
        solution: vec![s, q_b],
    })
}

fn steering(input: &LoopInput<'_>, a: &[JointId], b: &[JointId], posture: Posture) -> Result<Geometry> {
    input.expect_branch(a, 0, input.frame_a)?;
    input.expect_branch(b, 3, input.frame_b)?;
    let (jr, jb, jc) = (b[0], b[1], b[2]);
    let axis = input.common_axis(&[jb, jc])?;
    let direction = input.in_plane_direction(jr, axis)?;
    let (independent, dependent) = input.partition(&[jr], &[jb, jc])?;
    let s = independent[0].position();

    let pb = input
        .planar(&input.joint(jr)?.anchor, axis)?
        .add(&direction.scale(&s))
        .add(&input.planar(&input.joint(jb)?.anchor, axis)?);
    let target = input.planar(&input.frame_a.position, axis)?;
    let c2 = input.planar(&input.joint(jc)?.anchor, axis)?;
    let d3 = input.planar(&input.frame_b.position, axis)?;

    let pc = circle_intersection(&pb, &c2.length(), &target, &d3.length(), posture.sign());
    let q_b = pc.sub(&pb).angle() - c2.angle();
    let q_c = target.sub(&pc).angle() - d3.angle() - &q_b;

    Ok(Geometry {
        constraint: input.constraint(a, b, Some(axis))?,
        independent,
        dependent,
        solution: vec![q_b, q_c],
    })
}

fn hexapod(input: &LoopInput<'_>, a: &[JointId], b: &[JointId], offset: bool) -> Result<Geometry> {
    if a.is_empty() {
        return Err(input.unsupported(format!(
            "frame {} must be moved by the platform joints",
            input.frame_a.name
        )));
    }
    input.expect_branch(b, 3, input.frame_b)?;
    let (j_y, j_z, j_len) = (b[0], b[1], b[2]);
    if input.revolute_axis(j_y)? != Axis::Y || input.revolute_axis(j_z)? != Axis::Z {
        return Err(input.unsupported("leg joints must rotate about y, then z"));
    }
    let direction = input.prismatic_direction(j_len)?;
    if Axis::aligned_with(direction) != Some((Axis::X, 1.0)) {
        return Err(input.unsupported("leg length joint must slide along +x"));
    }

    let z_anchor = &input.joint(j_z)?.anchor;
    let len_anchor = &input.joint(j_len)?.anchor;
    let tip = &input.frame_b.position;
    let off_axis = |value: &Value| value.elements()[1..].iter().any(|e| !e.is_zero());
    if off_axis(z_anchor) || (!offset && !z_anchor.element(0)?.is_zero()) {
        let reason = if offset {
            "z joint must sit on the leg's x axis"
        } else {
            "z joint must sit on the y joint; use the offset hexapod topology"
        };
        return Err(input.unsupported(reason));
    }
    if off_axis(len_anchor) || off_axis(tip) {
        return Err(input.unsupported(format!(
            "leg joint and frame {} must lie on the leg's x axis",
            input.frame_b.name
        )));
    }

    let (independent, dependent) = input.partition(a, &[j_len, j_y, j_z])?;

    let platform = input.chain.frame_position(a, input.frame_a)?;
    let w = platform.try_sub(&input.joint(j_y)?.anchor)?;
    let (wx, wy, wz) = (w.element(0)?, w.element(1)?, w.element(2)?);
    let extension = len_anchor.element(0)? + tip.element(0)?;

    let angle_y = Expr::atan2(-wz, wx.clone());
    let (length, angle_z) = if offset {
        let radial = (wx.powi(2) + wz.powi(2)).sqrt() - z_anchor.element(0)?;
        let length = (radial.powi(2) + wy.powi(2)).sqrt();
        (length, Expr::atan2(wy.clone(), radial))
    } else {
        let length = w.norm()?;
        let angle_z = (wy / &length).asin();
        (length, angle_z)
    };

    Ok(Geometry {
        constraint: input.constraint(a, b, None)?,
        independent,
        dependent,
        solution: vec![length - extension, angle_y, angle_z],
    })
}

/// The caller's partition for the coordinate-coupling topologies.
fn coupling(input: &LoopInput<'_>, max_independent: Option<usize>) -> Result<(Vec<Coordinate>, Coordinate)> {
    let [dependent] = input.dependent else {
        return Err(input.unsupported(format!(
            "exactly one dependent joint required, got {}",
            input.names(input.dependent)
        )));
    };
    let count = input.independent.len();
    if count == 0 || max_independent.is_some_and(|max| count > max) {
        return Err(input.unsupported(format!(
            "unexpected independent joints {}",
            input.names(input.independent)
        )));
    }
    if input.independent.contains(dependent) {
        return Err(input.unsupported("a joint cannot be both independent and dependent"));
    }
    let independent = input.coordinates(input.independent)?;
    let dependent = input.joint(*dependent)?.coordinate.clone();
    Ok((independent, dependent))
}

fn transmission(input: &LoopInput<'_>, ratio: f64) -> Result<Geometry> {
    if !ratio.is_finite() {
        return Err(input.unsupported(format!("transmission ratio must be finite, got {ratio}")));
    }
    let (independent, dependent) = coupling(input, Some(1))?;
    let driven = ratio * independent[0].position();
    Ok(Geometry {
        constraint: Value::scalar(dependent.position() - &driven),
        independent,
        dependent: vec![dependent],
        solution: vec![driven],
    })
}

fn explicit_joint(input: &LoopInput<'_>, expression: &Expr) -> Result<Geometry> {
    let (independent, dependent) = coupling(input, None)?;
    if expression.free_symbols().contains(dependent.q()) {
        return Err(input.unsupported(format!(
            "expression for {} must not read its own coordinate",
            dependent.name()
        )));
    }
    Ok(Geometry {
        constraint: Value::scalar(dependent.position() - expression),
        independent,
        dependent: vec![dependent],
        solution: vec![expression.clone()],
    })
}
