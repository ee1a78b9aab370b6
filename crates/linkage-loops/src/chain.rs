//! Joint chains and forward kinematics.
//!
//! A [`JointChain`] is a tree of single-axis joints hanging off a fixed root
//! body. Each joint sits at an `anchor` expressed in its parent joint's moving
//! frame (or in the root frame for top-level joints) and moves its own frame by
//! one coordinate: a rotation about a frame axis or a translation along a unit
//! direction. Boundary frames are points rigidly attached to a joint's moving
//! frame, or to the root.

use std::fmt;

use indexmap::IndexMap;
use linkage_symbolics::{Atom, Axis, Expr, Shape, Symbol, Value};

use crate::error::{LoopError, Result};

/// A generalized coordinate with its first and second time derivatives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    name: String,
    q: Symbol,
    qd: Symbol,
    qdd: Symbol,
}

impl Coordinate {
    /// Creates `name`, `name_d` and `name_dd` scalar symbols.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            q: Symbol::scalar(name.clone()),
            qd: Symbol::scalar(format!("{name}_d")),
            qdd: Symbol::scalar(format!("{name}_dd")),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn q(&self) -> &Symbol {
        &self.q
    }

    pub fn qd(&self) -> &Symbol {
        &self.qd
    }

    pub fn qdd(&self) -> &Symbol {
        &self.qdd
    }

    pub fn position(&self) -> Expr {
        Expr::atom(Atom::Symbol(self.q.clone()))
    }

    pub fn velocity(&self) -> Expr {
        Expr::atom(Atom::Symbol(self.qd.clone()))
    }

    pub fn acceleration(&self) -> Expr {
        Expr::atom(Atom::Symbol(self.qdd.clone()))
    }

    pub(crate) fn atom(&self) -> Atom {
        Atom::Symbol(self.q.clone())
    }
}

/// Index of a joint within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub(crate) usize);

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "joint#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointKind {
    /// Rotation about a frame axis.
    Revolute { axis: Axis },
    /// Translation along a unit direction of the parent frame.
    Prismatic { direction: [f64; 3] },
}

/// One joint of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainJoint {
    pub name: String,
    pub kind: JointKind,
    pub coordinate: Coordinate,
    pub parent: Option<JointId>,
    /// Joint origin in the parent's frame, a 3-vector.
    pub anchor: Value,
}

impl ChainJoint {
    pub fn revolute(name: impl Into<String>, coordinate: Coordinate, axis: Axis) -> Self {
        Self::new(name, coordinate, JointKind::Revolute { axis })
    }

    pub fn prismatic(name: impl Into<String>, coordinate: Coordinate, direction: [f64; 3]) -> Self {
        Self::new(name, coordinate, JointKind::Prismatic { direction })
    }

    fn new(name: impl Into<String>, coordinate: Coordinate, kind: JointKind) -> Self {
        Self {
            name: name.into(),
            kind,
            coordinate,
            parent: None,
            anchor: Value::zeros(3, 1),
        }
    }

    pub fn with_parent(mut self, parent: JointId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn at(mut self, anchor: Value) -> Self {
        self.anchor = anchor;
        self
    }
}

/// A point rigidly attached to a joint's moving frame, or to the root when
/// `body` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFrame {
    pub name: String,
    pub body: Option<JointId>,
    pub position: Value,
}

impl BoundaryFrame {
    pub fn on(name: impl Into<String>, body: JointId, position: Value) -> Self {
        Self {
            name: name.into(),
            body: Some(body),
            position,
        }
    }

    pub fn on_root(name: impl Into<String>, position: Value) -> Self {
        Self {
            name: name.into(),
            body: None,
            position,
        }
    }
}

/// A three-component point or offset.
pub fn point(x: impl Into<Expr>, y: impl Into<Expr>, z: impl Into<Expr>) -> Value {
    Value::vector(vec![x.into(), y.into(), z.into()])
}

/// Tree of joints rooted at a fixed body.
#[derive(Debug, Clone, Default)]
pub struct JointChain {
    joints: Vec<ChainJoint>,
    by_name: IndexMap<String, JointId>,
}

impl JointChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a joint. Its parent must already be in the chain, so the chain
    /// is always a tree. Prismatic directions are normalised.
    pub fn add(&mut self, mut joint: ChainJoint) -> Result<JointId> {
        if self.by_name.contains_key(&joint.name) {
            return Err(LoopError::InvalidChain(format!("duplicate joint {}", joint.name)));
        }
        if let Some(parent) = joint.parent
            && parent.0 >= self.joints.len()
        {
            return Err(LoopError::InvalidChain(format!(
                "joint {} has unknown parent {parent}",
                joint.name
            )));
        }
        check_point(&joint.anchor, &joint.name)?;
        if let JointKind::Prismatic { direction } = &mut joint.kind {
            let norm = direction.iter().map(|d| d * d).sum::<f64>().sqrt();
            if !norm.is_finite() || norm < 1e-12 {
                return Err(LoopError::InvalidChain(format!(
                    "prismatic joint {} needs a non-zero direction",
                    joint.name
                )));
            }
            for component in direction.iter_mut() {
                *component /= norm;
            }
        }

        let id = JointId(self.joints.len());
        self.by_name.insert(joint.name.clone(), id);
        self.joints.push(joint);
        Ok(id)
    }

    pub fn get(&self, id: JointId) -> Option<&ChainJoint> {
        self.joints.get(id.0)
    }

    pub(crate) fn joint(&self, id: JointId) -> Result<&ChainJoint> {
        self.get(id)
            .ok_or_else(|| LoopError::InvalidChain(format!("unknown joint {id}")))
    }

    pub fn find(&self, name: &str) -> Option<JointId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointId, &ChainJoint)> {
        self.joints.iter().enumerate().map(|(i, j)| (JointId(i), j))
    }

    /// Joints from the root down to `body`, inclusive.
    pub fn path(&self, body: Option<JointId>) -> Result<Vec<JointId>> {
        let mut path = Vec::new();
        let mut current = body;
        while let Some(id) = current {
            current = self.joint(id)?.parent;
            path.push(id);
        }
        path.reverse();
        Ok(path)
    }

    /// The two paths below the deepest joint shared by `a` and `b`.
    pub fn branches(
        &self,
        a: Option<JointId>,
        b: Option<JointId>,
    ) -> Result<(Vec<JointId>, Vec<JointId>)> {
        let path_a = self.path(a)?;
        let path_b = self.path(b)?;
        let shared = path_a
            .iter()
            .zip(&path_b)
            .take_while(|(x, y)| x == y)
            .count();
        Ok((path_a[shared..].to_vec(), path_b[shared..].to_vec()))
    }

    /// Position of `frame` relative to the frame the first joint of `branch`
    /// is anchored in, moving through every joint of `branch` in order.
    pub fn frame_position(&self, branch: &[JointId], frame: &BoundaryFrame) -> Result<Value> {
        check_point(&frame.position, &frame.name)?;
        let mut position = Value::zeros(3, 1);
        let mut rotation = Value::identity(3);
        for &id in branch {
            let joint = self.joint(id)?;
            position = position.try_add(&rotation.matmul(&joint.anchor)?)?;
            let q = joint.coordinate.position();
            match joint.kind {
                JointKind::Revolute { axis } => {
                    rotation = rotation.matmul(&axis.rotation(&q))?;
                }
                JointKind::Prismatic { direction } => {
                    let slide = point(direction[0], direction[1], direction[2]).scale(&q);
                    position = position.try_add(&rotation.matmul(&slide)?)?;
                }
            }
        }
        Ok(position.try_add(&rotation.matmul(&frame.position)?)?)
    }
}

fn check_point(value: &Value, owner: &str) -> Result<()> {
    if value.shape() != Shape::vector(3) {
        return Err(LoopError::InvalidChain(format!(
            "{owner}: expected a 3-vector offset, found {}",
            value.shape()
        )));
    }
    Ok(())
}
