//! Loop descriptors and their derivation state machine.
//!
//! A descriptor moves `Unresolved → GeometrySolved → LinearizedOnce →
//! LinearizedTwice → Registered`. Each stage keeps its result, so a failed
//! step can be retried without redoing earlier ones, and calling
//! [`LoopDescriptor::calc`] on a registered loop hands back the stored
//! artifacts without differentiating again.

use std::collections::HashMap;

use indexmap::IndexSet;
use linkage_graph::{Category, EquationGraph};
use linkage_symbolics::{Atom, Symbol, Value};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::chain::{BoundaryFrame, Coordinate, JointChain, JointId};
use crate::config::LoopConfig;
use crate::error::{LoopError, Result};
use crate::topology::{Geometry, LoopInput, LoopTopology};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LoopState {
    Unresolved,
    /// `v(u)` derived.
    GeometrySolved,
    /// `Ju`, `Jv` derived.
    LinearizedOnce,
    /// `∂(J q̇)/∂q · q̇` derived.
    LinearizedTwice,
    /// Expressions inserted into the graph.
    Registered,
}

/// What the caller asks to close.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSpec {
    pub name: String,
    pub topology: LoopTopology,
    pub frame_a: BoundaryFrame,
    pub frame_b: BoundaryFrame,
    pub independent: Vec<JointId>,
    pub dependent: Vec<JointId>,
}

/// Graph symbols produced for one loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopArtifacts {
    pub independent: Vec<Coordinate>,
    /// Dependent coordinates; their `q`, `qd`, `qdd` symbols are defined in
    /// the graph as `v(u)`, `Bvu·u̇` and `Bvu·ü + b′`.
    pub dependent: Vec<Coordinate>,
    /// `Φ(u, v)` in terms of the coordinate symbols.
    pub constraint: Value,
    pub ju: Symbol,
    pub jv: Symbol,
    pub jv_inv: Symbol,
    pub bvu: Symbol,
    pub jdot_qd: Symbol,
    pub b_prime: Symbol,
}

impl LoopArtifacts {
    /// The symbols holding `v(u)`.
    pub fn v(&self) -> Vec<&Symbol> {
        self.dependent.iter().map(Coordinate::q).collect()
    }
}

#[derive(Debug, Clone)]
struct Jacobians {
    ju: Value,
    jv: Value,
}

/// One kinematic loop on its way into the equation graph.
#[derive(Debug, Clone)]
pub struct LoopDescriptor {
    spec: LoopSpec,
    chain: JointChain,
    config: LoopConfig,
    state: LoopState,
    geometry: Option<Geometry>,
    jacobians: Option<Jacobians>,
    jdot_qd: Option<Value>,
    artifacts: Option<LoopArtifacts>,
}

impl LoopDescriptor {
    /// Describe a loop over a snapshot of `chain`.
    ///
    /// Fails with [`LoopError::DirectWorldConnection`] when a boundary frame
    /// that must move sits on the chain root.
    pub fn new(spec: LoopSpec, chain: &JointChain, config: LoopConfig) -> Result<Self> {
        config.validate()?;
        let mut frames = vec![&spec.frame_b];
        if !spec.topology.frame_a_on_base() {
            frames.insert(0, &spec.frame_a);
        }
        for frame in frames {
            if frame.body.is_none() {
                return Err(LoopError::DirectWorldConnection {
                    loop_name: spec.name.clone(),
                    frame: frame.name.clone(),
                });
            }
        }
        Ok(Self {
            spec,
            chain: chain.clone(),
            config,
            state: LoopState::Unresolved,
            geometry: None,
            jacobians: None,
            jdot_qd: None,
            artifacts: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn topology(&self) -> &LoopTopology {
        &self.spec.topology
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn artifacts(&self) -> Option<&LoopArtifacts> {
        self.artifacts.as_ref()
    }

    /// Derive `v(u)`, `Bvu` and `b′` and register them in `graph`.
    ///
    /// Idempotent: once registered, later calls return the stored artifacts.
    #[instrument(skip(self, graph), fields(loop_name = %self.spec.name, topology = self.spec.topology.name()))]
    pub fn calc(&mut self, graph: &mut EquationGraph) -> Result<&LoopArtifacts> {
        let artifacts = match self.artifacts.take() {
            Some(artifacts) => {
                debug!("loop already registered, reusing artifacts");
                artifacts
            }
            None => self.derive(graph)?,
        };
        Ok(self.artifacts.insert(artifacts))
    }

    /// Re-run the singularity check of a registered loop at the graph's
    /// current input values.
    ///
    /// Does nothing before registration or with the check switched off.
    pub fn verify(&self, graph: &mut EquationGraph) -> Result<()> {
        if !self.config.check_singularity || self.state != LoopState::Registered {
            return Ok(());
        }
        let (Some(geometry), Some(jacobians)) = (&self.geometry, &self.jacobians) else {
            return Ok(());
        };
        self.check_regularity(graph, geometry, &jacobians.jv)
    }

    fn derive(&mut self, graph: &mut EquationGraph) -> Result<LoopArtifacts> {
        let geometry = match &self.geometry {
            Some(geometry) => geometry.clone(),
            None => {
                let geometry = self.spec.topology.solve(&self.input())?;
                self.geometry = Some(geometry.clone());
                self.enter(LoopState::GeometrySolved);
                geometry
            }
        };
        let jacobians = match &self.jacobians {
            Some(jacobians) => jacobians.clone(),
            None => {
                let jacobians = linearize_once(&geometry)?;
                self.jacobians = Some(jacobians.clone());
                self.enter(LoopState::LinearizedOnce);
                jacobians
            }
        };
        let jdot_qd = match &self.jdot_qd {
            Some(jdot_qd) => jdot_qd.clone(),
            None => {
                let jdot_qd = linearize_twice(&geometry)?;
                self.jdot_qd = Some(jdot_qd.clone());
                self.enter(LoopState::LinearizedTwice);
                jdot_qd
            }
        };

        if self.config.check_singularity {
            self.check_regularity(graph, &geometry, &jacobians.jv)?;
        }
        let artifacts = self.register(graph, geometry, jacobians, jdot_qd)?;
        self.enter(LoopState::Registered);
        Ok(artifacts)
    }

    fn input(&self) -> LoopInput<'_> {
        LoopInput {
            name: &self.spec.name,
            topology: self.spec.topology.name(),
            chain: &self.chain,
            frame_a: &self.spec.frame_a,
            frame_b: &self.spec.frame_b,
            independent: &self.spec.independent,
            dependent: &self.spec.dependent,
        }
    }

    fn enter(&mut self, state: LoopState) {
        debug!(loop_name = %self.spec.name, from = ?self.state, to = ?state, "loop state transition");
        self.state = state;
    }

    /// Reject configurations where `v(u)` is not real or `Jv` is singular.
    /// Skipped while any input the check reads has no numeric value.
    fn check_regularity(
        &self,
        graph: &mut EquationGraph,
        geometry: &Geometry,
        jv: &Value,
    ) -> Result<()> {
        let dependent: IndexSet<&Symbol> = geometry.dependent.iter().map(Coordinate::q).collect();
        let mut symbols: IndexSet<Symbol> = IndexSet::new();
        for expr in &geometry.solution {
            symbols.extend(expr.free_symbols());
        }
        symbols.extend(jv.free_symbols());

        let mut numbers: HashMap<Symbol, Vec<f64>> = HashMap::new();
        for symbol in symbols.into_iter().filter(|s| !dependent.contains(s)) {
            match graph.get_numbers(&symbol) {
                Ok(Some(values)) => {
                    numbers.insert(symbol, values);
                }
                _ => {
                    debug!(
                        loop_name = %self.spec.name,
                        symbol = %symbol,
                        "configuration is not numeric, skipping regularity check"
                    );
                    return Ok(());
                }
            }
        }

        let solved: Vec<f64> = {
            let lookup = |atom: &Atom| numbers.get(atom.symbol())?.get(atom.flat_index()).copied();
            geometry
                .solution
                .iter()
                .map(|e| e.evaluate(&lookup).unwrap_or(f64::NAN))
                .collect()
        };
        let mut configuration: Vec<(String, f64)> = geometry
            .independent
            .iter()
            .filter_map(|c| Some((c.name().to_string(), *numbers.get(c.q())?.first()?)))
            .collect();
        for (coordinate, &value) in geometry.dependent.iter().zip(&solved) {
            configuration.push((coordinate.name().to_string(), value));
            numbers.insert(coordinate.q().clone(), vec![value]);
        }

        let lookup = |atom: &Atom| numbers.get(atom.symbol())?.get(atom.flat_index()).copied();
        let determinant = match jv.evaluate(&lookup) {
            Some(values) if solved.iter().all(|v| v.is_finite()) => Value::from_numbers(jv.shape(), &values)?
                .determinant()?
                .as_number()
                .unwrap_or(f64::NAN),
            _ => f64::NAN,
        };
        if !determinant.is_finite() || determinant.abs() <= self.config.singularity_tolerance {
            return Err(LoopError::KinematicSingularity {
                loop_name: self.spec.name.clone(),
                determinant,
                configuration,
            });
        }
        debug!(loop_name = %self.spec.name, determinant, "loop configuration is regular");
        Ok(())
    }

    fn register(
        &self,
        graph: &mut EquationGraph,
        geometry: Geometry,
        jacobians: Jacobians,
        jdot_qd: Value,
    ) -> Result<LoopArtifacts> {
        let name = &self.spec.name;
        let m = geometry.dependent.len();
        let n = geometry.independent.len();
        let internal = Category::LoopInternal;

        for (coordinate, value) in geometry.dependent.iter().zip(&geometry.solution) {
            let q = coordinate.q();
            graph.add_expression(q.name(), q, value.clone(), internal)?;
        }

        let ju = Symbol::matrix(format!("{name}_Ju"), m, n);
        graph.add_expression(ju.name(), &ju, jacobians.ju, internal)?;
        let jv = Symbol::matrix(format!("{name}_Jv"), m, m);
        graph.add_expression(jv.name(), &jv, jacobians.jv, internal)?;
        let jv_inv = Symbol::matrix(format!("{name}_Jv_inv"), m, m);
        graph.add_expression(jv_inv.name(), &jv_inv, jv.value().inverse()?, internal)?;
        let bvu = Symbol::matrix(format!("{name}_Bvu"), m, n);
        let bvu_value = jv_inv.value().matmul(&ju.value())?.negate();
        graph.add_expression(bvu.name(), &bvu, bvu_value, internal)?;

        let ud = Value::vector(geometry.independent.iter().map(Coordinate::velocity).collect());
        let vd = bvu.value().matmul(&ud)?;
        for (i, coordinate) in geometry.dependent.iter().enumerate() {
            let qd = coordinate.qd();
            graph.add_expression(qd.name(), qd, vd.element(i)?.clone(), internal)?;
        }

        let jdot = Symbol::vector(format!("{name}_Jdot_qd"), m);
        graph.add_expression(jdot.name(), &jdot, jdot_qd, internal)?;
        let b_prime = Symbol::vector(format!("{name}_b_prime"), m);
        let b_prime_value = jv_inv.value().matmul(&jdot.value())?.negate();
        graph.add_expression(b_prime.name(), &b_prime, b_prime_value, internal)?;

        let udd = Value::vector(geometry.independent.iter().map(Coordinate::acceleration).collect());
        let vdd = bvu.value().matmul(&udd)?.try_add(&b_prime.value())?;
        for (i, coordinate) in geometry.dependent.iter().enumerate() {
            let qdd = coordinate.qdd();
            graph.add_expression(qdd.name(), qdd, vdd.element(i)?.clone(), internal)?;
        }

        info!(
            loop_name = %name,
            topology = self.spec.topology.name(),
            independent = n,
            dependent = m,
            "registered loop"
        );
        Ok(LoopArtifacts {
            independent: geometry.independent,
            dependent: geometry.dependent,
            constraint: geometry.constraint,
            ju,
            jv,
            jv_inv,
            bvu,
            jdot_qd: jdot,
            b_prime,
        })
    }
}

/// `Ju = ∂Φ/∂u` and `Jv = ∂Φ/∂v`.
fn linearize_once(geometry: &Geometry) -> Result<Jacobians> {
    let u: Vec<Atom> = geometry.independent.iter().map(Coordinate::atom).collect();
    let v: Vec<Atom> = geometry.dependent.iter().map(Coordinate::atom).collect();
    Ok(Jacobians {
        ju: geometry.constraint.jacobian(&u)?,
        jv: geometry.constraint.jacobian(&v)?,
    })
}

/// `J̇·q̇ = ∂(J q̇)/∂q · q̇` with `J = ∂Φ/∂q` over `q = (u, v)`.
fn linearize_twice(geometry: &Geometry) -> Result<Value> {
    let coordinates: Vec<&Coordinate> = geometry
        .independent
        .iter()
        .chain(&geometry.dependent)
        .collect();
    let q: Vec<Atom> = coordinates.iter().map(|c| c.atom()).collect();
    let qd = Value::vector(coordinates.iter().map(|c| c.velocity()).collect());
    let j_qd = geometry.constraint.jacobian(&q)?.matmul(&qd)?;
    Ok(j_qd.jacobian(&q)?.matmul(&qd)?)
}
