//! The model: one equation graph, one joint chain, any number of loops.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use linkage_graph::{
    BuildStats, Category, CategorySet, EquationGraph, EquationList, GraphError, ReductionStats,
};
use linkage_loops::{
    ChainJoint, Coordinate, JointChain, JointId, LoopArtifacts, LoopDescriptor, LoopSpec,
};
use linkage_symbolics::{BasicSimplifier, Expr, Shape, Simplifier, Symbol, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::ModelConfig;
use crate::error::{Error, Result};

/// Symbols of the equations of motion in the independent coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedDynamics {
    /// Coordinates that remain integration states, in the caller's order.
    pub independent: Vec<Coordinate>,
    /// `M* = JᵀMJ`
    pub mass: Symbol,
    /// `h* = Jᵀ(Mb + h)`
    pub bias: Symbol,
    /// `f* = Jᵀf`
    pub forces: Symbol,
}

/// Front door for model authors.
///
/// Coordinates are created up front; the ones that no loop determines are
/// declared as graph inputs (`q`, `qd` as [`Category::State`], `qdd` as
/// [`Category::DerivativeOfState`]) the first time a loop reads them or the
/// model is evaluated or generated. Values set on a coordinate before that
/// are held back and become the input's initial value.
pub struct Model {
    config: ModelConfig,
    graph: EquationGraph,
    chain: JointChain,
    coordinates: IndexMap<String, Coordinate>,
    /// Dependent coordinate name to the loop that defines it.
    closed_by: IndexMap<String, String>,
    loops: IndexMap<String, LoopDescriptor>,
    pending: IndexMap<Symbol, Value>,
    dynamics: Option<ReducedDynamics>,
    /// Store revision at which every loop last passed its singularity check.
    checked_revision: Option<u64>,
}

impl Model {
    pub fn new(config: ModelConfig) -> Result<Self> {
        Self::with_simplifier(config, Arc::new(BasicSimplifier::default()))
    }

    pub fn with_simplifier(config: ModelConfig, simplifier: Arc<dyn Simplifier>) -> Result<Self> {
        config.validate()?;
        let graph = EquationGraph::new(config.graph, simplifier)?;
        Ok(Self {
            config,
            graph,
            chain: JointChain::new(),
            coordinates: IndexMap::new(),
            closed_by: IndexMap::new(),
            loops: IndexMap::new(),
            pending: IndexMap::new(),
            dynamics: None,
            checked_revision: None,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn graph(&self) -> &EquationGraph {
        &self.graph
    }

    pub fn chain(&self) -> &JointChain {
        &self.chain
    }

    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> {
        self.coordinates.values()
    }

    /// Coordinates that no loop determines.
    pub fn independent_coordinates(&self) -> impl Iterator<Item = &Coordinate> {
        self.coordinates
            .values()
            .filter(|c| !self.closed_by.contains_key(c.name()))
    }

    pub fn loop_artifacts(&self, name: &str) -> Option<&LoopArtifacts> {
        self.loops.get(name)?.artifacts()
    }

    /// Declare a named constant and its value.
    pub fn parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Symbol> {
        let value = value.into();
        let symbol = Symbol::new(name, value.shape());
        self.graph
            .declare_input(&symbol, Category::Parameter, Some(value))?;
        Ok(symbol)
    }

    /// Declare an external input other than a coordinate, such as time.
    pub fn input(
        &mut self,
        name: impl Into<String>,
        shape: Shape,
        categories: impl Into<CategorySet>,
    ) -> Result<Symbol> {
        let symbol = Symbol::new(name, shape);
        self.graph.declare_input(&symbol, categories, None)?;
        Ok(symbol)
    }

    /// Create the generalized coordinate `name` with its rates.
    pub fn coordinate(&mut self, name: impl Into<String>) -> Result<Coordinate> {
        let name = name.into();
        if self.coordinates.contains_key(&name) {
            return Err(Error::DuplicateCoordinate(name));
        }
        let coordinate = Coordinate::new(name.clone());
        debug!(coordinate = %name, "created coordinate");
        self.coordinates.insert(name, coordinate.clone());
        Ok(coordinate)
    }

    /// Add a joint driven by a coordinate of this model.
    pub fn add_joint(&mut self, joint: ChainJoint) -> Result<JointId> {
        let name = joint.coordinate.name();
        match self.coordinates.get(name) {
            Some(known) if *known == joint.coordinate => {}
            Some(_) => {
                return Err(Error::CoordinateConflict {
                    coordinate: name.to_string(),
                    reason: "another coordinate with this name belongs to the model".to_string(),
                });
            }
            None => return Err(Error::UnknownCoordinate(name.to_string())),
        }
        Ok(self.chain.add(joint)?)
    }

    /// Publish `symbol := value` under `name`.
    pub fn register_expression(
        &mut self,
        name: impl Into<String>,
        symbol: &Symbol,
        value: impl Into<Value>,
        categories: impl Into<CategorySet>,
    ) -> Result<Symbol> {
        Ok(self
            .graph
            .add_expression(name, symbol, value, categories)?)
    }

    /// Publish `value` under a fresh symbol called `name`.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        categories: impl Into<CategorySet>,
    ) -> Result<Symbol> {
        Ok(self.graph.define(name, value, categories)?)
    }

    /// Close a kinematic loop and register `v(u)`, `Bvu` and `b′`.
    #[instrument(skip(self, spec), fields(loop_name = %spec.name, topology = spec.topology.name()))]
    pub fn register_loop(&mut self, spec: LoopSpec) -> Result<LoopArtifacts> {
        if self.loops.contains_key(&spec.name) {
            return Err(Error::DuplicateLoop(spec.name));
        }
        let independent = self.joint_coordinates(&spec.independent)?;
        let dependent = self.joint_coordinates(&spec.dependent)?;
        for coordinate in &dependent {
            if let Some(owner) = self.closed_by.get(coordinate.name()) {
                return Err(Error::CoordinateConflict {
                    coordinate: coordinate.name().to_string(),
                    reason: format!("already determined by loop {owner}"),
                });
            }
            if self.graph.is_input(coordinate.q()) {
                return Err(Error::CoordinateConflict {
                    coordinate: coordinate.name().to_string(),
                    reason: "already declared as an independent input".to_string(),
                });
            }
        }
        for coordinate in &independent {
            if !self.closed_by.contains_key(coordinate.name()) {
                self.declare_coordinate(coordinate)?;
            }
        }

        let name = spec.name.clone();
        let mut descriptor = LoopDescriptor::new(spec, &self.chain, self.config.loops)?;
        let artifacts = descriptor.calc(&mut self.graph)?.clone();
        for coordinate in &artifacts.dependent {
            self.closed_by
                .insert(coordinate.name().to_string(), name.clone());
        }
        self.loops.insert(name.clone(), descriptor);
        info!(
            loop_name = %name,
            dependent = artifacts.dependent.len(),
            loops = self.loops.len(),
            "loop closed"
        );
        Ok(artifacts)
    }

    /// Rewrite the equations of motion `M q̈ = f - h` onto the independent
    /// coordinates and register `M_star`, `h_star` and `f_star`.
    ///
    /// `coordinates` orders the rows of `mass`, `bias` and `forces` and must
    /// list every loop-dependent coordinate together with the independent
    /// coordinates its loop reads. A loop driven by another loop's dependent
    /// coordinate is expressed through that loop down to the independent
    /// coordinates.
    #[instrument(skip_all, fields(coordinates = coordinates.len()))]
    pub fn reduce_dynamics(
        &mut self,
        coordinates: &[Coordinate],
        mass: &Value,
        bias: &Value,
        forces: &Value,
    ) -> Result<ReducedDynamics> {
        if self.dynamics.is_some() {
            return Err(Error::Dynamics("equations of motion are already reduced".to_string()));
        }
        let n = coordinates.len();
        if mass.rows() != n || mass.cols() != n {
            return Err(Error::Dynamics(format!(
                "mass matrix must be {n}x{n}, got {}",
                mass.shape()
            )));
        }
        for (label, value) in [("bias", bias), ("forces", forces)] {
            if value.rows() != n || value.cols() != 1 {
                return Err(Error::Dynamics(format!(
                    "{label} vector must have {n} rows, got {}",
                    value.shape()
                )));
            }
        }

        let mut seen = IndexSet::new();
        for coordinate in coordinates {
            match self.coordinates.get(coordinate.name()) {
                Some(known) if known == coordinate => {}
                _ => return Err(Error::UnknownCoordinate(coordinate.name().to_string())),
            }
            if !seen.insert(coordinate.name()) {
                return Err(Error::DuplicateCoordinate(coordinate.name().to_string()));
            }
        }

        let independent: Vec<Coordinate> = coordinates
            .iter()
            .filter(|c| !self.closed_by.contains_key(c.name()))
            .cloned()
            .collect();
        let column: IndexMap<&Symbol, usize> = independent
            .iter()
            .enumerate()
            .map(|(i, c)| (c.q(), i))
            .collect();
        let k = independent.len();

        // J = [I; Bvu] and b = [0; b′], row by row in the caller's order.
        let mut rows = IndexMap::new();
        let mut jacobian = Vec::with_capacity(n * k);
        let mut offset = Vec::with_capacity(n);
        for coordinate in coordinates {
            let (row, b) = self.closure_row(coordinate, &column, &mut rows)?;
            jacobian.extend(row);
            offset.push(b);
        }
        let jacobian = Value::matrix(n, k, jacobian)?;
        let offset = Value::matrix(n, 1, offset)?;
        let transposed = jacobian.transpose();

        let mass_star = transposed.matmul(&mass.matmul(&jacobian)?)?;
        let bias_star = transposed.matmul(&mass.matmul(&offset)?.try_add(bias)?)?;
        let forces_star = transposed.matmul(forces)?;

        let dynamics = ReducedDynamics {
            independent,
            mass: self.define("M_star", mass_star, Category::Variable)?,
            bias: self.define("h_star", bias_star, Category::Variable)?,
            forces: self.define("f_star", forces_star, Category::Variable)?,
        };
        info!(
            coordinates = n,
            independent = k,
            "equations of motion reduced"
        );
        self.dynamics = Some(dynamics.clone());
        Ok(dynamics)
    }

    /// Set an input's value. Coordinates not yet declared keep the value
    /// until they are.
    pub fn change_value(&mut self, symbol: &Symbol, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if !self.graph.is_input(symbol) && self.is_open_coordinate(symbol) {
            if !value.shape().is_scalar() {
                return Err(GraphError::ShapeMismatch {
                    symbol: symbol.name().to_string(),
                    expected: Shape::Scalar,
                    found: value.shape(),
                }
                .into());
            }
            debug!(symbol = %symbol, "holding value until the coordinate is declared");
            self.pending.insert(symbol.clone(), value);
            return Ok(());
        }
        Ok(self.graph.change_value(symbol, value)?)
    }

    /// Current value of `symbol`.
    ///
    /// Fails with a kinematic singularity when an input change since the
    /// last query moved a loop into a configuration it cannot close.
    pub fn get_value(&mut self, symbol: &Symbol) -> Result<Value> {
        self.declare_coordinates()?;
        self.verify_loops()?;
        Ok(self.graph.get_value(symbol)?)
    }

    /// Element values of `symbol`, when they are all numbers.
    pub fn get_numbers(&mut self, symbol: &Symbol) -> Result<Option<Vec<f64>>> {
        self.declare_coordinates()?;
        self.verify_loops()?;
        Ok(self.graph.get_numbers(symbol)?)
    }

    /// Ordered equations for `output` and everything they read.
    pub fn generate(&mut self, output: impl Into<CategorySet>) -> Result<EquationList> {
        let output = output.into();
        self.build()?;
        let equations = self.graph.get_equations(output, CategorySet::EMPTY)?;
        info!(
            %output,
            equations = equations.len(),
            inputs = equations.inputs.len(),
            "generated equations"
        );
        Ok(equations)
    }

    /// Drop every node not needed by `keep`.
    pub fn reduce(&mut self, keep: impl Into<CategorySet>) -> Result<ReductionStats> {
        self.build()?;
        Ok(self.graph.reduce_graph(keep.into())?)
    }

    /// Build the graph unless nothing changed since the last build.
    pub fn build(&mut self) -> Result<Option<BuildStats>> {
        self.declare_coordinates()?;
        if self.graph.is_built() {
            return Ok(None);
        }
        Ok(Some(self.graph.build_graph()?))
    }

    /// Row of `J` and entry of `b` for one coordinate, so that
    /// `q̈ = J q̈ᵤ + b` in the independent coordinates `column`.
    fn closure_row(
        &self,
        coordinate: &Coordinate,
        column: &IndexMap<&Symbol, usize>,
        rows: &mut IndexMap<String, (Vec<Expr>, Expr)>,
    ) -> Result<(Vec<Expr>, Expr)> {
        if let Some(resolved) = rows.get(coordinate.name()) {
            return Ok(resolved.clone());
        }
        let mut row = vec![Expr::zero(); column.len()];
        let Some(loop_name) = self.closed_by.get(coordinate.name()) else {
            let col = column.get(coordinate.q()).copied().ok_or_else(|| {
                Error::CoordinateConflict {
                    coordinate: coordinate.name().to_string(),
                    reason: "drives a loop but is not an independent coordinate of the reduction"
                        .to_string(),
                }
            })?;
            row[col] = Expr::one();
            return Ok((row, Expr::zero()));
        };
        let artifacts = self
            .loop_artifacts(loop_name)
            .ok_or_else(|| Error::Dynamics(format!("loop {loop_name} is not registered")))?;
        let i = artifacts
            .dependent
            .iter()
            .position(|d| d == coordinate)
            .ok_or_else(|| Error::UnknownCoordinate(coordinate.name().to_string()))?;

        let mut offset = artifacts.b_prime.at(i)?;
        for (j, driver) in artifacts.independent.iter().enumerate() {
            let ratio = artifacts.bvu.entry(i, j)?;
            let (driver_row, driver_offset) = self.closure_row(driver, column, rows)?;
            for (entry, d) in row.iter_mut().zip(&driver_row) {
                *entry = &*entry + &ratio * d;
            }
            offset = offset + &ratio * driver_offset;
        }
        rows.insert(coordinate.name().to_string(), (row.clone(), offset.clone()));
        Ok((row, offset))
    }

    fn joint_coordinates(&self, ids: &[JointId]) -> Result<Vec<Coordinate>> {
        ids.iter()
            .map(|&id| {
                self.chain
                    .get(id)
                    .map(|joint| joint.coordinate.clone())
                    .ok_or(Error::UnknownJoint(id))
            })
            .collect()
    }

    fn is_open_coordinate(&self, symbol: &Symbol) -> bool {
        self.independent_coordinates()
            .any(|c| [c.q(), c.qd(), c.qdd()].contains(&symbol))
    }

    fn declare_coordinate(&mut self, coordinate: &Coordinate) -> Result<()> {
        if self.graph.is_input(coordinate.q()) {
            return Ok(());
        }
        let rates = [
            (coordinate.q(), Category::State),
            (coordinate.qd(), Category::State),
            (coordinate.qdd(), Category::DerivativeOfState),
        ];
        for (symbol, category) in rates {
            let initial = self.pending.shift_remove(symbol);
            self.graph.declare_input(symbol, category, initial)?;
        }
        Ok(())
    }

    fn verify_loops(&mut self) -> Result<()> {
        let revision = self.graph.value_store().revision();
        if self.checked_revision == Some(revision) {
            return Ok(());
        }
        for descriptor in self.loops.values() {
            if let Err(err) = descriptor.verify(&mut self.graph) {
                warn!(loop_name = descriptor.name(), error = %err, "loop left its regular configurations");
                return Err(err.into());
            }
        }
        self.checked_revision = Some(revision);
        Ok(())
    }

    fn declare_coordinates(&mut self) -> Result<()> {
        let open: Vec<Coordinate> = self.independent_coordinates().cloned().collect();
        for coordinate in &open {
            self.declare_coordinate(coordinate)?;
        }
        Ok(())
    }
}
