//! Integration test harness for linkage.
//!
//! This crate provides utilities for end-to-end testing of the generation
//! pipeline: Register → Close loops → Build → Generate → Evaluate.

use indexmap::IndexSet;
use linkage::{
    Axis, BoundaryFrame, CategorySet, ChainJoint, Coordinate, EquationList, JointId,
    LoopArtifacts, LoopSpec, LoopTopology, Model, ModelConfig, Posture, Symbol, Value, point,
};
use linkage_symbolics::Atom;
use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Test harness wrapping a [`Model`] with panicking helpers.
pub struct ModelHarness {
    model: Model,
}

impl ModelHarness {
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn with_config(config: ModelConfig) -> Self {
        init_tracing();
        let model = Model::new(config).expect("invalid model configuration");
        Self { model }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn parameter(&mut self, name: &str, value: f64) -> Symbol {
        self.model
            .parameter(name, value)
            .expect("parameter declaration failed")
    }

    pub fn coordinate(&mut self, name: &str) -> Coordinate {
        self.model
            .coordinate(name)
            .expect("coordinate creation failed")
    }

    pub fn joint(&mut self, joint: ChainJoint) -> JointId {
        self.model.add_joint(joint).expect("joint rejected")
    }

    pub fn define(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        categories: impl Into<CategorySet>,
    ) -> Symbol {
        self.model
            .define(name, value, categories)
            .expect("expression rejected")
    }

    pub fn close(&mut self, spec: LoopSpec) -> LoopArtifacts {
        self.model.register_loop(spec).expect("loop closure failed")
    }

    pub fn set(&mut self, symbol: &Symbol, value: f64) {
        self.model
            .change_value(symbol, value)
            .expect("value change failed");
    }

    /// Set position, velocity and acceleration of a coordinate.
    pub fn set_motion(&mut self, coordinate: &Coordinate, q: f64, qd: f64, qdd: f64) {
        self.set(coordinate.q(), q);
        self.set(coordinate.qd(), qd);
        self.set(coordinate.qdd(), qdd);
    }

    /// # Panics
    ///
    /// Panics if the symbol does not evaluate to numbers.
    pub fn numbers(&mut self, symbol: &Symbol) -> Vec<f64> {
        self.model
            .get_numbers(symbol)
            .expect("evaluation failed")
            .unwrap_or_else(|| panic!("{symbol} is not numeric"))
    }

    pub fn scalar(&mut self, symbol: &Symbol) -> f64 {
        self.numbers(symbol)[0]
    }

    pub fn generate(&mut self, output: impl Into<CategorySet>) -> EquationList {
        self.model.generate(output).expect("generation failed")
    }

    /// Largest component of a loop's `Φ(u, v)` at the current values.
    pub fn residual(&mut self, artifacts: &LoopArtifacts) -> f64 {
        let mut bound = Vec::new();
        for symbol in artifacts.constraint.free_symbols() {
            let values = self.numbers(&symbol);
            bound.push((symbol, values));
        }
        let lookup = |atom: &Atom| {
            bound
                .iter()
                .find(|(symbol, _)| symbol == atom.symbol())
                .and_then(|(_, values)| values.get(atom.flat_index()).copied())
        };
        artifacts
            .constraint
            .evaluate(&lookup)
            .expect("constraint is not numeric")
            .into_iter()
            .fold(0.0, |max, v| max.max(v.abs()))
    }
}

impl Default for ModelHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that every symbol an equation reads is defined earlier in the list
/// or is one of its external inputs.
///
/// # Panics
///
/// Panics naming the first equation that reads ahead.
pub fn assert_topologically_sound(list: &EquationList) {
    let inputs: IndexSet<&Symbol> = list.inputs.iter().map(|i| &i.symbol).collect();
    let mut defined: IndexSet<&Symbol> = IndexSet::new();
    for equation in &list.equations {
        for read in equation.value.free_symbols() {
            assert!(
                defined.contains(&read) || inputs.contains(&read),
                "{} reads {read} before it is defined",
                equation.name
            );
        }
        defined.insert(&equation.symbol);
    }
}

/// Bar lengths of a planar four-bar: crank pivot at the origin, rocker pivot
/// at `(ground, 0)`, all joints about z.
#[derive(Debug, Clone, Copy)]
pub struct FourBarGeometry {
    pub crank: f64,
    pub coupler: f64,
    pub rocker: f64,
    pub ground: f64,
}

/// A four-bar closed in a [`ModelHarness`].
pub struct FourBarRig {
    pub geometry: FourBarGeometry,
    pub crank: Coordinate,
    pub coupler: Coordinate,
    pub rocker: Coordinate,
    pub artifacts: LoopArtifacts,
}

impl FourBarGeometry {
    /// Register the linkage with the crank at `u` and close it.
    pub fn close(self, harness: &mut ModelHarness, name: &str, u: f64) -> FourBarRig {
        let crank = harness.coordinate(&format!("{name}_qA"));
        let coupler = harness.coordinate(&format!("{name}_qB"));
        let rocker = harness.coordinate(&format!("{name}_qD"));
        harness.set(crank.q(), u);

        let ja = harness.joint(ChainJoint::revolute(format!("{name}_A"), crank.clone(), Axis::Z));
        let jb = harness.joint(
            ChainJoint::revolute(format!("{name}_B"), coupler.clone(), Axis::Z)
                .with_parent(ja)
                .at(point(self.crank, 0.0, 0.0)),
        );
        let jd = harness.joint(
            ChainJoint::revolute(format!("{name}_D"), rocker.clone(), Axis::Z)
                .at(point(self.ground, 0.0, 0.0)),
        );
        let artifacts = harness.close(LoopSpec {
            name: name.to_string(),
            topology: LoopTopology::FourBar {
                posture: Posture::Positive,
            },
            frame_a: BoundaryFrame::on("coupler_end", jb, point(self.coupler, 0.0, 0.0)),
            frame_b: BoundaryFrame::on("rocker_end", jd, point(self.rocker, 0.0, 0.0)),
            independent: vec![ja],
            dependent: vec![jb, jd],
        });
        FourBarRig {
            geometry: self,
            crank,
            coupler,
            rocker,
            artifacts,
        }
    }

    /// Coupler and rocker angles for crank angle `u` from the triangle formed
    /// by the crank tip, the coupler end and the rocker pivot, with the
    /// coupler end left of the line from crank tip to rocker pivot.
    pub fn reference_solution(&self, u: f64) -> (f64, f64) {
        let (bx, by) = (self.crank * u.cos(), self.crank * u.sin());
        let (ex, ey) = (bx - self.ground, by);
        let diagonal = (ex * ex + ey * ey).sqrt();
        let gamma = ((self.rocker.powi(2) + diagonal.powi(2) - self.coupler.powi(2))
            / (2.0 * self.rocker * diagonal))
            .acos();
        let phi = ey.atan2(ex);
        let (cx, cy) = [phi + gamma, phi - gamma]
            .into_iter()
            .map(|angle| (self.ground + self.rocker * angle.cos(), self.rocker * angle.sin()))
            .find(|&(cx, cy)| (self.ground - bx) * (cy - by) + by * (cx - bx) > 0.0)
            .expect("four-bar does not close");
        let coupler = (cy - by).atan2(cx - bx) - u;
        let rocker = cy.atan2(cx - self.ground);
        (coupler, rocker)
    }
}
