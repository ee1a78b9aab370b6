//! Structural properties of generated equation lists.

use std::sync::Arc;

use linkage::{Category, CategorySet, Error, Model, ModelConfig, Symbol, Value};
use linkage_graph::GraphError;
use linkage_symbolics::BasicSimplifier;
use linkage_tests::{FourBarGeometry, ModelHarness, assert_topologically_sound};

const BARS: FourBarGeometry = FourBarGeometry {
    crank: 1.0,
    coupler: 3.0,
    rocker: 2.5,
    ground: 3.0,
};

/// A small model exercising every category: a loop, kinematics reading the
/// dependent coordinates, a sensor and a parameter-derived constant.
fn mixed_model() -> ModelHarness {
    let mut harness = ModelHarness::new();
    let rig = BARS.close(&mut harness, "fourbar", 0.3);
    let gain = harness.parameter("gain", 4.0);

    let tip = harness.define(
        "tip",
        Value::vector(vec![
            rig.rocker.position().cos() * BARS.rocker + BARS.ground,
            rig.rocker.position().sin() * BARS.rocker,
        ]),
        Category::Variable,
    );
    let scaled_gain = harness.define("scaled_gain", gain.expr().unwrap() * 2.0, Category::Parameter);
    harness.define(
        "tip_height",
        tip.at(1).unwrap() * scaled_gain.expr().unwrap() + rig.coupler.velocity(),
        Category::Sensor,
    );
    harness.define("gain_squared", gain.expr().unwrap().powi(2), Category::Parameter);
    harness
}

#[test]
fn test_generate_is_byte_identical_across_runs() {
    let render = || {
        let mut harness = mixed_model();
        let first = serde_json::to_string(&harness.generate(CategorySet::all())).unwrap();
        let again = serde_json::to_string(&harness.generate(CategorySet::all())).unwrap();
        assert_eq!(first, again);
        first
    };
    assert_eq!(render(), render());
}

#[test]
fn test_every_read_is_defined_earlier_or_an_input() {
    let mut harness = mixed_model();
    for output in [
        CategorySet::all(),
        Category::Sensor.into(),
        Category::LoopInternal.into(),
    ] {
        assert_topologically_sound(&harness.generate(output));
    }
}

#[test]
fn test_sensor_output_skips_parameter_only_consumers() {
    let mut harness = ModelHarness::new();
    let x = harness.coordinate("x");
    let k = harness.parameter("k", 3.0);

    let shared = harness.define("shared", x.position() * k.expr().unwrap(), Category::Variable);
    let feeds_parameter = harness.define("feeds_parameter", k.expr().unwrap().sqrt(), Category::Variable);
    harness.define(
        "derived_constant",
        feeds_parameter.expr().unwrap() + 1.0,
        Category::Parameter,
    );
    harness.define("shared_constant", shared.expr().unwrap() * 0.5, Category::Parameter);
    harness.define("reading", shared.expr().unwrap().exp(), Category::Sensor);

    let list = harness.generate(Category::Sensor);
    let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["shared", "reading"]);
    assert_topologically_sound(&list);
}

#[test]
fn test_reduction_is_idempotent() {
    let mut harness = mixed_model();
    let first = harness.model_mut().reduce(Category::Sensor).unwrap();
    let symbols: Vec<Symbol> = harness.model().graph().order();

    let second = harness.model_mut().reduce(Category::Sensor).unwrap();
    assert!(first.removed > 0);
    assert_eq!(second.removed, 0);
    assert_eq!(second.kept, first.kept);
    assert_eq!(harness.model().graph().order(), symbols);
}

#[test]
fn test_reduced_graph_still_evaluates_sensor() {
    let mut harness = mixed_model();
    let before = harness.generate(Category::Sensor);
    harness.model_mut().reduce(Category::Sensor).unwrap();
    let after = harness.generate(Category::Sensor);
    assert_eq!(before, after);
}

#[test]
fn test_cycle_names_both_symbols() {
    let mut harness = ModelHarness::new();
    let a = Symbol::scalar("a");
    let b = Symbol::scalar("b");
    let model = harness.model_mut();
    model
        .register_expression("a", &a, b.expr().unwrap().sin(), Category::Variable)
        .unwrap();
    model
        .register_expression("b", &b, a.expr().unwrap() + 1.0, Category::Sensor)
        .unwrap();

    let err = model.generate(Category::Sensor).unwrap_err();
    let Error::Graph(GraphError::CyclicDependency { symbols }) = err else {
        panic!("expected a cycle, got {err:?}");
    };
    assert!(symbols.contains(&"a".to_string()));
    assert!(symbols.contains(&"b".to_string()));
}

#[test]
fn test_unbound_symbol_stops_generation() {
    let mut harness = ModelHarness::new();
    let ghost = Symbol::scalar("ghost");
    harness.define("reads_ghost", ghost.expr().unwrap() * 2.0, Category::Sensor);

    let err = harness.model_mut().generate(Category::Sensor).unwrap_err();
    assert_eq!(
        err,
        Error::Graph(GraphError::UnboundSymbol {
            symbol: "ghost".to_string(),
            expression: "reads_ghost".to_string(),
        })
    );
}

#[test]
fn test_simplifier_failure_keeps_equation() {
    let failing = Arc::new(BasicSimplifier { max_operations: 0 });
    let mut model = Model::with_simplifier(ModelConfig::default(), failing).unwrap();
    let x = model.coordinate("x").unwrap();
    let value = x.position().sin() * 2.0 + x.position().cos();
    model.define("y", value.clone(), Category::Sensor).unwrap();

    let list = model.generate(Category::Sensor).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list.equations[0].value, Value::scalar(value));
}
