//! Double pendulum without loops: kinematics chained through frames.

use linkage::{Category, GraphConfig, ModelConfig, Symbol, Value};
use linkage_tests::{ModelHarness, assert_topologically_sound};

struct Pendulum {
    harness: ModelHarness,
    segment1: Symbol,
    segment2: Symbol,
    energy: Symbol,
}

/// One node per published quantity.
fn pendulum() -> Pendulum {
    pendulum_with(ModelConfig {
        graph: GraphConfig {
            eliminate_common_subexpressions: false,
            ..GraphConfig::default()
        },
        ..ModelConfig::default()
    })
}

/// Segment 1 hangs from the origin at angle `q1`; segment 2 hangs from the
/// end of segment 1 at relative angle `q2`.
fn pendulum_with(config: ModelConfig) -> Pendulum {
    let mut harness = ModelHarness::with_config(config);
    let l1 = harness.parameter("l1", 1.0).expr().unwrap();
    let l2 = harness.parameter("l2", 0.5).expr().unwrap();
    let m = harness.parameter("m", 2.0).expr().unwrap();
    let g = harness.parameter("g", 9.81).expr().unwrap();
    let q1 = harness.coordinate("q1");
    let q2 = harness.coordinate("q2");

    let segment1 = harness.define(
        "segment1",
        Value::vector(vec![
            &l1 * q1.position().sin(),
            -(&l1 * q1.position().cos()),
        ]),
        Category::Variable,
    );
    let absolute = q1.position() + q2.position();
    let segment2 = harness.define(
        "segment2",
        Value::vector(vec![
            segment1.at(0).unwrap() + &l2 * absolute.sin(),
            segment1.at(1).unwrap() - &l2 * absolute.cos(),
        ]),
        Category::Variable,
    );
    let energy = harness.define(
        "energy",
        &m * &g * (segment1.at(1).unwrap() + segment2.at(1).unwrap()),
        Category::Sensor,
    );

    harness.define("total_length", &l1 + &l2, Category::Parameter);
    harness.define("reach", (&l1 + &l2) * q1.position().cos(), Category::Variable);

    Pendulum {
        harness,
        segment1,
        segment2,
        energy,
    }
}

#[test]
fn test_sensor_output_is_exactly_the_kinematic_chain() {
    let mut p = pendulum();
    let list = p.harness.generate(Category::Sensor);

    let symbols: Vec<&Symbol> = list.symbols();
    assert_eq!(symbols, vec![&p.segment1, &p.segment2, &p.energy]);
    assert_topologically_sound(&list);

    let mut inputs: Vec<&str> = list.inputs.iter().map(|i| i.symbol.name()).collect();
    inputs.sort();
    assert_eq!(inputs, vec!["g", "l1", "l2", "m", "q1", "q2"]);
}

#[test]
fn test_shared_terms_stay_between_published_quantities() {
    let mut p = pendulum_with(ModelConfig::default());
    let list = p.harness.generate(Category::Sensor);
    assert_topologically_sound(&list);

    let published: Vec<&str> = list
        .iter()
        .map(|e| e.name.as_str())
        .filter(|name| !name.starts_with("_cse"))
        .collect();
    assert_eq!(published, vec!["segment1", "segment2", "energy"]);

    let coordinates: Vec<_> = p.harness.model().coordinates().cloned().collect();
    p.harness.set(coordinates[0].q(), 0.4);
    p.harness.set(coordinates[1].q(), -0.7);
    let y1 = -0.4f64.cos();
    let expected = 2.0 * 9.81 * (2.0 * y1 - 0.5 * (-0.3f64).cos());
    assert!((p.harness.scalar(&p.energy) - expected).abs() < 1e-12);
}

#[test]
fn test_energy_evaluates_at_configuration() {
    let mut p = pendulum();
    let (q1, q2) = (0.4f64, -0.7f64);
    let coordinates: Vec<_> = p.harness.model().coordinates().cloned().collect();
    p.harness.set(coordinates[0].q(), q1);
    p.harness.set(coordinates[1].q(), q2);

    let y1 = -q1.cos();
    let y2 = y1 - 0.5 * (q1 + q2).cos();
    let expected = 2.0 * 9.81 * (y1 + y2);
    assert!((p.harness.scalar(&p.energy) - expected).abs() < 1e-12);

    // moving only the lower joint leaves segment 1 alone
    let before = p.harness.numbers(&p.segment1);
    p.harness.set(coordinates[1].q(), 0.3);
    assert_eq!(p.harness.numbers(&p.segment1), before);
    let y2 = y1 - 0.5 * (q1 + 0.3).cos();
    assert!((p.harness.numbers(&p.segment2)[1] - y2).abs() < 1e-12);
}

#[test]
fn test_parameter_output_contains_only_parameter_closure() {
    let mut p = pendulum();
    let list = p.harness.generate(Category::Parameter);
    let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["total_length"]);
}
