//! Planar four-bar closed through the model.

use linkage::Category;
use linkage_tests::{FourBarGeometry, FourBarRig, ModelHarness, assert_topologically_sound};

const BARS: FourBarGeometry = FourBarGeometry {
    crank: 1.0,
    coupler: 3.0,
    rocker: 2.5,
    ground: 3.0,
};

fn rig(u: f64) -> (ModelHarness, FourBarRig) {
    let mut harness = ModelHarness::new();
    let rig = BARS.close(&mut harness, "fourbar", u);
    (harness, rig)
}

fn dependent_positions(harness: &mut ModelHarness, rig: &FourBarRig) -> [f64; 2] {
    [harness.scalar(rig.coupler.q()), harness.scalar(rig.rocker.q())]
}

#[test]
fn test_matches_reference_solution_at_crank_angle() {
    let (mut harness, rig) = rig(0.3);
    let (coupler, rocker) = BARS.reference_solution(0.3);

    assert!((harness.scalar(rig.coupler.q()) - coupler).abs() < 1e-9);
    assert!((harness.scalar(rig.rocker.q()) - rocker).abs() < 1e-9);
    let bvu = harness.numbers(&rig.artifacts.bvu);
    assert_eq!(bvu.len(), 2);
    assert!(bvu.iter().all(|v| v.is_finite()));
}

#[test]
fn test_constraint_vanishes_along_the_crank_cycle() {
    let (mut harness, rig) = rig(0.0);
    for step in 0..24 {
        let u = step as f64 * std::f64::consts::TAU / 24.0;
        harness.set(rig.crank.q(), u);
        let residual = harness.residual(&rig.artifacts);
        assert!(residual < 1e-9, "u = {u}: |Φ| = {residual}");

        let (coupler, rocker) = BARS.reference_solution(u);
        let [b, d] = dependent_positions(&mut harness, &rig);
        let wrap = |a: f64| a.sin().atan2(a.cos());
        assert!(wrap(b - coupler).abs() < 1e-9);
        assert!(wrap(d - rocker).abs() < 1e-9);
    }
}

#[test]
fn test_velocity_map_matches_finite_difference() {
    let (u, ud, h) = (1.1, 0.37, 1e-6);
    let (mut harness, rig) = rig(u);
    harness.set(rig.crank.qd(), ud);
    let velocities = [harness.scalar(rig.coupler.qd()), harness.scalar(rig.rocker.qd())];

    harness.set(rig.crank.q(), u + h);
    let plus = dependent_positions(&mut harness, &rig);
    harness.set(rig.crank.q(), u - h);
    let minus = dependent_positions(&mut harness, &rig);

    for i in 0..2 {
        let expected = (plus[i] - minus[i]) / (2.0 * h) * ud;
        let error = (velocities[i] - expected).abs() / (1.0 + expected.abs());
        assert!(error < 1e-6, "{} vs {expected}", velocities[i]);
    }
}

#[test]
fn test_acceleration_matches_second_difference() {
    let (u0, w, alpha, h) = (2.0, -0.8, 1.5, 1e-3);
    let (mut harness, rig) = rig(u0);
    harness.set(rig.crank.qd(), w);
    harness.set(rig.crank.qdd(), alpha);
    let accelerations = [harness.scalar(rig.coupler.qdd()), harness.scalar(rig.rocker.qdd())];

    let mut at = |t: f64| {
        harness.set(rig.crank.q(), u0 + w * t + 0.5 * alpha * t * t);
        dependent_positions(&mut harness, &rig)
    };
    let (before, now, after) = (at(-h), at(0.0), at(h));

    for i in 0..2 {
        let expected = (after[i] - 2.0 * now[i] + before[i]) / (h * h);
        let error = (accelerations[i] - expected).abs() / (1.0 + expected.abs());
        assert!(error < 1e-5, "{} vs {expected}", accelerations[i]);
    }
}

#[test]
fn test_loop_equations_are_generated_in_order() {
    let (mut harness, rig) = rig(0.3);
    let list = harness.generate(Category::LoopInternal);
    assert_topologically_sound(&list);

    let position = |symbol: &linkage::Symbol| list.position(symbol).unwrap();
    assert!(position(&rig.artifacts.bvu) < position(rig.coupler.qd()));
    assert!(position(&rig.artifacts.b_prime) < position(rig.rocker.qdd()));
    let mut inputs: Vec<&str> = list.inputs.iter().map(|i| i.symbol.name()).collect();
    inputs.sort();
    assert_eq!(inputs, vec!["fourbar_qA", "fourbar_qA_d", "fourbar_qA_dd"]);
}

#[test]
fn test_reduced_dynamics_project_onto_crank() {
    let (mut harness, rig) = rig(0.9);
    harness.set(rig.crank.qd(), 0.0);
    harness.set(rig.crank.qdd(), 0.0);
    let coordinates = [rig.crank.clone(), rig.coupler.clone(), rig.rocker.clone()];
    let inertia = [0.2, 1.5, 0.7];
    let mass = linkage::Value::matrix(
        3,
        3,
        (0..9)
            .map(|k| {
                let (row, col) = (k / 3, k % 3);
                linkage::Expr::number(if row == col { inertia[row] } else { 0.0 })
            })
            .collect(),
    )
    .unwrap();
    let forces = linkage::Value::vector([1.0, -2.0, 0.5].map(linkage::Expr::number).to_vec());
    let bias = linkage::Value::zeros(3, 1);

    let reduced = harness
        .model_mut()
        .reduce_dynamics(&coordinates, &mass, &bias, &forces)
        .unwrap();
    assert_eq!(reduced.independent, vec![rig.crank.clone()]);

    let bvu = harness.numbers(&rig.artifacts.bvu);
    let expected_mass = inertia[0] + inertia[1] * bvu[0].powi(2) + inertia[2] * bvu[1].powi(2);
    let expected_forces = 1.0 - 2.0 * bvu[0] + 0.5 * bvu[1];
    assert!((harness.scalar(&reduced.mass) - expected_mass).abs() < 1e-12);
    assert!((harness.scalar(&reduced.forces) - expected_forces).abs() < 1e-12);

    // a crank at rest leaves no velocity-dependent bias
    let b_prime = harness.numbers(&rig.artifacts.b_prime);
    assert!(b_prime.iter().all(|v| v.abs() < 1e-15));
    assert!(harness.scalar(&reduced.bias).abs() < 1e-15);
}
