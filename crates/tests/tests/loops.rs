//! Loop topologies other than the four-bar, chained loops, and loop errors.

use linkage::{
    Axis, BoundaryFrame, ChainJoint, Coordinate, Error, Expr, JointId, LoopArtifacts, LoopSpec,
    LoopTopology, Posture, Value, point,
};
use linkage_loops::LoopError;
use linkage_tests::{FourBarGeometry, ModelHarness};

fn spec(
    name: &str,
    topology: LoopTopology,
    frame_a: BoundaryFrame,
    frame_b: BoundaryFrame,
    independent: Vec<JointId>,
    dependent: Vec<JointId>,
) -> LoopSpec {
    LoopSpec {
        name: name.to_string(),
        topology,
        frame_a,
        frame_b,
        independent,
        dependent,
    }
}

#[test]
fn test_slider_crank_closes_over_full_turn() {
    let mut harness = ModelHarness::new();
    let crank = harness.coordinate("crank");
    let swing = harness.coordinate("swing");
    let slide = harness.coordinate("slide");
    let ja = harness.joint(ChainJoint::revolute("crank", crank.clone(), Axis::Z));
    let jc = harness.joint(ChainJoint::revolute("swing", swing.clone(), Axis::Z).at(point(3.0, 0.0, 0.0)));
    let js = harness.joint(ChainJoint::prismatic("slide", slide.clone(), [1.0, 0.0, 0.0]).with_parent(jc));
    harness.set(crank.q(), 0.0);
    let artifacts = harness.close(spec(
        "slider_crank",
        LoopTopology::ThreeBarTrans,
        BoundaryFrame::on("pin", ja, point(1.0, 0.0, 0.0)),
        BoundaryFrame::on("block", js, point(0.0, 0.0, 0.0)),
        vec![ja],
        vec![js, jc],
    ));

    for step in 0..12 {
        let u = step as f64 * std::f64::consts::TAU / 12.0;
        harness.set(crank.q(), u);
        assert!(harness.residual(&artifacts) < 1e-9, "u = {u}");
        let (dx, dy) = (u.cos() - 3.0, u.sin());
        assert!((harness.scalar(slide.q()) - (dx * dx + dy * dy).sqrt()).abs() < 1e-12);
    }
}

#[test]
fn test_crank_slider_rates_over_full_turn() {
    let mut harness = ModelHarness::new();
    let crank = harness.coordinate("crank");
    let slide = harness.coordinate("slide");
    let rod = harness.coordinate("rod");
    let ja = harness.joint(ChainJoint::revolute("crank", crank.clone(), Axis::Z));
    let jc = harness.joint(ChainJoint::prismatic("slide", slide.clone(), [1.0, 0.0, 0.0]).at(point(0.0, 0.3, 0.0)));
    let jb = harness.joint(ChainJoint::revolute("rod", rod.clone(), Axis::Z).with_parent(jc));
    harness.set_motion(&crank, 0.0, 1.2, 0.0);
    let artifacts = harness.close(spec(
        "piston",
        LoopTopology::CrankSlider {
            posture: Posture::Positive,
        },
        BoundaryFrame::on("crank_pin", ja, point(1.0, 0.0, 0.0)),
        BoundaryFrame::on("rod_end", jb, point(3.5, 0.0, 0.0)),
        vec![ja],
        vec![jc, jb],
    ));

    let h = 1e-6;
    for step in 0..8 {
        let u = step as f64 * std::f64::consts::TAU / 8.0;
        harness.set(crank.q(), u);
        assert!(harness.residual(&artifacts) < 1e-9, "u = {u}");
        let rate = harness.scalar(slide.qd());

        harness.set(crank.q(), u + h);
        let ahead = harness.scalar(slide.q());
        harness.set(crank.q(), u - h);
        let behind = harness.scalar(slide.q());
        let expected = 1.2 * (ahead - behind) / (2.0 * h);
        assert!((rate - expected).abs() < 1e-6, "u = {u}: {rate} vs {expected}");
    }
}

struct Steering {
    harness: ModelHarness,
    artifacts: LoopArtifacts,
    rack: Coordinate,
    tie_rod: Coordinate,
    knuckle: Coordinate,
}

/// Rack along x with tie rod and steering arm reaching a kingpin; `side`
/// mirrors the linkage across the rack.
fn steering(side: f64, posture: Posture) -> Steering {
    let mut harness = ModelHarness::new();
    let rack = harness.coordinate("rack");
    let tie_rod = harness.coordinate("tie_rod");
    let knuckle = harness.coordinate("knuckle");
    let jr = harness.joint(ChainJoint::prismatic("rack", rack.clone(), [1.0, 0.0, 0.0]));
    let jb = harness.joint(
        ChainJoint::revolute("tie_rod", tie_rod.clone(), Axis::Z)
            .with_parent(jr)
            .at(point(1.0, 0.0, 0.0)),
    );
    let jc = harness.joint(
        ChainJoint::revolute("knuckle", knuckle.clone(), Axis::Z)
            .with_parent(jb)
            .at(point(0.8, side * 0.3, 0.0)),
    );
    harness.set(rack.q(), 0.0);
    let artifacts = harness.close(spec(
        "steering",
        LoopTopology::Steering { posture },
        BoundaryFrame::on_root("kingpin", point(2.0, side * 0.6, 0.0)),
        BoundaryFrame::on("steering_arm", jc, point(0.5, 0.0, 0.0)),
        vec![jr],
        vec![jb, jc],
    ));
    Steering {
        harness,
        artifacts,
        rack,
        tie_rod,
        knuckle,
    }
}

#[test]
fn test_steering_closes_across_rack_travel() {
    let mut left = steering(1.0, Posture::Positive);
    for step in -4..=4 {
        let s = step as f64 * 0.04;
        left.harness.set(left.rack.q(), s);
        assert!(left.harness.residual(&left.artifacts) < 1e-9, "rack = {s}");
    }
}

#[test]
fn test_mirrored_steering_takes_other_posture() {
    let mut left = steering(1.0, Posture::Positive);
    let mut right = steering(-1.0, Posture::Negative);
    for step in -4..=4 {
        let s = step as f64 * 0.04;
        left.harness.set(left.rack.q(), s);
        right.harness.set(right.rack.q(), s);
        assert!(right.harness.residual(&right.artifacts) < 1e-9, "rack = {s}");
        for (l, r) in [(&left.tie_rod, &right.tie_rod), (&left.knuckle, &right.knuckle)] {
            let (l, r) = (left.harness.scalar(l.q()), right.harness.scalar(r.q()));
            assert!((l + r).abs() < 1e-12, "rack = {s}: {l} vs {r}");
        }
    }
}

struct Platform {
    harness: ModelHarness,
    pose: Vec<Coordinate>,
    leg: Vec<Coordinate>,
}

/// Six-axis platform (three slides, three rotations) with one leg from a
/// base point to a point on the platform.
fn platform(offset: f64) -> Platform {
    let mut harness = ModelHarness::new();
    let pose: Vec<Coordinate> = ["x", "y", "z", "roll", "pitch", "yaw"]
        .into_iter()
        .map(|name| harness.coordinate(name))
        .collect();
    let mut parent: Option<JointId> = None;
    let mut branch = Vec::new();
    for (i, coordinate) in pose.iter().enumerate() {
        let joint = if i < 3 {
            let mut direction = [0.0; 3];
            direction[i] = 1.0;
            ChainJoint::prismatic(coordinate.name(), coordinate.clone(), direction)
        } else {
            ChainJoint::revolute(coordinate.name(), coordinate.clone(), [Axis::X, Axis::Y, Axis::Z][i - 3])
        };
        let joint = match parent {
            Some(parent) => joint.with_parent(parent),
            None => joint,
        };
        let id = harness.joint(joint);
        branch.push(id);
        parent = Some(id);
    }

    let leg: Vec<Coordinate> = ["leg_len", "leg_y", "leg_z"]
        .into_iter()
        .map(|name| harness.coordinate(name))
        .collect();
    let j_y = harness.joint(
        ChainJoint::revolute("leg_y", leg[1].clone(), Axis::Y).at(point(-1.0, 0.2, 0.1)),
    );
    let j_z = harness.joint(
        ChainJoint::revolute("leg_z", leg[2].clone(), Axis::Z)
            .with_parent(j_y)
            .at(point(offset, 0.0, 0.0)),
    );
    let j_len = harness.joint(
        ChainJoint::prismatic("leg_len", leg[0].clone(), [1.0, 0.0, 0.0])
            .with_parent(j_z)
            .at(point(0.1, 0.0, 0.0)),
    );

    let values = [0.2, 1.5, 0.4, 0.1, -0.2, 0.3];
    for (coordinate, value) in pose.iter().zip(values) {
        harness.set(coordinate.q(), value);
    }
    let topology = if offset == 0.0 {
        LoopTopology::Hexapod
    } else {
        LoopTopology::HexapodWithOffset
    };
    harness.close(spec(
        "leg",
        topology,
        BoundaryFrame::on("anchor", branch[5], point(0.3, 0.1, 0.0)),
        BoundaryFrame::on("tip", j_len, point(0.05, 0.0, 0.0)),
        branch,
        vec![j_y, j_z, j_len],
    ));
    Platform { harness, pose, leg }
}

/// Compare the leg's rates with differences of its positions along
/// `u(t) = u0 + w·t + α·t²/2`.
fn check_leg_rates(mut p: Platform) {
    let u0 = [0.2, 1.5, 0.4, 0.1, -0.2, 0.3];
    let w = [0.1, 0.05, -0.2, 0.3, 0.1, -0.1];
    let alpha = [0.0, 0.2, 0.1, -0.1, 0.05, 0.3];
    for (i, coordinate) in p.pose.iter().enumerate() {
        p.harness.set_motion(coordinate, u0[i], w[i], alpha[i]);
    }
    let artifacts = p.harness.model().loop_artifacts("leg").unwrap().clone();
    assert!(p.harness.residual(&artifacts) < 1e-9);

    let leg = p.leg.clone();
    let velocities: Vec<f64> = leg.iter().map(|c| p.harness.scalar(c.qd())).collect();
    let accelerations: Vec<f64> = leg.iter().map(|c| p.harness.scalar(c.qdd())).collect();

    let mut at = |t: f64| -> Vec<f64> {
        for (i, coordinate) in p.pose.iter().enumerate() {
            p.harness
                .set(coordinate.q(), u0[i] + w[i] * t + 0.5 * alpha[i] * t * t);
        }
        leg.iter().map(|c| p.harness.scalar(c.q())).collect()
    };

    let h = 1e-6;
    let (minus, plus) = (at(-h), at(h));
    for i in 0..3 {
        let expected = (plus[i] - minus[i]) / (2.0 * h);
        let error = (velocities[i] - expected).abs() / (1.0 + expected.abs());
        assert!(error < 1e-6, "{}: {} vs {expected}", leg[i].name(), velocities[i]);
    }

    let h = 1e-3;
    let (before, now, after) = (at(-h), at(0.0), at(h));
    for i in 0..3 {
        let expected = (after[i] - 2.0 * now[i] + before[i]) / (h * h);
        let error = (accelerations[i] - expected).abs() / (1.0 + expected.abs());
        assert!(error < 1e-5, "{}: {} vs {expected}", leg[i].name(), accelerations[i]);
    }
}

#[test]
fn test_hexapod_leg_rates_match_differences() {
    check_leg_rates(platform(0.0));
}

#[test]
fn test_offset_hexapod_leg_rates_match_differences() {
    check_leg_rates(platform(0.15));
}

#[test]
fn test_loop_driven_by_another_loop() {
    let mut harness = ModelHarness::new();
    let rig = FourBarGeometry {
        crank: 1.0,
        coupler: 3.0,
        rocker: 2.5,
        ground: 3.0,
    }
    .close(&mut harness, "fourbar", 0.6);
    harness.set(rig.crank.qd(), 0.8);
    harness.set(rig.crank.qdd(), 0.0);

    let output = harness.coordinate("output");
    let jd = harness.model().chain().find("fourbar_D").unwrap();
    let jo = harness.joint(ChainJoint::revolute("output", output.clone(), Axis::Z).at(point(5.0, 0.0, 0.0)));
    harness.close(spec(
        "gear",
        LoopTopology::Transmission { ratio: -0.5 },
        BoundaryFrame::on("rocker_gear", jd, point(0.0, 0.0, 0.0)),
        BoundaryFrame::on("output_gear", jo, point(0.0, 0.0, 0.0)),
        vec![jd],
        vec![jo],
    ));

    let rocker = harness.scalar(rig.rocker.q());
    let rocker_rate = harness.scalar(rig.rocker.qd());
    assert!((harness.scalar(output.q()) + 0.5 * rocker).abs() < 1e-12);
    assert!((harness.scalar(output.qd()) + 0.5 * rocker_rate).abs() < 1e-12);
    let open: Vec<&str> = harness
        .model()
        .independent_coordinates()
        .map(Coordinate::name)
        .collect();
    assert_eq!(open, vec!["fourbar_qA"]);
}

#[test]
fn test_reduced_dynamics_through_chained_loops() {
    let mut harness = ModelHarness::new();
    let rig = FourBarGeometry {
        crank: 1.0,
        coupler: 3.0,
        rocker: 2.5,
        ground: 3.0,
    }
    .close(&mut harness, "fourbar", 0.6);
    harness.set(rig.crank.qd(), 0.8);
    harness.set(rig.crank.qdd(), 0.0);

    let ratio = -0.5;
    let output = harness.coordinate("output");
    let jd = harness.model().chain().find("fourbar_D").unwrap();
    let jo = harness.joint(ChainJoint::revolute("output", output.clone(), Axis::Z).at(point(5.0, 0.0, 0.0)));
    harness.close(spec(
        "gear",
        LoopTopology::Transmission { ratio },
        BoundaryFrame::on("rocker_gear", jd, point(0.0, 0.0, 0.0)),
        BoundaryFrame::on("output_gear", jo, point(0.0, 0.0, 0.0)),
        vec![jd],
        vec![jo],
    ));

    let coordinates = [rig.crank.clone(), rig.coupler.clone(), rig.rocker.clone(), output.clone()];
    let masses = [2.0, 1.5, 0.5, 3.0];
    let loads = [1.0, -2.0, 0.5, 4.0];
    let mut mass = vec![Expr::zero(); 16];
    for (i, m) in masses.iter().enumerate() {
        mass[i * 5] = Expr::number(*m);
    }
    let mass = Value::matrix(4, 4, mass).unwrap();
    let forces = Value::vector(loads.map(Expr::number).to_vec());
    let reduced = harness
        .model_mut()
        .reduce_dynamics(&coordinates, &mass, &Value::zeros(4, 1), &forces)
        .unwrap();
    assert_eq!(reduced.independent, vec![rig.crank.clone()]);

    // with the crank at constant speed, J = q̇ / q̇_A and b = q̈
    let rates: Vec<f64> = coordinates
        .iter()
        .map(|c| harness.scalar(c.qd()) / 0.8)
        .collect();
    let offsets: Vec<f64> = coordinates.iter().map(|c| harness.scalar(c.qdd())).collect();
    assert!((rates[3] - ratio * rates[2]).abs() < 1e-12);

    let expected_mass: f64 = (0..4).map(|i| masses[i] * rates[i] * rates[i]).sum();
    let expected_bias: f64 = (0..4).map(|i| masses[i] * rates[i] * offsets[i]).sum();
    let expected_forces: f64 = (0..4).map(|i| loads[i] * rates[i]).sum();
    assert!((harness.scalar(&reduced.mass) - expected_mass).abs() < 1e-9);
    assert!((harness.scalar(&reduced.bias) - expected_bias).abs() < 1e-9);
    assert!((harness.scalar(&reduced.forces) - expected_forces).abs() < 1e-9);
}

/// Four-bar joints registered without closing the loop.
fn four_bar_joints(harness: &mut ModelHarness, bars: [f64; 4]) -> (Coordinate, [JointId; 3]) {
    let [crank, _, _, ground] = bars;
    let qa = harness.coordinate("qA");
    let qb = harness.coordinate("qB");
    let qd = harness.coordinate("qD");
    let ja = harness.joint(ChainJoint::revolute("A", qa.clone(), Axis::Z));
    let jb = harness.joint(
        ChainJoint::revolute("B", qb, Axis::Z)
            .with_parent(ja)
            .at(point(crank, 0.0, 0.0)),
    );
    let jd = harness.joint(ChainJoint::revolute("D", qd, Axis::Z).at(point(ground, 0.0, 0.0)));
    (qa, [ja, jb, jd])
}

fn four_bar_spec(bars: [f64; 4], joints: [JointId; 3]) -> LoopSpec {
    let [_, coupler, rocker, _] = bars;
    let [ja, jb, jd] = joints;
    spec(
        "fourbar",
        LoopTopology::FourBar {
            posture: Posture::Negative,
        },
        BoundaryFrame::on("coupler_end", jb, point(coupler, 0.0, 0.0)),
        BoundaryFrame::on("rocker_end", jd, point(rocker, 0.0, 0.0)),
        vec![ja],
        vec![jb, jd],
    )
}

#[test]
fn test_world_fixed_frame_aborts_loop() {
    let bars = [1.0, 3.0, 2.5, 3.0];
    let mut harness = ModelHarness::new();
    let (_, joints) = four_bar_joints(&mut harness, bars);
    let mut spec = four_bar_spec(bars, joints);
    spec.frame_b = BoundaryFrame::on_root("ground_point", point(5.5, 0.0, 0.0));

    let err = harness.model_mut().register_loop(spec).unwrap_err();
    assert_eq!(
        err,
        Error::Loop(LoopError::DirectWorldConnection {
            loop_name: "fourbar".to_string(),
            frame: "ground_point".to_string(),
        })
    );
    assert!(harness.model().loop_artifacts("fourbar").is_none());
}

#[test]
fn test_unreachable_configuration_reports_coordinates() {
    let bars = [1.0, 1.0, 1.0, 2.5];
    let mut harness = ModelHarness::new();
    let (qa, joints) = four_bar_joints(&mut harness, bars);
    harness.set(qa.q(), std::f64::consts::PI);

    let err = harness
        .model_mut()
        .register_loop(four_bar_spec(bars, joints))
        .unwrap_err();
    let message = err.to_string();
    let Error::Loop(LoopError::KinematicSingularity {
        loop_name,
        configuration,
        ..
    }) = err
    else {
        panic!("expected a singularity, got {err:?}");
    };
    assert_eq!(loop_name, "fourbar");
    assert_eq!(configuration[0], ("qA".to_string(), std::f64::consts::PI));
    assert!(message.starts_with("loop fourbar: kinematic singularity"));
    assert!(message.contains("qA="));
    assert!(harness.model().loop_artifacts("fourbar").is_none());
}

#[test]
fn test_reachable_configuration_closes() {
    let bars = [1.0, 1.0, 1.0, 2.5];
    let mut harness = ModelHarness::new();
    let (qa, joints) = four_bar_joints(&mut harness, bars);
    harness.set(qa.q(), 0.2);

    let artifacts = harness
        .model_mut()
        .register_loop(four_bar_spec(bars, joints))
        .unwrap();
    assert!(harness.residual(&artifacts) < 1e-9);
}

#[test]
fn test_moving_into_unreachable_configuration_is_reported() {
    let bars = [2.0, 2.0, 1.5, 3.0];
    let mut harness = ModelHarness::new();
    let (qa, joints) = four_bar_joints(&mut harness, bars);
    harness.set(qa.q(), 0.3);
    let artifacts = harness
        .model_mut()
        .register_loop(four_bar_spec(bars, joints))
        .unwrap();
    assert_eq!(harness.numbers(&artifacts.bvu).len(), 2);

    harness.set(qa.q(), std::f64::consts::PI);
    let err = harness.model_mut().get_numbers(&artifacts.bvu).unwrap_err();
    let Error::Loop(LoopError::KinematicSingularity {
        loop_name,
        configuration,
        ..
    }) = err
    else {
        panic!("expected a singularity, got {err:?}");
    };
    assert_eq!(loop_name, "fourbar");
    assert_eq!(configuration[0], ("qA".to_string(), std::f64::consts::PI));
    assert!(harness.model_mut().get_value(&artifacts.bvu).is_err());

    harness.set(qa.q(), 0.3);
    assert!(harness.residual(&artifacts) < 1e-9);
    assert!(harness.numbers(&artifacts.bvu).iter().all(|v| v.is_finite()));
}

#[test]
fn test_wrong_joint_kind_is_unsupported() {
    let mut harness = ModelHarness::new();
    let qa = harness.coordinate("qA");
    let qb = harness.coordinate("qB");
    let qd = harness.coordinate("qD");
    let ja = harness.joint(ChainJoint::prismatic("A", qa, [1.0, 0.0, 0.0]));
    let jb = harness.joint(ChainJoint::revolute("B", qb, Axis::Z).with_parent(ja));
    let jd = harness.joint(ChainJoint::revolute("D", qd, Axis::Z).at(point(3.0, 0.0, 0.0)));

    let err = harness
        .model_mut()
        .register_loop(four_bar_spec([1.0, 3.0, 2.5, 3.0], [ja, jb, jd]))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Loop(LoopError::UnsupportedTopology {
            topology: "four-bar",
            ..
        })
    ));
}
