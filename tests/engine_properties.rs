//! Whole-machine behavior: clock, latency, feedback, reset and subcircuits

use approx::assert_relative_eq;
use philbrick::prelude::*;
use philbrick::{ComponentKind, Configurable, EngineStateError, Params, TemplateError, WiringError};

/// x'' = -x with x(0) = 0, x'(0) = 1. Over one period returns the worst
/// deviation of INT1 from sin(t) and of INT2 from cos(t).
fn oscillator_error(dt: f64) -> (f64, f64) {
    let mut m = Machine::new(dt).unwrap();
    m.add("INT1", Integrator::new(0.0, 1.0)).unwrap();
    m.add("INT2", Integrator::new(1.0, 1.0)).unwrap();
    m.add("COEF", Coefficient::new(-1.0)).unwrap();
    m.connect("INT2.out", "INT1.in").unwrap();
    m.connect("COEF.out", "INT2.in").unwrap();
    m.connect("INT1.out", "COEF.in").unwrap();

    let steps = (2.0 * std::f64::consts::PI / dt).round() as u64;
    let (mut sin_err, mut cos_err): (f64, f64) = (0.0, 0.0);
    for _ in 0..steps {
        m.step();
        let t = m.current_time();
        let x = m.read_port("INT1.out").unwrap();
        let v = m.read_port("INT2.out").unwrap();
        sin_err = sin_err.max((x - t.sin()).abs());
        cos_err = cos_err.max((v - t.cos()).abs());
    }
    (sin_err, cos_err)
}

#[test]
fn test_clock_is_exact_multiple_of_dt() {
    let mut m = Machine::new(0.001).unwrap();
    m.add("C", Constant::new(1.0)).unwrap();
    m.run(1234);
    assert_eq!(m.steps(), 1234);
    assert_eq!(m.current_time(), 1234.0 * 0.001);

    for _ in 0..766 {
        m.step();
    }
    assert_eq!(m.current_time(), 2000.0 * 0.001);
}

#[test]
fn test_integrator_of_constant() {
    let mut m = Machine::new(0.01).unwrap();
    m.add("C", Constant::new(2.5)).unwrap();
    m.add("INT", Integrator::default()).unwrap();
    m.connect("C.out", "INT.in").unwrap();
    m.run(400);
    assert_relative_eq!(m.read_port("INT.out").unwrap(), 2.5 * 400.0 * 0.01, epsilon = 1e-9);
}

#[test]
fn test_combinational_chain_settles_one_hop_per_step() {
    let mut m = Machine::new(0.1).unwrap();
    m.add("C", Constant::new(1.0)).unwrap();
    m.add("K1", Coefficient::new(2.0)).unwrap();
    m.add("K2", Coefficient::new(3.0)).unwrap();
    m.connect("C.out", "K1.in").unwrap();
    m.connect("K1.out", "K2.in").unwrap();

    m.step();
    assert_eq!(m.read_port("K1.out").unwrap(), 2.0);
    assert_eq!(m.read_port("K2.out").unwrap(), 0.0);
    m.step();
    assert_eq!(m.read_port("K2.out").unwrap(), 6.0);
}

#[test]
fn test_insertion_order_does_not_change_results() {
    let build = |reversed: bool| {
        let mut m = Machine::new(0.1).unwrap();
        let mut parts: Vec<(&str, ComponentKind)> = vec![
            ("C", Constant::new(1.0).into()),
            ("K1", Coefficient::new(2.0).into()),
            ("K2", Coefficient::new(3.0).into()),
        ];
        if reversed {
            parts.reverse();
        }
        for (name, part) in parts {
            m.add(name, part).unwrap();
        }
        m.connect("C.out", "K1.in").unwrap();
        m.connect("K1.out", "K2.in").unwrap();
        m
    };
    let mut a = build(false);
    let mut b = build(true);
    for _ in 0..3 {
        a.step();
        b.step();
        assert_eq!(a.read_port("K2.out").unwrap(), b.read_port("K2.out").unwrap());
    }
}

#[test]
fn test_fan_in_rejected_graph_unchanged() {
    let mut m = Machine::default();
    m.add("A", Constant::new(1.0)).unwrap();
    m.add("B", Constant::new(2.0)).unwrap();
    m.add("K", Coefficient::new(1.0)).unwrap();
    m.connect("A.out", "K.in").unwrap();
    let before = m.connections();

    let err = m.connect("B.out", "K.in").unwrap_err();
    assert_eq!(
        err,
        WiringError::FanIn {
            dest: "K.in".to_string(),
            existing: "A.out".to_string(),
        }
    );
    assert_eq!(m.connections(), before);

    m.run(3);
    assert_eq!(m.read_port("K.out").unwrap(), 1.0);
}

#[test]
fn test_reset_replays_bit_identically() {
    let mut m = Machine::new(0.01).unwrap();
    m.add("SRC", SineSource::new(1.5, 2.0, 0.3).unwrap()).unwrap();
    m.add("INT", Integrator::new(0.5, 1.0)).unwrap();
    m.add("LIM", Limiter::new(-0.4, 0.4).unwrap()).unwrap();
    m.add("MUL", Multiplier::new(1.0)).unwrap();
    m.connect("SRC.out", "INT.in").unwrap();
    m.connect("INT.out", "LIM.in").unwrap();
    m.connect("LIM.out", "MUL.x").unwrap();
    m.connect("SRC.out", "MUL.y").unwrap();

    let record = |m: &mut Machine| -> Vec<f64> {
        (0..500)
            .map(|_| {
                m.step();
                m.read_port("MUL.out").unwrap()
            })
            .collect()
    };
    let first = record(&mut m);
    m.reset();
    assert_eq!(m.current_time(), 0.0);
    let second = record(&mut m);
    assert_eq!(first, second);
}

#[test]
fn test_harmonic_oscillator_tracks_sine_and_cosine() {
    let (coarse_sin, coarse_cos) = oscillator_error(0.01);
    let (fine_sin, fine_cos) = oscillator_error(0.001);
    assert!(fine_sin < 0.02, "sine error {} at dt = 0.001", fine_sin);
    assert!(fine_cos < 0.02, "cosine error {} at dt = 0.001", fine_cos);
    assert!(
        fine_sin < coarse_sin,
        "sine error did not shrink with dt: {} vs {}",
        fine_sin,
        coarse_sin
    );
    assert!(
        fine_cos < coarse_cos,
        "cosine error did not shrink with dt: {} vs {}",
        fine_cos,
        coarse_cos
    );
}

#[test]
fn test_nan_signal_does_not_stop_the_machine() {
    let mut m = Machine::default();
    m.add("BIG", Constant::new(1e308)).unwrap();
    m.add("K1", Coefficient::new(10.0)).unwrap();
    m.add("K0", Coefficient::new(0.0)).unwrap();
    m.add("F", PiecewiseLinear::from_params(&Params::new()).unwrap()).unwrap();
    m.connect("BIG.out", "K1.in").unwrap();
    m.connect("K1.out", "K0.in").unwrap();
    m.connect("K0.out", "F.in").unwrap();

    m.run(5);
    assert!(m.read_port("K1.out").unwrap().is_infinite());
    assert!(m.read_port("F.out").unwrap().is_nan());
    assert_eq!(m.steps(), 5);
}

#[test]
fn test_two_softmax_instances_are_independent() {
    let mut m = Machine::default();
    m.add("A0", Constant::new(1.0)).unwrap();
    m.add("A1", Constant::new(2.0)).unwrap();
    m.add("Z", Constant::new(0.0)).unwrap();
    m.instantiate("Softmax", "S1").unwrap();
    m.instantiate("Softmax", "S2").unwrap();
    m.connect("A0.out", "S1.in0").unwrap();
    m.connect("A1.out", "S1.in1").unwrap();
    m.connect("Z.out", "S2.in0").unwrap();
    m.connect("Z.out", "S2.in1").unwrap();

    m.run(10);

    let e1 = 1f64.exp();
    let e2 = 2f64.exp();
    assert_relative_eq!(m.read_port("S1.out0").unwrap(), e1 / (e1 + e2), epsilon = 1e-12);
    assert_relative_eq!(m.read_port("S1.out1").unwrap(), e2 / (e1 + e2), epsilon = 1e-12);
    assert_relative_eq!(m.read_port("S2.out0").unwrap(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(m.read_port("S2.out1").unwrap(), 0.5, epsilon = 1e-12);

    // external input aliases the internal one
    assert_eq!(m.read_port("S1.in1").unwrap(), 2.0);
    assert_eq!(m.read_port("S1.EXP1.in").unwrap(), 2.0);
}

#[test]
fn test_attention_head() {
    let mut m = Machine::default();
    for (name, value) in [("Q0", 1.0), ("Q1", 2.0), ("K0", 3.0), ("K1", 4.0), ("V", 0.5)] {
        m.add(name, Constant::new(value)).unwrap();
    }
    m.instantiate("AttentionHead", "H").unwrap();
    for (src, port) in [("Q0", "q0"), ("Q1", "q1"), ("K0", "k0"), ("K1", "k1"), ("V", "v")] {
        m.connect(&format!("{}.out", src), &format!("H.{}", port)).unwrap();
    }
    m.run(5);
    assert_relative_eq!(m.read_port("H.out").unwrap(), 11.0 * 0.5, epsilon = 1e-12);
}

#[test]
fn test_internal_ports_readable_not_patchable() {
    let mut m = Machine::default();
    m.add("X", Constant::new(1.0)).unwrap();
    m.instantiate("Softmax", "S").unwrap();

    assert!(matches!(
        m.connect("X.out", "S.EXP0.in"),
        Err(WiringError::InternalPort(_))
    ));
    assert!(matches!(
        m.remove("S.DIV0"),
        Err(WiringError::InternalComponent { .. })
    ));
    m.run(3);
    assert_eq!(m.read_port("S.EXP0.out").unwrap(), 1.0);
}

#[test]
fn test_remove_instance_cleans_up() {
    let mut m = Machine::default();
    m.add("X", Constant::new(1.0)).unwrap();
    m.add("K", Coefficient::new(1.0)).unwrap();
    m.instantiate("Softmax", "S").unwrap();
    m.connect("X.out", "S.in0").unwrap();
    m.connect("S.out0", "K.in").unwrap();
    let total = m.len();

    m.remove("S").unwrap();
    assert_eq!(m.len(), total - 5);
    assert!(m.instances().is_empty());
    assert!(m.connections().is_empty());
    assert!(m.component("S.EXP0").is_none());
    assert!(matches!(
        m.read_port("S.out0"),
        Err(WiringError::UnknownComponent(_))
    ));

    // the freed name is available again
    m.instantiate("Softmax", "S").unwrap();
    m.connect("X.out", "S.in0").unwrap();
}

#[test]
fn test_remove_component_cleans_up() {
    let mut m = Machine::default();
    m.add("C", Constant::new(1.0)).unwrap();
    m.add("K1", Coefficient::new(1.0)).unwrap();
    m.add("K2", Coefficient::new(1.0)).unwrap();
    m.connect("C.out", "K1.in").unwrap();
    m.connect("K1.out", "K2.in").unwrap();

    m.remove("K1").unwrap();
    assert!(m.connections().is_empty());
    assert!(matches!(m.remove("K1"), Err(WiringError::UnknownComponent(_))));
    m.run(2);
    assert_eq!(m.read_port("K2.out").unwrap(), 0.0);
}

#[test]
fn test_failed_instantiation_adds_nothing() {
    let mut m = Machine::default();
    m.add("TAKEN", Constant::new(1.0)).unwrap();
    let before = m.len();

    let err = m.instantiate("Softmax", "TAKEN").unwrap_err();
    assert_eq!(
        err,
        Error::Template(TemplateError::NameTaken("TAKEN".to_string()))
    );
    assert_eq!(m.len(), before);
    assert!(m.instances().is_empty());

    let err = m.instantiate("Missing", "M").unwrap_err();
    assert!(matches!(err, Error::Template(TemplateError::UnknownTemplate(_))));
    assert_eq!(m.len(), before);
}

#[test]
fn test_engine_state_error_messages() {
    let err = Error::from(EngineStateError::RunInProgress("reset"));
    assert_eq!(err.to_string(), "cannot reset while a run is in progress");
}
