//! End-to-end runs through the DSL, the netlist and the headless engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;
use powersim_core::engine::{EngineState, MetadataValue};
use powersim_core::solver::InitMode;
use powersim_core::{
    dsl, HeadlessSimulationEngine, Netlist, SimError, SimulationConfig, SimulationStatus,
    SolverType,
};

const RC_CIRCUIT: &str = "\
* RC charging, tau = 1 ms
.probe out I(C1)
V1 in  0   DC 10
R1 in  out 1k
C1 out 0   1u
";

fn netlist(src: &str) -> Netlist {
    Netlist::from_ast(&dsl::parse(src).unwrap()).unwrap()
}

#[test]
fn rc_charging_follows_exponential() {
    let engine = HeadlessSimulationEngine::new();
    let mut circuit = netlist(RC_CIRCUIT);
    let config = SimulationConfig::new().with_step_width(1e-6).with_duration(5e-3);

    let result = engine.run_netlist(&mut circuit, &config);
    assert!(result.is_success(), "{}", result);
    assert_eq!(result.total_steps, 5000);

    let out = result.signal("out").unwrap();
    let times = result.times();
    assert_eq!(out.len(), 5001);
    assert!(out[0].abs() < 1e-12);
    assert!(out.windows(2).all(|w| w[1] >= w[0]), "charging curve must not fall");

    for (&t, &v) in times.iter().zip(&out) {
        let expected = 10.0 * (1.0 - (-t / 1e-3).exp());
        assert_relative_eq!(v, expected, epsilon = 1e-9, max_relative = 0.02);
    }

    let i_c = result.signal("I(C1)").unwrap();
    assert_relative_eq!(i_c[1], 10e-3, max_relative = 0.01);
    assert!(i_c[5000] < 1e-4);
}

#[test]
fn solvers_agree_on_rc_charging() {
    let engine = HeadlessSimulationEngine::new();
    let mut finals = Vec::new();
    for solver in SolverType::ALL {
        let mut circuit = netlist(RC_CIRCUIT);
        let config = SimulationConfig::new()
            .with_step_width(1e-6)
            .with_duration(2e-3)
            .with_solver_type(solver);
        let result = engine.run_netlist(&mut circuit, &config);
        assert!(result.is_success(), "{}: {}", solver, result);
        finals.push(result.data.last_row().unwrap()[0]);
    }
    let expected = 10.0 * (1.0 - (-2.0f64).exp());
    for value in finals {
        assert_relative_eq!(value, expected, max_relative = 0.01);
    }
}

#[test]
fn half_wave_rectifier_blocks_negative_half() {
    let engine = HeadlessSimulationEngine::new();
    let mut circuit = netlist("V1 a 0 AC 10 50\nD1 a b\nR1 b 0 100\n.probe b");
    let config = SimulationConfig::new().with_step_width(10e-6).with_duration(20e-3);

    let result = engine.run_netlist(&mut circuit, &config);
    assert!(result.is_success(), "{}", result);

    let b = result.signal("b").unwrap();
    let peak = b.iter().cloned().fold(f64::MIN, f64::max);
    let trough = b.iter().cloned().fold(f64::MAX, f64::min);
    assert!(peak > 9.0 && peak < 9.5, "peak {}", peak);
    assert!(trough > -0.01, "trough {}", trough);
}

#[test]
fn buck_converter_settles_near_duty_ratio() {
    let src = "\
V1 in  0  24
S1 in  sw freq=10k duty=0.5
D1 0   sw
L1 sw  out 1m
C1 out 0   100u
R1 out 0   10
.probe out
";
    let engine = HeadlessSimulationEngine::new();
    let mut circuit = netlist(src);
    let config = SimulationConfig::new().with_step_width(1e-6).with_duration(20e-3);

    let result = engine.run_netlist(&mut circuit, &config);
    assert!(result.is_success(), "{}", result);

    // Average over the last 1 ms, ten switching periods.
    let out = result.signal("out").unwrap();
    let tail = &out[out.len() - 1000..];
    let average = tail.iter().sum::<f64>() / tail.len() as f64;
    assert!(average > 10.0 && average < 12.5, "average output {}", average);

    match result.metadata.get("cache_hits") {
        Some(MetadataValue::Integer(hits)) => assert!(*hits > 1000),
        other => panic!("unexpected cache metadata {:?}", other),
    }
}

#[test]
fn transformer_steps_up_voltage() {
    let src = "\
V1 p 0 AC 1 1k
R0 p a 1m
L1 a 0 1m
L2 s 0 4m
R2 s 0 1meg
K1 L1 L2 0.999
.probe s
";
    let engine = HeadlessSimulationEngine::new();
    let mut circuit = netlist(src);
    let config = SimulationConfig::new()
        .with_step_width(1e-7)
        .with_duration(1e-3)
        .with_solver_type(SolverType::Trapezoidal)
        .with_logging_interval(10);

    let result = engine.run_netlist(&mut circuit, &config);
    assert!(result.is_success(), "{}", result);
    let peak = result.signal("s").unwrap().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    assert!((peak - 2.0).abs() < 0.05, "secondary peak {}", peak);
}

#[test]
fn invalid_coupling_is_rejected() {
    let ast = dsl::parse("V1 a 0 1\nR1 a b 1\nL1 b 0 1m\nK1 L1 R1 0.5").unwrap();
    assert!(matches!(Netlist::from_ast(&ast), Err(SimError::InvalidCoupling { .. })));
}

#[test]
fn unknown_probe_fails_the_run() {
    let engine = HeadlessSimulationEngine::new();
    let mut circuit = netlist("V1 a 0 1\nR1 a 0 1\n.probe nowhere");
    let result = engine.run_netlist(&mut circuit, &SimulationConfig::new());

    assert_eq!(result.status, SimulationStatus::Failed);
    match &result.error {
        Some(SimError::LabelNotFound { label, component }) => {
            assert_eq!(label, "nowhere");
            assert_eq!(component, "probe");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn run_simulation_reads_file_and_applies_overrides() {
    let path = std::env::temp_dir().join(format!("powersim_divider_{}.cir", std::process::id()));
    std::fs::write(&path, "V1 in 0 12\nR1 in out 1k\nR2 out 0 1k\n.probe out\n").unwrap();

    let engine = HeadlessSimulationEngine::new();
    let config = SimulationConfig::new()
        .with_circuit_file(&path)
        .with_step_width(1e-6)
        .with_duration(10e-6)
        .with_parameter("R2", 2e3)
        .with_parameter("V1", 9.0);
    let result = engine.run_simulation(&config);
    std::fs::remove_file(&path).unwrap();

    assert!(result.is_success(), "{}", result);
    assert_relative_eq!(result.data.last_row().unwrap()[0], 6.0, epsilon = 1e-9);
    assert_eq!(result.metadata["overrides"], MetadataValue::Integer(2));
    assert_eq!(result.metadata["source_file"], MetadataValue::Text(path.display().to_string()));
}

#[test]
fn continued_run_resumes_from_stored_state() {
    let engine = HeadlessSimulationEngine::new();
    let mut circuit = netlist(RC_CIRCUIT);
    let config = SimulationConfig::new().with_step_width(1e-6).with_duration(1e-3);

    let first = engine.run_netlist(&mut circuit, &config);
    assert!(first.is_success(), "{}", first);
    let end_of_first = first.data.last_row().unwrap()[0];

    let resume = config.clone().with_init_mode(InitMode::Continue);
    let second = engine.run_netlist(&mut circuit, &resume);
    assert!(second.is_success(), "{}", second);
    let resumed = second.signal("out").unwrap();
    assert_relative_eq!(resumed[0], end_of_first, epsilon = 1e-9);

    let expected = 10.0 * (1.0 - (-2.0f64).exp());
    assert_relative_eq!(*resumed.last().unwrap(), expected, max_relative = 0.02);
}

#[test]
fn busy_engine_rejects_and_cancel_stops_run() {
    let engine = Arc::new(HeadlessSimulationEngine::new());
    let finished = Arc::new(AtomicBool::new(false));

    let worker = {
        let engine = Arc::clone(&engine);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            let mut circuit = netlist(RC_CIRCUIT);
            let config = SimulationConfig::new()
                .with_step_width(1e-9)
                .with_duration(1.0)
                .with_data_logging(false);
            let result = engine.run_netlist(&mut circuit, &config);
            finished.store(true, Ordering::SeqCst);
            result
        })
    };

    while engine.current_step() < 2000 && !finished.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    let mut other = netlist("V1 a 0 1\nR1 a 0 1");
    let rejected = engine.run_netlist(&mut other, &SimulationConfig::new());
    assert_eq!(rejected.status, SimulationStatus::Failed);
    assert!(matches!(rejected.error, Some(SimError::EngineBusy { .. })));

    engine.cancel();
    let result = worker.join().unwrap();
    assert_eq!(result.status, SimulationStatus::Cancelled);
    assert!(result.total_steps >= 2000);
    assert!(result.simulated_time < 1.0);
    assert!(result.error.is_none());
    assert_eq!(engine.state(), EngineState::Idle);
}
