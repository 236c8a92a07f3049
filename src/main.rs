//! Powersim - transient circuit simulator for power electronics
//!
//! # Usage
//!
//! ```bash
//! powersim buck.cir --dt 100n --duration 2m --solver trz --set L1.ic=1.5
//! RUST_LOG=powersim_core=debug powersim buck.cir
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use powersim_core::{
    dsl,
    engine::SimulationStatus,
    error::{Result, SimError},
    HeadlessSimulationEngine, Netlist, SimulationConfig, SolverType,
};

/// Power electronics circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the circuit description file
    #[arg(value_name = "CIRCUIT_FILE")]
    circuit_file: PathBuf,

    /// Step width in seconds (overrides `.tran`)
    #[arg(long, value_parser = parse_quantity)]
    dt: Option<f64>,

    /// Simulated duration in seconds (overrides `.tran`)
    #[arg(long, value_parser = parse_quantity)]
    duration: Option<f64>,

    /// Integration method: be, trz or gs (overrides `.tran`)
    #[arg(long)]
    solver: Option<SolverType>,

    /// Parameter override, e.g. `R1=4.7` or `C1.ic=12`
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_override)]
    overrides: Vec<(String, f64)>,

    /// Log every n-th step
    #[arg(long, default_value_t = 1)]
    log_interval: usize,

    /// Do not log any samples
    #[arg(long)]
    no_logging: bool,
}

fn parse_quantity(text: &str) -> std::result::Result<f64, String> {
    dsl::parse_value(text).ok_or_else(|| format!("invalid value '{}'", text))
}

fn parse_override(text: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", text))?;
    Ok((name.trim().to_string(), parse_quantity(value)?))
}

fn build_config(args: &Args, netlist: &Netlist) -> SimulationConfig {
    let tran = netlist.tran();
    let mut config = SimulationConfig::new()
        .with_circuit_file(&args.circuit_file)
        .with_logging_interval(args.log_interval)
        .with_data_logging(!args.no_logging);

    if let Some(dt) = args.dt.or(tran.map(|t| t.dt)) {
        config = config.with_step_width(dt);
    }
    if let Some(duration) = args.duration.or(tran.map(|t| t.duration)) {
        config = config.with_duration(duration);
    }
    if let Some(solver) = args.solver.or(tran.and_then(|t| t.solver)) {
        config = config.with_solver_type(solver);
    }
    for (name, value) in &args.overrides {
        config = config.with_parameter(name.clone(), *value);
    }
    config
}

fn run(args: &Args) -> Result<SimulationStatus> {
    let ast = dsl::parse_file(&args.circuit_file)?;
    let mut netlist = Netlist::from_ast(&ast)?;
    let config = build_config(args, &netlist);

    let engine = HeadlessSimulationEngine::new();
    let mut result = engine.run_netlist(&mut netlist, &config);

    println!("{}", result);
    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
    if let (Some(time), Some(row)) = (result.data.last_time(), result.data.last_row()) {
        println!("t = {:e}s", time);
        for (name, value) in result.data.signal_names().iter().zip(row) {
            println!("  {:<16} {:>14.6e}", name, value);
        }
    }

    match result.error.take() {
        Some(err) => Err(err),
        None => Ok(result.status),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(SimulationStatus::Success) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(err) => {
            eprintln!("Error: {}", err);
            if let SimError::FileReadError { .. } = err {
                return ExitCode::from(3);
            }
            ExitCode::FAILURE
        }
    }
}
