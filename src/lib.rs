//! # Powersim Core
//!
//! Transient circuit simulation for power electronics.
//!
//! This library provides:
//! - A netlist DSL for describing circuits, models, couplings and probes
//! - Modified Nodal Analysis (MNA) with backward Euler, trapezoidal and
//!   Gear-Shichman companion models
//! - Piecewise linear switching devices (diode, thyristor, IGBT, MOSFET,
//!   ideal switch) with a per-step switch state iteration
//! - Coupled inductors, an initial operating point solver and a headless
//!   simulation engine
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dsl`] - Parser for the circuit description language
//! - [`circuit`] - Netlist, node labels, mutual couplings and validation
//! - [`components`] - Device stampers and their parameter layouts
//! - [`switching`] - Switch states, commutation rules and gate signals
//! - [`solver`] - MNA assembly, LU factorization and time stepping
//! - [`engine`] - Headless runs with data logging and cancellation
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! powersim buck.cir --dt 100n --duration 2m --solver trz --set R1=4.7
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use powersim_core::{HeadlessSimulationEngine, SimulationConfig};
//!
//! let engine = HeadlessSimulationEngine::new();
//! let config = SimulationConfig::new()
//!     .with_circuit_file("buck.cir")
//!     .with_step_width(1e-7)
//!     .with_duration(2e-3);
//! let result = engine.run_simulation(&config);
//! println!("{}", result);
//! ```
//!
//! ## Circuit Simulation Method
//!
//! For each time step:
//!
//! 1. Assemble the system matrix A and source vector b from the stampers
//! 2. Solve A·p = b by LU decomposition, reusing the factorization for a
//!    known switch configuration
//! 3. Check every switching device against its commutation rules; if any
//!    changed state, re-assemble and solve again
//! 4. Commit potentials and currents as history for the next step

pub mod circuit;
pub mod components;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod solver;
pub mod switching;

// Re-export main types for convenience
pub use circuit::Netlist;
pub use engine::{HeadlessSimulationEngine, SimulationConfig, SimulationResult, SimulationStatus};
pub use error::{Result, SimError};
pub use solver::{SolverContext, SolverType, Simulator};
