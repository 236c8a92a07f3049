//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations A·p = b where:
//! - p contains node potentials and branch currents
//! - A is the conductance/coefficient matrix
//! - b is the source and history vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage sources and coupled inductors to nodes
//! - D holds the inductor impedances (0 for ideal voltage sources)
//! - v is the vector of node potentials, ground at index 0
//! - j is the vector of branch currents
//! - i is the sum of current injections into each node
//! - e is the vector of branch excitations
//!
//! Capacitors and inductors enter through companion models whose
//! coefficients come from the [`SolverContext`]. Switching devices are
//! piecewise linear; each step is re-solved until no switch changes state.

mod big_lu;
mod context;
mod initial;
mod lu;
mod matrix;
mod mna;
mod simulator;
mod state;

pub use big_lu::BigLuDecomposition;
pub use context::{SolverContext, SolverType, MIN_TIME_STEP};
pub use initial::{InitMode, InitialConditionSolver, INIT_DT, INIT_TIME};
pub use lu::LuDecomposition;
pub use matrix::DenseMatrix;
pub use mna::{switch_signature, CacheStats, MnaSystem, Precision, DEFAULT_CACHE_CAPACITY};
pub use simulator::{Simulator, SimulatorConfig, StepStatus};
pub use state::MatrixStateArrays;

/// Maximum re-solves per step while switch states keep changing.
pub const MAX_SWITCHING_ITERATIONS: usize = 100;

/// Fraction of a step by which the end time may be undershot and still
/// count as reached.
pub const END_TIME_TOLERANCE: f64 = 1e-6;
