//! Run configuration for the headless engine.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SimError};
use crate::solver::{InitMode, Precision, SimulatorConfig, SolverType, END_TIME_TOLERANCE};

/// Default step width in seconds.
pub const DEFAULT_DT: f64 = 1e-6;

/// Default simulated duration in seconds.
pub const DEFAULT_DURATION: f64 = 1e-3;

/// Settings of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub dt: f64,
    pub duration: f64,
    pub solver_type: SolverType,
    /// Circuit file read by [`run_simulation`](super::HeadlessSimulationEngine::run_simulation).
    pub circuit_file: Option<PathBuf>,
    /// Parameter overrides applied in order, see
    /// [`Netlist::apply_override`](crate::circuit::Netlist::apply_override).
    pub overrides: Vec<(String, f64)>,
    pub enable_data_logging: bool,
    /// Log every n-th step.
    pub data_logging_interval: usize,
    pub init_mode: InitMode,
    /// Wall-clock limit; the run ends with a timeout status when exceeded.
    pub timeout: Option<Duration>,
    pub simulator: SimulatorConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            duration: DEFAULT_DURATION,
            solver_type: SolverType::BackwardEuler,
            circuit_file: None,
            overrides: Vec::new(),
            enable_data_logging: true,
            data_logging_interval: 1,
            init_mode: InitMode::ColdStart,
            timeout: None,
            simulator: SimulatorConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step_width(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_solver_type(mut self, solver_type: SolverType) -> Self {
        self.solver_type = solver_type;
        self
    }

    pub fn with_circuit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.circuit_file = Some(path.into());
        self
    }

    /// Add a parameter override such as `R1` or `C1.ic`.
    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.overrides.push((name.into(), value));
        self
    }

    pub fn with_data_logging(mut self, enable: bool) -> Self {
        self.enable_data_logging = enable;
        self
    }

    pub fn with_logging_interval(mut self, interval: usize) -> Self {
        self.data_logging_interval = interval;
        self
    }

    pub fn with_init_mode(mut self, mode: InitMode) -> Self {
        self.init_mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.simulator = self.simulator.with_precision(precision);
        self
    }

    pub fn with_simulator_config(mut self, simulator: SimulatorConfig) -> Self {
        self.simulator = simulator;
        self
    }

    /// Check step width, duration and logging interval.
    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(SimError::InvalidStepWidth { dt: self.dt });
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(SimError::InvalidDuration {
                duration: self.duration,
            });
        }
        if self.dt >= self.duration {
            return Err(SimError::invalid_param(format!(
                "step width {:e} must be smaller than the duration {:e}",
                self.dt, self.duration
            )));
        }
        if self.data_logging_interval == 0 {
            return Err(SimError::invalid_param("data logging interval must be at least 1"));
        }
        Ok(())
    }

    /// Number of steps needed to cover the duration.
    pub fn expected_steps(&self) -> u64 {
        (self.duration / self.dt - END_TIME_TOLERANCE).ceil().max(0.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.dt, 1e-6);
        assert_eq!(config.duration, 1e-3);
        assert_eq!(config.solver_type, SolverType::BackwardEuler);
        assert!(config.enable_data_logging);
        assert_eq!(config.data_logging_interval, 1);
        assert!(config.validate().is_ok());
        assert_eq!(config.expected_steps(), 1000);
    }

    #[test]
    fn test_expected_steps_rounds_up_partial_step() {
        let config = SimulationConfig::new().with_step_width(1e-6);
        assert_eq!(config.clone().with_duration(10.4e-6).expected_steps(), 11);
        assert_eq!(config.clone().with_duration(5e-3).expected_steps(), 5000);
        assert_eq!(config.with_duration(0.3).expected_steps(), 300_000);
    }

    #[test]
    fn test_validation_errors() {
        let bad_dt = SimulationConfig::new().with_step_width(0.0);
        assert!(matches!(bad_dt.validate(), Err(SimError::InvalidStepWidth { .. })));

        let bad_duration = SimulationConfig::new().with_duration(f64::INFINITY);
        assert!(matches!(bad_duration.validate(), Err(SimError::InvalidDuration { .. })));

        let too_long = SimulationConfig::new().with_step_width(1e-3).with_duration(1e-3);
        assert!(matches!(too_long.validate(), Err(SimError::InvalidSimulationParam { .. })));

        let no_interval = SimulationConfig::new().with_logging_interval(0);
        assert!(no_interval.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = SimulationConfig::new()
            .with_solver_type(SolverType::Trapezoidal)
            .with_circuit_file("buck.cir")
            .with_parameter("R1", 10.0)
            .with_parameter("C1.ic", 2.0);
        assert_eq!(config.overrides.len(), 2);
        assert_eq!(config.circuit_file, Some(PathBuf::from("buck.cir")));
    }
}
