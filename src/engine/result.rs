//! Outcome of a simulation run.

use std::collections::BTreeMap;
use std::fmt;

use super::data::DataContainer;
use crate::error::SimError;

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStatus {
    Success,
    Failed,
    Cancelled,
    Timeout,
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Timeout => "TIMEOUT",
        };
        f.write_str(name)
    }
}

/// Value of a metadata entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    Number(f64),
    Integer(u64),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(v) => write!(f, "{:e}", v),
            Self::Integer(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<u64> for MetadataValue {
    fn from(n: u64) -> Self {
        Self::Integer(n)
    }
}

impl From<usize> for MetadataValue {
    fn from(n: usize) -> Self {
        Self::Integer(n as u64)
    }
}

/// Result of
/// [`HeadlessSimulationEngine::run_simulation`](super::HeadlessSimulationEngine::run_simulation).
#[derive(Debug)]
pub struct SimulationResult {
    pub status: SimulationStatus,
    pub data: DataContainer,
    pub wall_clock_ms: u64,
    pub total_steps: u64,
    pub simulated_time: f64,
    /// Set when the status is [`SimulationStatus::Failed`].
    pub error: Option<SimError>,
    pub warnings: Vec<String>,
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl SimulationResult {
    pub fn new(status: SimulationStatus) -> Self {
        Self {
            status,
            data: DataContainer::default(),
            wall_clock_ms: 0,
            total_steps: 0,
            simulated_time: 0.0,
            error: None,
            warnings: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Failed result without data.
    pub fn failed(error: SimError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(SimulationStatus::Failed)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SimulationStatus::Success
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn signal_names(&self) -> &[String] {
        self.data.signal_names()
    }

    pub fn signal(&self, name: &str) -> Option<Vec<f64>> {
        self.data.signal(name)
    }

    pub fn times(&self) -> &[f64] {
        self.data.times()
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SimulationResult[status={}, steps={}, time={:e}s, wall={}ms, samples={}",
            self.status,
            self.total_steps,
            self.simulated_time,
            self.wall_clock_ms,
            self.data.len()
        )?;
        if let Some(error) = &self.error {
            write!(f, ", error={}", error)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result() {
        let result = SimulationResult::failed(SimError::SingularMatrix);
        assert!(!result.is_success());
        assert_eq!(result.status, SimulationStatus::Failed);
        assert!(result.to_string().contains("FAILED"));
        assert!(result.to_string().contains("Singular"));
    }

    #[test]
    fn test_metadata() {
        let result = SimulationResult::new(SimulationStatus::Success)
            .with_metadata("solver", "trapezoidal")
            .with_metadata("dt", 1e-6)
            .with_metadata("overrides", 2usize);
        assert_eq!(result.metadata["solver"], MetadataValue::Text("trapezoidal".into()));
        assert_eq!(result.metadata["overrides"].to_string(), "2");
        assert_eq!(result.metadata["dt"].to_string(), "1e-6");
    }
}
