//! Integration method selection and companion-model scaling.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SimError};

/// Smallest step width accepted by a [`SolverContext`].
pub const MIN_TIME_STEP: f64 = 1e-15;

/// Implicit integration scheme used for the companion models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SolverType {
    /// First-order, strongly damped.
    #[default]
    BackwardEuler,
    /// Second-order, A-stable.
    Trapezoidal,
    /// Second-order backward differentiation.
    GearShichman,
}

impl SolverType {
    /// All solver types in tag order.
    pub const ALL: [SolverType; 3] = [
        SolverType::BackwardEuler,
        SolverType::Trapezoidal,
        SolverType::GearShichman,
    ];

    /// Numeric tag used in stored circuit files.
    pub fn index(&self) -> usize {
        match self {
            Self::BackwardEuler => 0,
            Self::Trapezoidal => 1,
            Self::GearShichman => 2,
        }
    }

    /// Look up a solver type by its numeric tag.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short tag (`BE`, `TRZ`, `GS`).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::BackwardEuler => "BE",
            Self::Trapezoidal => "TRZ",
            Self::GearShichman => "GS",
        }
    }

    /// Whether the companion models use trapezoidal history terms.
    pub fn is_trapezoidal(&self) -> bool {
        !matches!(self, Self::BackwardEuler)
    }
}

impl fmt::Display for SolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BackwardEuler => "backward-euler",
            Self::Trapezoidal => "trapezoidal",
            Self::GearShichman => "gear-shichman",
        };
        f.write_str(name)
    }
}

impl FromStr for SolverType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "be" | "backward-euler" | "backwardeuler" => Ok(Self::BackwardEuler),
            "trz" | "trapezoidal" => Ok(Self::Trapezoidal),
            "gs" | "gear-shichman" | "gearshichman" => Ok(Self::GearShichman),
            _ => Err(SimError::InvalidSolverType { name: s.to_string() }),
        }
    }
}

/// Step width plus integration method, shared by every companion model.
///
/// A context is immutable; a new one is built whenever `dt` changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverContext {
    dt: f64,
    solver_type: SolverType,
}

impl SolverContext {
    /// Create a context, rejecting non-positive or non-finite step widths.
    ///
    /// Positive values below [`MIN_TIME_STEP`] are raised to the floor.
    pub fn new(dt: f64, solver_type: SolverType) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidStepWidth { dt });
        }
        Ok(Self {
            dt: dt.max(MIN_TIME_STEP),
            solver_type,
        })
    }

    /// Backward-Euler context.
    pub fn backward_euler(dt: f64) -> Result<Self> {
        Self::new(dt, SolverType::BackwardEuler)
    }

    /// Trapezoidal context.
    pub fn trapezoidal(dt: f64) -> Result<Self> {
        Self::new(dt, SolverType::Trapezoidal)
    }

    /// Gear-Shichman context.
    pub fn gear_shichman(dt: f64) -> Result<Self> {
        Self::new(dt, SolverType::GearShichman)
    }

    /// Step width in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// The integration method.
    pub fn solver_type(&self) -> SolverType {
        self.solver_type
    }

    pub fn is_backward_euler(&self) -> bool {
        self.solver_type == SolverType::BackwardEuler
    }

    /// True for trapezoidal and Gear-Shichman, which share history terms.
    pub fn is_trapezoidal(&self) -> bool {
        self.solver_type.is_trapezoidal()
    }

    /// Companion-model scale: 2 for TRZ/GS, 1 for BE.
    pub fn trapezoidal_scale(&self) -> f64 {
        if self.is_trapezoidal() {
            2.0
        } else {
            1.0
        }
    }

    /// Equivalent conductance `scale·C/dt` of a capacitor.
    pub fn capacitor_conductance(&self, capacitance: f64) -> f64 {
        self.trapezoidal_scale() * capacitance / self.dt
    }

    /// Equivalent conductance `dt/(scale·L)` of an inductor.
    pub fn inductor_conductance(&self, inductance: f64) -> Result<f64> {
        if inductance <= 0.0 || !inductance.is_finite() {
            return Err(SimError::invalid_param(format!(
                "inductance must be positive, got {inductance:e}"
            )));
        }
        Ok(self.dt / (self.trapezoidal_scale() * inductance))
    }

    /// Branch impedance `scale·L/dt` used by the coupled-inductor row.
    pub fn inductor_impedance(&self, inductance: f64) -> f64 {
        self.trapezoidal_scale() * inductance / self.dt
    }
}

impl fmt::Display for SolverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self.solver_type {
            SolverType::BackwardEuler => "BackwardEuler",
            SolverType::Trapezoidal => "Trapezoidal",
            SolverType::GearShichman => "GearShichman",
        };
        write!(f, "SolverContext[{method}, dt={:e}]", self.dt)
    }
}
