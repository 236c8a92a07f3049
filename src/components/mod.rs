//! Device stampers for MNA assembly.
//!
//! Every circuit element type has a stateless stamper that knows how to add
//! its contribution to the system matrix `A` and right-hand side `b`, and how
//! to recover its own current after the solve:
//! - Linear: Resistor, Capacitor, Inductor, Coupled inductor
//! - Sources: Voltage Source (independent or voltage controlled), Current Source
//! - Switching: Diode, Ideal switch, MOSFET, IGBT, Thyristor
//!
//! Parameters arrive as a flat `f64` vector whose layout is fixed per device
//! type (see the `param` constants in each module). Stampers are looked up
//! through the [`StamperRegistry`].

mod diode;
mod linear;
mod registry;
mod sources;
mod switches;

pub use diode::DiodeStamper;
pub use linear::{CapacitorStamper, CoupledInductorStamper, InductorStamper, ResistorStamper};
pub use registry::StamperRegistry;
pub use sources::{source_value, CurrentSourceStamper, SourceKind, VoltageSourceStamper};
pub use switches::SwitchStamper;

pub mod params {
    //! Parameter-vector offsets shared with stored circuit files.
    pub use super::diode::param as diode;
    pub use super::linear::{capacitor, inductor};
    pub use super::sources::{current_source, voltage_source};
    pub use super::switches::param as switch;
}

use std::fmt;

use crate::solver::{DenseMatrix, SolverContext};
use crate::switching::SwitchType;

/// Circuit element types known to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceType {
    Resistor,
    Capacitor,
    Inductor,
    /// Inductor with its own branch current, used when magnetically coupled.
    CoupledInductor,
    VoltageSource,
    CurrentSource,
    Diode,
    IdealSwitch,
    Mosfet,
    Igbt,
    Thyristor,
}

impl DeviceType {
    /// Number of device types.
    pub const COUNT: usize = 11;

    /// All device types in table order.
    pub const ALL: [DeviceType; Self::COUNT] = [
        DeviceType::Resistor,
        DeviceType::Capacitor,
        DeviceType::Inductor,
        DeviceType::CoupledInductor,
        DeviceType::VoltageSource,
        DeviceType::CurrentSource,
        DeviceType::Diode,
        DeviceType::IdealSwitch,
        DeviceType::Mosfet,
        DeviceType::Igbt,
        DeviceType::Thyristor,
    ];

    /// Position in [`DeviceType::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Short tag used in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Resistor => "LK_R",
            Self::Capacitor => "LK_C",
            Self::Inductor => "LK_L",
            Self::CoupledInductor => "LK_LKOP",
            Self::VoltageSource => "LK_U",
            Self::CurrentSource => "LK_I",
            Self::Diode => "LK_D",
            Self::IdealSwitch => "LK_S",
            Self::Mosfet => "LK_MOSFET",
            Self::Igbt => "LK_IGBT",
            Self::Thyristor => "LK_THYR",
        }
    }

    /// Whether the element owns an extra branch-current row.
    pub fn has_branch(&self) -> bool {
        matches!(self, Self::VoltageSource | Self::CoupledInductor)
    }

    /// Commutation rules for switching devices.
    pub fn switch_type(&self) -> Option<SwitchType> {
        match self {
            Self::Diode => Some(SwitchType::Diode),
            Self::IdealSwitch => Some(SwitchType::Ideal),
            Self::Mosfet => Some(SwitchType::Mosfet),
            Self::Igbt => Some(SwitchType::Igbt),
            Self::Thyristor => Some(SwitchType::Thyristor),
            _ => None,
        }
    }

    pub fn is_switch(&self) -> bool {
        self.switch_type().is_some()
    }

    /// Parameter vector with every slot at its default.
    pub fn default_parameters(&self) -> Vec<f64> {
        match self {
            Self::Resistor => vec![0.0],
            Self::Capacitor => vec![0.0; params::capacitor::LEN],
            Self::Inductor | Self::CoupledInductor => vec![0.0; params::inductor::LEN],
            Self::VoltageSource => VoltageSourceStamper::dc_parameters(0.0),
            Self::CurrentSource => CurrentSourceStamper::dc_parameters(0.0),
            Self::Diode => DiodeStamper::default_parameters(),
            Self::IdealSwitch | Self::Mosfet | Self::Igbt | Self::Thyristor => {
                SwitchStamper::default_parameters(*self, 0.0)
            }
        }
    }

    /// Fill the slots missing from a short parameter vector with their defaults.
    pub fn complete_parameters(&self, params: &mut Vec<f64>) {
        let defaults = self.default_parameters();
        if params.len() < defaults.len() {
            params.extend_from_slice(&defaults[params.len()..]);
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Matrix indices an element is connected to.
///
/// Index 0 is ground. `z` is the element's branch-current row, or 0 when it
/// has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Terminals {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Terminals {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y, z: 0 }
    }

    pub fn with_branch(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}

/// Previous-step values kept per element for companion models.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct History {
    /// Element current in the previous accepted step.
    pub current: f64,
    /// Voltage `v(x) - v(y)` in the previous accepted step.
    pub voltage: f64,
}

impl History {
    pub fn new(current: f64, voltage: f64) -> Self {
        Self { current, voltage }
    }
}

/// Contribution of one device type to the MNA system.
pub trait DeviceStamper: fmt::Debug + Send + Sync {
    /// Device type handled by this stamper.
    fn device_type(&self) -> DeviceType;

    /// Add the device's coefficients to `a`.
    fn stamp_matrix(
        &self,
        a: &mut DenseMatrix,
        nodes: Terminals,
        params: &[f64],
        ctx: &SolverContext,
    );

    /// Add the device's excitation and history terms to `b`.
    fn stamp_vector(
        &self,
        b: &mut [f64],
        nodes: Terminals,
        params: &[f64],
        ctx: &SolverContext,
        time: f64,
        history: History,
    );

    /// Element current after the solve, using the same companion relation as
    /// the stamp. Branch devices return the history value; their current is
    /// the solution entry of their branch row.
    fn calculate_current(
        &self,
        vx: f64,
        vy: f64,
        params: &[f64],
        ctx: &SolverContext,
        time: f64,
        history: History,
    ) -> f64;

    /// Equivalent conductance for a given primary parameter value.
    fn admittance_weight(&self, value: f64, ctx: &SolverContext) -> f64;
}

/// Parameter at `idx`, or `default` when the vector is too short.
pub(crate) fn param(params: &[f64], idx: usize, default: f64) -> f64 {
    params.get(idx).copied().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_table_order() {
        for (i, dt) in DeviceType::ALL.iter().enumerate() {
            assert_eq!(dt.index(), i);
        }
    }

    #[test]
    fn test_device_classes() {
        assert!(DeviceType::VoltageSource.has_branch());
        assert!(DeviceType::CoupledInductor.has_branch());
        assert!(!DeviceType::Inductor.has_branch());
        assert_eq!(DeviceType::Igbt.switch_type(), Some(SwitchType::Igbt));
        assert!(!DeviceType::Resistor.is_switch());
        assert_eq!(DeviceType::Resistor.to_string(), "LK_R");
    }

    #[test]
    fn test_param_default() {
        assert_eq!(param(&[1.0], 0, 5.0), 1.0);
        assert_eq!(param(&[1.0], 3, 5.0), 5.0);
    }

    #[test]
    fn test_complete_parameters_pads_to_layout() {
        let mut inductor = vec![1e-3];
        DeviceType::Inductor.complete_parameters(&mut inductor);
        assert_eq!(inductor, vec![1e-3, 0.0, 0.0]);

        let mut capacitor = vec![1e-6, 2.0];
        DeviceType::Capacitor.complete_parameters(&mut capacitor);
        assert_eq!(capacitor.len(), params::capacitor::LEN);
        assert_eq!(capacitor[params::capacitor::INITIAL_VOLTAGE], 2.0);

        // Missing switch slots take the device defaults, not zero.
        let mut igbt = vec![params::switch::DEFAULT_R_OFF, 1.1];
        DeviceType::Igbt.complete_parameters(&mut igbt);
        assert_eq!(igbt.len(), params::switch::LEN);
        assert_eq!(igbt[params::switch::U_FORWARD], 1.1);
        assert_eq!(igbt[params::switch::R_OFF], params::switch::DEFAULT_R_OFF);
        assert_eq!(igbt[params::switch::RECOVERY_TIME], params::switch::DEFAULT_RECOVERY_TIME);

        let mut diode = vec![0.01];
        DeviceType::Diode.complete_parameters(&mut diode);
        assert_eq!(diode[params::diode::U_FORWARD], params::diode::DEFAULT_U_FORWARD);

        let mut long = vec![5.0, 6.0];
        DeviceType::Resistor.complete_parameters(&mut long);
        assert_eq!(long, vec![5.0, 6.0]);
    }
}
