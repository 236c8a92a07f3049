//! Gate-controlled switches: ideal switch, MOSFET, IGBT and thyristor.
//!
//! All four share one resistive model. The present resistance sits in
//! `R_CURRENT` and is either `R_ON` or `R_OFF`; while on, an optional forward
//! drop `Uf` is modelled as a Norton compensation current. Commutation rules
//! differ per device and are applied by the simulator, not here.

use crate::solver::{DenseMatrix, SolverContext};
use crate::switching::SwitchState;

use super::{param, DeviceStamper, DeviceType, History, Terminals};

pub(crate) const MIN_RESISTANCE: f64 = 1e-12;
pub(crate) const MAX_RESISTANCE: f64 = 1e15;

pub(crate) fn clamp_resistance(r: f64) -> f64 {
    if r.is_nan() {
        return MAX_RESISTANCE;
    }
    r.clamp(MIN_RESISTANCE, MAX_RESISTANCE)
}

/// Switch parameter layout.
pub mod param {
    pub const R_CURRENT: usize = 0;
    pub const U_FORWARD: usize = 1;
    pub const R_ON: usize = 2;
    pub const R_OFF: usize = 3;
    /// Current at the last accepted step.
    pub const CURRENT: usize = 4;
    /// Voltage at the last accepted step.
    pub const VOLTAGE: usize = 5;
    pub const GATE: usize = 8;
    pub const RECOVERY_TIME: usize = 9;
    pub const LAST_SWITCH_TIME: usize = 11;
    pub const LEN: usize = 12;

    pub const DEFAULT_R_ON: f64 = 1e-3;
    pub const DEFAULT_R_OFF: f64 = 1e9;
    pub const DEFAULT_RECOVERY_TIME: f64 = 10e-6;
}

/// Stamper shared by the gate-controlled switch types.
#[derive(Debug, Clone, Copy)]
pub struct SwitchStamper {
    device: DeviceType,
}

impl SwitchStamper {
    pub fn ideal() -> Self {
        Self { device: DeviceType::IdealSwitch }
    }

    pub fn mosfet() -> Self {
        Self { device: DeviceType::Mosfet }
    }

    pub fn igbt() -> Self {
        Self { device: DeviceType::Igbt }
    }

    pub fn thyristor() -> Self {
        Self { device: DeviceType::Thyristor }
    }

    /// Stamper for `device`, or `None` if it is not a gate-controlled switch.
    pub fn for_device(device: DeviceType) -> Option<Self> {
        match device {
            DeviceType::IdealSwitch
            | DeviceType::Mosfet
            | DeviceType::Igbt
            | DeviceType::Thyristor => Some(Self { device }),
            _ => None,
        }
    }

    /// Forward voltage used when none is given.
    pub fn default_forward_voltage(device: DeviceType) -> f64 {
        match device {
            DeviceType::Igbt | DeviceType::Thyristor => 1.5,
            _ => 0.0,
        }
    }

    /// Full parameter vector. The initial resistance follows the gate level.
    pub fn parameters(r_on: f64, r_off: f64, u_forward: f64, gate: f64) -> Vec<f64> {
        let mut params = vec![0.0; param::LEN];
        let on = SwitchState::from_gate_signal(gate).is_conducting();
        params[param::R_CURRENT] = if on { r_on } else { r_off };
        params[param::U_FORWARD] = u_forward;
        params[param::R_ON] = r_on;
        params[param::R_OFF] = r_off;
        params[param::GATE] = gate;
        params[param::RECOVERY_TIME] = param::DEFAULT_RECOVERY_TIME;
        params
    }

    pub fn default_parameters(device: DeviceType, gate: f64) -> Vec<f64> {
        Self::parameters(
            param::DEFAULT_R_ON,
            param::DEFAULT_R_OFF,
            Self::default_forward_voltage(device),
            gate,
        )
    }

    /// A switch conducts while its present resistance is below half of `R_OFF`.
    pub fn is_conducting(params: &[f64]) -> bool {
        let r_off = param(params, param::R_OFF, param::DEFAULT_R_OFF);
        param(params, param::R_CURRENT, r_off) < 0.5 * r_off
    }

    pub fn set_conducting(params: &mut [f64], conducting: bool) {
        let target = if conducting {
            param(params, param::R_ON, param::DEFAULT_R_ON)
        } else {
            param(params, param::R_OFF, param::DEFAULT_R_OFF)
        };
        if let Some(slot) = params.get_mut(param::R_CURRENT) {
            *slot = target;
        }
    }

    fn resistance(params: &[f64]) -> f64 {
        clamp_resistance(param(params, param::R_CURRENT, param::DEFAULT_R_OFF))
    }
}

impl DeviceStamper for SwitchStamper {
    fn device_type(&self) -> DeviceType {
        self.device
    }

    fn stamp_matrix(
        &self,
        a: &mut DenseMatrix,
        nodes: Terminals,
        params: &[f64],
        _ctx: &SolverContext,
    ) {
        a.stamp_conductance(nodes.x, nodes.y, 1.0 / Self::resistance(params));
    }

    fn stamp_vector(
        &self,
        b: &mut [f64],
        nodes: Terminals,
        params: &[f64],
        _ctx: &SolverContext,
        _time: f64,
        _history: History,
    ) {
        let uf = param(params, param::U_FORWARD, 0.0);
        if uf > 0.0 && Self::is_conducting(params) {
            let compensation = uf / Self::resistance(params);
            b[nodes.x] += compensation;
            b[nodes.y] -= compensation;
        }
    }

    fn calculate_current(
        &self,
        vx: f64,
        vy: f64,
        params: &[f64],
        _ctx: &SolverContext,
        _time: f64,
        _history: History,
    ) -> f64 {
        let v = vx - vy;
        let r = Self::resistance(params);
        if Self::is_conducting(params) {
            (v - param(params, param::U_FORWARD, 0.0)) / r
        } else {
            v / r
        }
    }

    fn admittance_weight(&self, resistance: f64, _ctx: &SolverContext) -> f64 {
        1.0 / clamp_resistance(resistance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ctx() -> SolverContext {
        SolverContext::backward_euler(1e-6).unwrap()
    }

    #[test]
    fn test_initial_resistance_follows_gate() {
        let on = SwitchStamper::default_parameters(DeviceType::Mosfet, 1.0);
        let off = SwitchStamper::default_parameters(DeviceType::Mosfet, 0.0);
        assert_eq!(on[param::R_CURRENT], param::DEFAULT_R_ON);
        assert_eq!(off[param::R_CURRENT], param::DEFAULT_R_OFF);
        assert!(SwitchStamper::is_conducting(&on));
        assert!(!SwitchStamper::is_conducting(&off));
    }

    #[test]
    fn test_igbt_forward_drop() {
        let params = SwitchStamper::parameters(0.01, 1e9, 1.5, 1.0);
        let mut a = DenseMatrix::square(3);
        let mut b = vec![0.0; 3];
        let igbt = SwitchStamper::igbt();
        igbt.stamp_matrix(&mut a, Terminals::new(1, 2), &params, &ctx());
        igbt.stamp_vector(&mut b, Terminals::new(1, 2), &params, &ctx(), 0.0, History::default());

        assert_relative_eq!(a.get(1, 1), 100.0);
        assert_relative_eq!(a.get(1, 2), -100.0);
        assert_relative_eq!(b[1], 150.0);
        assert_relative_eq!(b[2], -150.0);

        let i = igbt.calculate_current(2.0, 0.0, &params, &ctx(), 0.0, History::default());
        assert_relative_eq!(i, 50.0, max_relative = 1e-12);
    }

    #[test]
    fn test_blocking_switch_has_no_compensation() {
        let params = SwitchStamper::parameters(0.01, 1e6, 1.5, 0.0);
        let mut b = vec![0.0; 3];
        SwitchStamper::thyristor().stamp_vector(
            &mut b,
            Terminals::new(1, 2),
            &params,
            &ctx(),
            0.0,
            History::default(),
        );
        assert_eq!(b, vec![0.0; 3]);
        let i = SwitchStamper::thyristor().calculate_current(
            10.0,
            0.0,
            &params,
            &ctx(),
            0.0,
            History::default(),
        );
        assert_relative_eq!(i, 1e-5);
    }

    #[test]
    fn test_set_conducting() {
        let mut params = SwitchStamper::default_parameters(DeviceType::IdealSwitch, 0.0);
        SwitchStamper::set_conducting(&mut params, true);
        assert_eq!(params[param::R_CURRENT], param::DEFAULT_R_ON);
        SwitchStamper::set_conducting(&mut params, false);
        assert_eq!(params[param::R_CURRENT], param::DEFAULT_R_OFF);
    }

    #[test]
    fn test_initial_resistance_uses_gate_threshold() {
        let weak = SwitchStamper::parameters(0.01, 1e6, 0.0, 0.3);
        assert_eq!(weak[param::R_CURRENT], 1e6);
        assert!(!SwitchStamper::is_conducting(&weak));

        let driven = SwitchStamper::parameters(0.01, 1e6, 0.0, 0.8);
        assert_eq!(driven[param::R_CURRENT], 0.01);
        assert_eq!(driven[param::GATE], 0.8);
    }

    #[test]
    fn test_device_constructors() {
        assert_eq!(SwitchStamper::ideal().device_type(), DeviceType::IdealSwitch);
        assert_eq!(SwitchStamper::igbt().device_type(), DeviceType::Igbt);
        assert!(SwitchStamper::for_device(DeviceType::Diode).is_none());
        assert_eq!(SwitchStamper::default_forward_voltage(DeviceType::Thyristor), 1.5);
        assert_eq!(SwitchStamper::default_forward_voltage(DeviceType::Mosfet), 0.0);
    }

    #[test]
    fn test_resistance_clamp() {
        assert_eq!(clamp_resistance(0.0), MIN_RESISTANCE);
        assert_eq!(clamp_resistance(1e30), MAX_RESISTANCE);
        assert_eq!(clamp_resistance(f64::NAN), MAX_RESISTANCE);
    }
}
