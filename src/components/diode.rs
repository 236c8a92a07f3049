//! Piecewise-linear diode.
//!
//! The diode is an ideal switch with an on-resistance and a forward voltage
//! drop while conducting, and a large off-resistance while blocking:
//!
//! ```text
//!   conducting: i = (v - Uf) / R_on
//!   blocking:   i = v / R_off
//! ```
//!
//! The conduction state lives in the parameter vector and is changed only by
//! the switching logic of the simulator.

use crate::solver::{DenseMatrix, SolverContext};

use super::switches::{clamp_resistance, MAX_RESISTANCE};
use super::{param, DeviceStamper, DeviceType, History, Terminals};

/// Diode parameter layout.
pub mod param {
    pub const R_ON: usize = 0;
    pub const R_OFF: usize = 1;
    pub const U_FORWARD: usize = 2;
    /// 1.0 while conducting.
    pub const STATE: usize = 3;
    pub const LEN: usize = 4;

    pub const DEFAULT_R_ON: f64 = 1e-3;
    pub const DEFAULT_R_OFF: f64 = 1e9;
    pub const DEFAULT_U_FORWARD: f64 = 0.7;
}

/// Stamper for the diode model.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiodeStamper;

impl DiodeStamper {
    pub fn parameters(r_on: f64, r_off: f64, u_forward: f64) -> Vec<f64> {
        vec![r_on, r_off, u_forward, 0.0]
    }

    pub fn default_parameters() -> Vec<f64> {
        Self::parameters(param::DEFAULT_R_ON, param::DEFAULT_R_OFF, param::DEFAULT_U_FORWARD)
    }

    pub fn is_conducting(params: &[f64]) -> bool {
        param(params, param::STATE, 0.0) >= 0.5
    }

    pub fn set_conducting(params: &mut [f64], conducting: bool) {
        if let Some(slot) = params.get_mut(param::STATE) {
            *slot = if conducting { 1.0 } else { 0.0 };
        }
    }

    pub fn forward_voltage(params: &[f64]) -> f64 {
        param(params, param::U_FORWARD, param::DEFAULT_U_FORWARD)
    }

    /// Resistance of the present conduction state.
    pub fn resistance(params: &[f64]) -> f64 {
        let r = if Self::is_conducting(params) {
            param(params, param::R_ON, param::DEFAULT_R_ON)
        } else {
            param(params, param::R_OFF, param::DEFAULT_R_OFF).min(MAX_RESISTANCE)
        };
        clamp_resistance(r)
    }
}

impl DeviceStamper for DiodeStamper {
    fn device_type(&self) -> DeviceType {
        DeviceType::Diode
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
        let uf = Self::forward_voltage(params);
        if Self::is_conducting(params) && uf > 0.0 {
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
        let r = Self::resistance(params);
        if Self::is_conducting(params) {
            (vx - vy - Self::forward_voltage(params)) / r
        } else {
            (vx - vy) / r
        }
    }

    fn admittance_weight(&self, resistance: f64, _ctx: &SolverContext) -> f64 {
        1.0 / clamp_resistance(resistance)
    }
}
