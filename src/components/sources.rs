//! Voltage and current sources.

use std::f64::consts::PI;

use crate::solver::{DenseMatrix, SolverContext};

use super::{param, DeviceStamper, DeviceType, History, Terminals};

/// Voltage source parameter layout.
pub mod voltage_source {
    pub const SOURCE_TYPE: usize = 0;
    /// Amplitude, or gain for a controlled source.
    pub const AMPLITUDE: usize = 1;
    pub const FREQUENCY: usize = 2;
    pub const PHASE: usize = 3;
    pub const CONTROL_X: usize = 4;
    pub const CONTROL_Y: usize = 5;
    pub const STORED_CURRENT: usize = 10;
    pub const LEN: usize = 11;
}

/// Current source parameter layout.
pub mod current_source {
    pub const SOURCE_TYPE: usize = 0;
    pub const AMPLITUDE: usize = 1;
    pub const FREQUENCY: usize = 2;
    pub const PHASE: usize = 3;
    pub const STORED_CURRENT: usize = 6;
    pub const LEN: usize = 7;
}

/// Waveform selector stored in parameter slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Dc,
    Ac,
    /// Voltage-controlled voltage source.
    VoltageControlled,
}

impl SourceKind {
    pub fn code(&self) -> f64 {
        match self {
            Self::Dc => 0.0,
            Self::Ac => 1.0,
            Self::VoltageControlled => 2.0,
        }
    }

    pub fn from_code(code: f64) -> Option<Self> {
        match code as i64 {
            0 => Some(Self::Dc),
            1 => Some(Self::Ac),
            2 => Some(Self::VoltageControlled),
            _ => None,
        }
    }
}

/// Source value at time `t` for a `[type, amplitude, frequency, phase]` vector.
///
/// AC without frequency and phase runs at 1 Hz. Unknown types return the
/// amplitude unchanged.
pub fn source_value(params: &[f64], t: f64) -> f64 {
    if params.len() < 2 {
        return 0.0;
    }
    let amplitude = params[1];
    match SourceKind::from_code(params[0]) {
        Some(SourceKind::Dc) => amplitude,
        Some(SourceKind::Ac) => {
            if params.len() >= 4 {
                amplitude * (2.0 * PI * params[2] * t + params[3]).sin()
            } else {
                amplitude * (2.0 * PI * t).sin()
            }
        }
        _ => amplitude,
    }
}

/// Ideal voltage source with branch current in row `z`.
///
/// Independent sources enforce `v(x) - v(y) = V(t)`. A controlled source
/// enforces `v(x) - v(y) = gain * (v(cx) - v(cy))` with the control node
/// indices stored in the parameter vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoltageSourceStamper;

impl VoltageSourceStamper {
    /// `[DC, voltage]` parameters.
    pub fn dc_parameters(voltage: f64) -> Vec<f64> {
        Self::with_layout(&[SourceKind::Dc.code(), voltage, 0.0, 0.0])
    }

    /// `[AC, amplitude, frequency, phase]` parameters.
    pub fn ac_parameters(amplitude: f64, frequency: f64, phase: f64) -> Vec<f64> {
        Self::with_layout(&[SourceKind::Ac.code(), amplitude, frequency, phase])
    }

    /// Controlled-source parameters with control nodes as matrix indices.
    pub fn controlled_parameters(gain: f64, control_x: usize, control_y: usize) -> Vec<f64> {
        Self::with_layout(&[
            SourceKind::VoltageControlled.code(),
            gain,
            0.0,
            0.0,
            control_x as f64,
            control_y as f64,
        ])
    }

    fn with_layout(head: &[f64]) -> Vec<f64> {
        let mut params = vec![0.0; voltage_source::LEN];
        params[..head.len()].copy_from_slice(head);
        params
    }

    fn is_controlled(params: &[f64]) -> bool {
        SourceKind::from_code(param(params, voltage_source::SOURCE_TYPE, 0.0))
            == Some(SourceKind::VoltageControlled)
    }
}

impl DeviceStamper for VoltageSourceStamper {
    fn device_type(&self) -> DeviceType {
        DeviceType::VoltageSource
    }

    fn stamp_matrix(
        &self,
        a: &mut DenseMatrix,
        nodes: Terminals,
        params: &[f64],
        _ctx: &SolverContext,
    ) {
        if nodes.z == 0 {
            return;
        }
        a.stamp_branch(nodes.x, nodes.y, nodes.z);

        if Self::is_controlled(params) {
            let gain = param(params, voltage_source::AMPLITUDE, 0.0);
            let cx = control_node(params, voltage_source::CONTROL_X, a.cols());
            let cy = control_node(params, voltage_source::CONTROL_Y, a.cols());
            if let (Some(cx), Some(cy)) = (cx, cy) {
                a.add(nodes.z, cx, -gain);
                a.add(nodes.z, cy, gain);
            }
        }
    }

    fn stamp_vector(
        &self,
        b: &mut [f64],
        nodes: Terminals,
        params: &[f64],
        _ctx: &SolverContext,
        time: f64,
        _history: History,
    ) {
        if nodes.z == 0 || Self::is_controlled(params) {
            return;
        }
        b[nodes.z] += source_value(params, time);
    }

    fn calculate_current(
        &self,
        _vx: f64,
        _vy: f64,
        _params: &[f64],
        _ctx: &SolverContext,
        _time: f64,
        history: History,
    ) -> f64 {
        history.current
    }

    fn admittance_weight(&self, _value: f64, _ctx: &SolverContext) -> f64 {
        0.0
    }
}

/// Control node index stored in `slot`, if it names one of `size` columns.
fn control_node(params: &[f64], slot: usize, size: usize) -> Option<usize> {
    let index = param(params, slot, 0.0);
    (index.is_finite() && index >= 0.0 && index < size as f64).then(|| index as usize)
}

/// Ideal current source driving `I(t)` into node `x`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentSourceStamper;

impl CurrentSourceStamper {
    pub fn dc_parameters(current: f64) -> Vec<f64> {
        let mut params = vec![0.0; current_source::LEN];
        params[current_source::SOURCE_TYPE] = SourceKind::Dc.code();
        params[current_source::AMPLITUDE] = current;
        params
    }

    pub fn ac_parameters(amplitude: f64, frequency: f64, phase: f64) -> Vec<f64> {
        let mut params = Self::dc_parameters(amplitude);
        params[current_source::SOURCE_TYPE] = SourceKind::Ac.code();
        params[current_source::FREQUENCY] = frequency;
        params[current_source::PHASE] = phase;
        params
    }
}

impl DeviceStamper for CurrentSourceStamper {
    fn device_type(&self) -> DeviceType {
        DeviceType::CurrentSource
    }

    fn stamp_matrix(&self, _: &mut DenseMatrix, _: Terminals, _: &[f64], _: &SolverContext) {}

    fn stamp_vector(
        &self,
        b: &mut [f64],
        nodes: Terminals,
        params: &[f64],
        _ctx: &SolverContext,
        time: f64,
        _history: History,
    ) {
        let current = source_value(params, time);
        b[nodes.x] += current;
        b[nodes.y] -= current;
    }

    fn calculate_current(
        &self,
        _vx: f64,
        _vy: f64,
        params: &[f64],
        _ctx: &SolverContext,
        time: f64,
        _history: History,
    ) -> f64 {
        source_value(params, time)
    }

    fn admittance_weight(&self, _value: f64, _ctx: &SolverContext) -> f64 {
        0.0
    }
}
