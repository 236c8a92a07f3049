//! Linear passive stampers: Resistor, Capacitor, Inductor, Coupled inductor.

use crate::solver::{DenseMatrix, SolverContext};

use super::{param, DeviceStamper, DeviceType, History, Terminals};

/// Smallest resistance stamped, to avoid an infinite conductance.
pub const MIN_RESISTANCE: f64 = 1e-12;
/// Smallest capacitance used in the companion model.
pub const MIN_CAPACITANCE: f64 = 1e-15;
/// Smallest inductance used in the companion model.
pub const MIN_INDUCTANCE: f64 = 1e-15;

/// Capacitor parameter layout.
pub mod capacitor {
    pub const CAPACITANCE: usize = 0;
    pub const INITIAL_VOLTAGE: usize = 1;
    pub const STORED_CURRENT: usize = 2;
    pub const STORED_VOLTAGE: usize = 3;
    pub const STORED_POTENTIAL_X: usize = 4;
    pub const STORED_POTENTIAL_Y: usize = 5;
    pub const LEN: usize = 6;
}

/// Inductor parameter layout, shared by coupled inductors.
pub mod inductor {
    pub const INDUCTANCE: usize = 0;
    pub const INITIAL_CURRENT: usize = 1;
    pub const STORED_CURRENT: usize = 2;
    pub const LEN: usize = 3;
}

/// Resistor: `[R]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResistorStamper;

impl DeviceStamper for ResistorStamper {
    fn device_type(&self) -> DeviceType {
        DeviceType::Resistor
    }

    fn stamp_matrix(
        &self,
        a: &mut DenseMatrix,
        nodes: Terminals,
        params: &[f64],
        ctx: &SolverContext,
    ) {
        let g = self.admittance_weight(param(params, 0, MIN_RESISTANCE), ctx);
        a.stamp_conductance(nodes.x, nodes.y, g);
    }

    fn stamp_vector(
        &self,
        _: &mut [f64],
        _: Terminals,
        _: &[f64],
        _: &SolverContext,
        _: f64,
        _: History,
    ) {
    }

    fn calculate_current(
        &self,
        vx: f64,
        vy: f64,
        params: &[f64],
        ctx: &SolverContext,
        _time: f64,
        _history: History,
    ) -> f64 {
        self.admittance_weight(param(params, 0, MIN_RESISTANCE), ctx) * (vx - vy)
    }

    fn admittance_weight(&self, resistance: f64, _ctx: &SolverContext) -> f64 {
        1.0 / resistance.max(MIN_RESISTANCE)
    }
}

/// Capacitor companion model.
///
/// Backward Euler:
///   i(n) = G * (v(n) - v(n-1)),            G = C/dt
/// Trapezoidal (and Gear-Shichman):
///   i(n) = G * (v(n) - v(n-1)) - i(n-1),   G = 2C/dt
///
/// The history part is stamped as a current source into `b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacitorStamper;

impl CapacitorStamper {
    fn history_current(&self, g: f64, ctx: &SolverContext, history: History) -> f64 {
        let mut i_eq = g * history.voltage;
        if ctx.is_trapezoidal() {
            i_eq += history.current;
        }
        i_eq
    }
}

impl DeviceStamper for CapacitorStamper {
    fn device_type(&self) -> DeviceType {
        DeviceType::Capacitor
    }

    fn stamp_matrix(
        &self,
        a: &mut DenseMatrix,
        nodes: Terminals,
        params: &[f64],
        ctx: &SolverContext,
    ) {
        let g = self.admittance_weight(param(params, capacitor::CAPACITANCE, 0.0), ctx);
        a.stamp_conductance(nodes.x, nodes.y, g);
    }

    fn stamp_vector(
        &self,
        b: &mut [f64],
        nodes: Terminals,
        params: &[f64],
        ctx: &SolverContext,
        _time: f64,
        history: History,
    ) {
        let g = self.admittance_weight(param(params, capacitor::CAPACITANCE, 0.0), ctx);
        let i_eq = self.history_current(g, ctx, history);
        b[nodes.x] += i_eq;
        b[nodes.y] -= i_eq;
    }

    fn calculate_current(
        &self,
        vx: f64,
        vy: f64,
        params: &[f64],
        ctx: &SolverContext,
        _time: f64,
        history: History,
    ) -> f64 {
        let g = self.admittance_weight(param(params, capacitor::CAPACITANCE, 0.0), ctx);
        g * (vx - vy) - self.history_current(g, ctx, history)
    }

    fn admittance_weight(&self, capacitance: f64, ctx: &SolverContext) -> f64 {
        ctx.capacitor_conductance(capacitance.max(MIN_CAPACITANCE))
    }
}

/// Inductor companion model (conductance form, no branch row).
///
/// Backward Euler:
///   i(n) = i(n-1) + G * v(n),                 G = dt/L
/// Trapezoidal (and Gear-Shichman):
///   i(n) = i(n-1) + G * (v(n) + v(n-1)),      G = dt/(2L)
///
/// Current flows from `x` to `y`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InductorStamper;

impl InductorStamper {
    fn history_current(&self, g: f64, ctx: &SolverContext, history: History) -> f64 {
        if ctx.is_trapezoidal() {
            history.current + g * history.voltage
        } else {
            history.current
        }
    }
}

impl DeviceStamper for InductorStamper {
    fn device_type(&self) -> DeviceType {
        DeviceType::Inductor
    }

    fn stamp_matrix(
        &self,
        a: &mut DenseMatrix,
        nodes: Terminals,
        params: &[f64],
        ctx: &SolverContext,
    ) {
        let g = self.admittance_weight(param(params, inductor::INDUCTANCE, 0.0), ctx);
        a.stamp_conductance(nodes.x, nodes.y, g);
    }

    fn stamp_vector(
        &self,
        b: &mut [f64],
        nodes: Terminals,
        params: &[f64],
        ctx: &SolverContext,
        _time: f64,
        history: History,
    ) {
        let g = self.admittance_weight(param(params, inductor::INDUCTANCE, 0.0), ctx);
        let i_eq = self.history_current(g, ctx, history);
        b[nodes.x] -= i_eq;
        b[nodes.y] += i_eq;
    }

    fn calculate_current(
        &self,
        vx: f64,
        vy: f64,
        params: &[f64],
        ctx: &SolverContext,
        _time: f64,
        history: History,
    ) -> f64 {
        let g = self.admittance_weight(param(params, inductor::INDUCTANCE, 0.0), ctx);
        self.history_current(g, ctx, history) + g * (vx - vy)
    }

    fn admittance_weight(&self, inductance: f64, ctx: &SolverContext) -> f64 {
        ctx.dt() / (ctx.trapezoidal_scale() * inductance.max(MIN_INDUCTANCE))
    }
}

/// Inductor with an explicit branch current, needed for mutual coupling.
///
/// Row `z` holds
///   v(x) - v(y) - Z * i(z) = -Z * i(n-1) [- v(n-1) for TRZ/GS],  Z = scale*L/dt
///
/// Mutual terms `-Zm * i(partner)` are added by the assembly step from the
/// coupling arrays, since a stamper only sees its own terminals.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoupledInductorStamper;

impl CoupledInductorStamper {
    /// Impedance `scale*L/dt` on the branch diagonal.
    pub fn impedance(&self, inductance: f64, ctx: &SolverContext) -> f64 {
        ctx.inductor_impedance(inductance.max(MIN_INDUCTANCE))
    }
}

impl DeviceStamper for CoupledInductorStamper {
    fn device_type(&self) -> DeviceType {
        DeviceType::CoupledInductor
    }

    fn stamp_matrix(
        &self,
        a: &mut DenseMatrix,
        nodes: Terminals,
        params: &[f64],
        ctx: &SolverContext,
    ) {
        if nodes.z == 0 {
            return;
        }
        a.stamp_branch(nodes.x, nodes.y, nodes.z);
        a.add(nodes.z, nodes.z, -self.impedance(param(params, inductor::INDUCTANCE, 0.0), ctx));
    }

    fn stamp_vector(
        &self,
        b: &mut [f64],
        nodes: Terminals,
        params: &[f64],
        ctx: &SolverContext,
        _time: f64,
        history: History,
    ) {
        if nodes.z == 0 {
            return;
        }
        let z = self.impedance(param(params, inductor::INDUCTANCE, 0.0), ctx);
        b[nodes.z] -= z * history.current;
        if ctx.is_trapezoidal() {
            b[nodes.z] -= history.voltage;
        }
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

    fn admittance_weight(&self, inductance: f64, ctx: &SolverContext) -> f64 {
        1.0 / self.impedance(inductance, ctx)
    }
}
