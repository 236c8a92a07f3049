//! Device-specific switching rules.
//!
//! Each device type decides which state it would like to be in given the
//! present gate signal, voltage and current, and whether leaving its current
//! state is physically allowed. [`StateTransitionValidator::compute_next_state`]
//! combines both and is evaluated once per convergence iteration.

use std::fmt;

use super::state::{SwitchState, GATE_THRESHOLD};

/// Current magnitude treated as zero for commutation.
pub const CURRENT_ZERO_THRESHOLD: f64 = 1e-9;

/// Kinds of switching device with distinct commutation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchType {
    /// Externally controlled, any transition allowed.
    Ideal,
    Mosfet,
    Igbt,
    Thyristor,
    Diode,
}

impl fmt::Display for SwitchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ideal => "ideal switch",
            Self::Mosfet => "MOSFET",
            Self::Igbt => "IGBT",
            Self::Thyristor => "thyristor",
            Self::Diode => "diode",
        };
        f.write_str(name)
    }
}

/// Snapshot of the electrical conditions at a switch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransitionContext {
    pub gate_signal: f64,
    /// Voltage from anode/collector/drain to cathode/emitter/source.
    pub voltage: f64,
    /// Current in the forward direction.
    pub current: f64,
    pub time: f64,
    pub last_transition_time: f64,
}

impl TransitionContext {
    /// Context carrying only a gate signal.
    pub fn for_gate(gate_signal: f64) -> Self {
        Self {
            gate_signal,
            ..Self::default()
        }
    }

    pub fn for_gate_and_current(gate_signal: f64, current: f64) -> Self {
        Self {
            gate_signal,
            current,
            ..Self::default()
        }
    }

    pub fn for_voltage_and_current(voltage: f64, current: f64) -> Self {
        Self {
            voltage,
            current,
            ..Self::default()
        }
    }

    pub fn time_since_last_transition(&self) -> f64 {
        self.time - self.last_transition_time
    }

    pub fn gate_high(&self) -> bool {
        self.gate_signal > GATE_THRESHOLD
    }

    pub fn current_is_zero(&self) -> bool {
        self.current.abs() < CURRENT_ZERO_THRESHOLD
    }
}

/// Transition rules for one device type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateTransitionValidator {
    switch_type: SwitchType,
    forward_voltage: f64,
    recovery_time: f64,
}

impl StateTransitionValidator {
    pub fn new(switch_type: SwitchType, forward_voltage: f64, recovery_time: f64) -> Self {
        Self {
            switch_type,
            forward_voltage,
            recovery_time,
        }
    }

    /// Validator for a device without forward voltage or recovery time.
    pub fn for_type(switch_type: SwitchType) -> Self {
        Self::new(switch_type, 0.0, 0.0)
    }

    pub fn switch_type(&self) -> SwitchType {
        self.switch_type
    }

    pub fn forward_voltage(&self) -> f64 {
        self.forward_voltage
    }

    pub fn recovery_time(&self) -> f64 {
        self.recovery_time
    }

    /// Copy with the forward-voltage threshold multiplied by `factor`.
    pub fn with_forward_voltage_scale(mut self, factor: f64) -> Self {
        self.forward_voltage *= factor;
        self
    }

    /// State the device would adopt if nothing constrained it.
    pub fn requested_state(&self, ctx: &TransitionContext) -> SwitchState {
        match self.switch_type {
            SwitchType::Ideal | SwitchType::Mosfet => {
                SwitchState::from_gate_signal(ctx.gate_signal)
            }
            SwitchType::Igbt | SwitchType::Thyristor => {
                SwitchState::from_conducting(ctx.gate_high())
            }
            SwitchType::Diode => SwitchState::from_conducting(ctx.voltage > self.forward_voltage),
        }
    }

    /// Whether moving from `current` to `requested` is physically possible.
    pub fn is_transition_allowed(
        &self,
        current: SwitchState,
        requested: SwitchState,
        ctx: &TransitionContext,
    ) -> bool {
        if current == requested {
            return true;
        }

        let turn_on = current == SwitchState::Off && requested == SwitchState::On;
        let turn_off = current == SwitchState::On && requested == SwitchState::Off;

        match self.switch_type {
            SwitchType::Ideal => true,
            SwitchType::Mosfet => match requested {
                SwitchState::On => ctx.gate_high(),
                SwitchState::Off => !ctx.gate_high(),
                _ => true,
            },
            SwitchType::Igbt => {
                if turn_on {
                    ctx.gate_high()
                } else if turn_off {
                    !ctx.gate_high() && ctx.current_is_zero()
                } else {
                    true
                }
            }
            SwitchType::Thyristor => {
                if turn_on {
                    ctx.gate_high() && ctx.voltage > self.forward_voltage
                } else if turn_off {
                    ctx.current < CURRENT_ZERO_THRESHOLD
                        && ctx.time_since_last_transition() >= self.recovery_time
                } else {
                    true
                }
            }
            SwitchType::Diode => {
                if turn_on {
                    ctx.voltage > self.forward_voltage
                } else if turn_off {
                    ctx.current < CURRENT_ZERO_THRESHOLD
                } else {
                    true
                }
            }
        }
    }

    /// Requested state if the transition is legal, otherwise `current`.
    pub fn compute_next_state(&self, current: SwitchState, ctx: &TransitionContext) -> SwitchState {
        let requested = self.requested_state(ctx);
        if self.is_transition_allowed(current, requested, ctx) {
            requested
        } else {
            current
        }
    }
}
