//! Switching-device state machine.
//!
//! - [`SwitchState`] is the conduction state of one device.
//! - [`StateTransitionValidator`] holds the commutation rules of a device type
//!   and computes the next state from a [`TransitionContext`].
//! - [`GateSignal`] drives the gate input of controlled switches.

mod gate;
mod rules;
mod state;

pub use gate::GateSignal;
pub use rules::{StateTransitionValidator, SwitchType, TransitionContext, CURRENT_ZERO_THRESHOLD};
pub use state::{SwitchState, GATE_THRESHOLD};
