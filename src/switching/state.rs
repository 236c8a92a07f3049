//! Conduction state of a power-semiconductor switch.

use std::fmt;

/// Gate level above which a switch is commanded on.
pub const GATE_THRESHOLD: f64 = 0.5;

/// Conduction state of a switching device.
///
/// `On` and `TurningOff` conduct, `Off` and `TurningOn` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SwitchState {
    #[default]
    Off,
    On,
    TurningOn,
    TurningOff,
}

impl SwitchState {
    pub fn is_conducting(&self) -> bool {
        matches!(self, Self::On | Self::TurningOff)
    }

    pub fn is_blocking(&self) -> bool {
        !self.is_conducting()
    }

    /// `On` or `Off`.
    pub fn is_stable(&self) -> bool {
        matches!(self, Self::On | Self::Off)
    }

    pub fn is_transitioning(&self) -> bool {
        !self.is_stable()
    }

    /// State reached by reversing the current command. A cancelled
    /// transition falls back to where it started.
    pub fn opposite(&self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
            Self::TurningOn => Self::Off,
            Self::TurningOff => Self::On,
        }
    }

    /// Stable state a transition is heading to.
    pub fn target_state(&self) -> Self {
        match self {
            Self::TurningOn => Self::On,
            Self::TurningOff => Self::Off,
            stable => *stable,
        }
    }

    pub fn from_conducting(conducting: bool) -> Self {
        if conducting {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn from_gate_signal(gate: f64) -> Self {
        Self::from_conducting(gate > GATE_THRESHOLD)
    }

    /// Classify a resistance against the geometric mean of `r_on` and `r_off`.
    pub fn from_resistance(resistance: f64, r_on: f64, r_off: f64) -> Self {
        Self::from_conducting(resistance < (r_on * r_off).sqrt())
    }

    pub fn from_gate_status(status: f64) -> Self {
        Self::from_conducting(status >= 1.0)
    }

    pub fn to_resistance(&self, r_on: f64, r_off: f64) -> f64 {
        if self.is_conducting() {
            r_on
        } else {
            r_off
        }
    }

    pub fn to_gate_status(&self) -> f64 {
        if self.is_conducting() {
            1.0
        } else {
            0.0
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Off => "Blocking",
            Self::On => "Conducting",
            Self::TurningOn => "Turning On",
            Self::TurningOff => "Turning Off",
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conduction_classes() {
        assert!(SwitchState::On.is_conducting());
        assert!(SwitchState::TurningOff.is_conducting());
        assert!(SwitchState::Off.is_blocking());
        assert!(SwitchState::TurningOn.is_blocking());
        assert!(SwitchState::TurningOn.is_transitioning());
    }

    #[test]
    fn test_opposite_and_target() {
        assert_eq!(SwitchState::On.opposite(), SwitchState::Off);
        assert_eq!(SwitchState::TurningOn.opposite(), SwitchState::Off);
        assert_eq!(SwitchState::TurningOff.opposite(), SwitchState::On);
        assert_eq!(SwitchState::TurningOn.target_state(), SwitchState::On);
        assert_eq!(SwitchState::TurningOff.target_state(), SwitchState::Off);
        assert_eq!(SwitchState::Off.target_state(), SwitchState::Off);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(SwitchState::from_gate_signal(0.5), SwitchState::Off);
        assert_eq!(SwitchState::from_gate_signal(0.51), SwitchState::On);
        assert_eq!(SwitchState::from_gate_status(1.0), SwitchState::On);
        assert_eq!(SwitchState::from_resistance(1e-3, 1e-3, 1e9), SwitchState::On);
        assert_eq!(SwitchState::from_resistance(1e9, 1e-3, 1e9), SwitchState::Off);
        assert_eq!(SwitchState::On.to_resistance(1e-3, 1e9), 1e-3);
        assert_eq!(SwitchState::TurningOn.to_gate_status(), 0.0);
        assert_eq!(SwitchState::On.to_string(), "Conducting");
    }
}
