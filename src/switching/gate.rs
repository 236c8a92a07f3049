//! Gate drive signals for controlled switches.

/// Gate input of a controlled switch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateSignal {
    /// Constant gate level.
    Constant(f64),
    /// Rectangular pulse train between 0 and 1.
    Pulse {
        /// Switching frequency in Hz.
        frequency: f64,
        /// On fraction of each period (0.0-1.0).
        duty: f64,
        /// Time before the first pulse starts.
        delay: f64,
    },
}

impl Default for GateSignal {
    fn default() -> Self {
        Self::Constant(0.0)
    }
}

impl GateSignal {
    /// Create a pulse train, clamping the duty cycle to 0..=1.
    pub fn pulse(frequency: f64, duty: f64, delay: f64) -> Self {
        Self::Pulse {
            frequency,
            duty: duty.clamp(0.0, 1.0),
            delay: delay.max(0.0),
        }
    }

    /// Gate level at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        match *self {
            Self::Constant(level) => level,
            Self::Pulse {
                frequency,
                duty,
                delay,
            } => {
                if t < delay || frequency <= 0.0 {
                    return 0.0;
                }
                let phase = ((t - delay) * frequency).fract();
                if phase < duty {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        assert_eq!(GateSignal::Constant(1.0).value_at(123.0), 1.0);
        assert_eq!(GateSignal::default().value_at(0.0), 0.0);
    }

    #[test]
    fn test_pulse() {
        let g = GateSignal::pulse(1000.0, 0.25, 1e-3);
        assert_eq!(g.value_at(0.5e-3), 0.0);
        assert_eq!(g.value_at(1.1e-3), 1.0);
        assert_eq!(g.value_at(1.5e-3), 0.0);
        assert_eq!(g.value_at(2.1e-3), 1.0);
    }
}
