//! Initial conditions before the first time step.
//!
//! A cold start solves a DC-like operating point: capacitors are replaced by
//! voltage sources at their initial voltage, inductors carry their initial
//! current through a companion model with a tiny step, and switch states are
//! iterated until they agree with the resulting potentials. A continue run
//! restores potentials, branch currents and switch states from the values a
//! previous run stored in the parameter vectors.

use tracing::{debug, warn};

use crate::circuit::{CouplingArrays, Netlist};
use crate::components::params::{capacitor, current_source, diode, inductor, switch, voltage_source};
use crate::components::{DeviceType, History, SourceKind, StamperRegistry};
use crate::error::{Result, SimError};
use crate::switching::{SwitchState, TransitionContext};

use super::context::SolverContext;
use super::mna::MnaSystem;
use super::state::MatrixStateArrays;
use super::MAX_SWITCHING_ITERATIONS;

/// Step width of the companion models in the initial solve.
pub const INIT_DT: f64 = 1e-9;

/// Time at which the initial system is evaluated.
pub const INIT_TIME: f64 = -1e-9;

const PERTURBATION_START: f64 = 0.99999;
const PERTURBATION_DECAY: f64 = 0.99;

/// How a run obtains its initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitMode {
    /// Compute an operating point from the initial values.
    #[default]
    ColdStart,
    /// Resume from the state stored by a previous run.
    Continue,
}

/// Computes the potentials, currents and switch states at `t = 0`.
#[derive(Debug, Clone, Copy)]
pub struct InitialConditionSolver<'a> {
    registry: &'a StamperRegistry,
    max_iterations: usize,
}

impl<'a> InitialConditionSolver<'a> {
    pub fn new(registry: &'a StamperRegistry) -> Self {
        Self {
            registry,
            max_iterations: MAX_SWITCHING_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Fill `state` and the switch states of `netlist` for the chosen mode.
    pub fn initialize(
        &self,
        netlist: &mut Netlist,
        state: &mut MatrixStateArrays,
        couplings: &CouplingArrays,
        mode: InitMode,
    ) -> Result<()> {
        netlist.prepare()?;
        if state.matrix_size() != netlist.matrix_size() {
            return Err(SimError::DimensionMismatch {
                expected: netlist.matrix_size(),
                actual: state.matrix_size(),
            });
        }
        match mode {
            InitMode::ColdStart => self.cold_start(netlist, state, couplings)?,
            InitMode::Continue => restore(netlist, state),
        }
        init_currents(netlist, state, mode);

        for element in netlist.elements_mut() {
            element.last_transition = f64::NEG_INFINITY;
        }
        Ok(())
    }

    fn cold_start(
        &self,
        netlist: &mut Netlist,
        state: &mut MatrixStateArrays,
        couplings: &CouplingArrays,
    ) -> Result<()> {
        let size = netlist.matrix_size();
        state.clear_potentials();
        if size <= 1 {
            return Ok(());
        }

        let ctx = SolverContext::backward_euler(INIT_DT)?;
        let capacitors: Vec<usize> = netlist
            .elements()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.device == DeviceType::Capacitor)
            .map(|(i, _)| i)
            .collect();

        // Initial branch currents of coupled inductors feed the mutual history terms.
        let mut seed = vec![0.0; size];
        for element in netlist.elements_mut() {
            if element.gate.is_some() {
                element.params[switch::GATE] = element.gate_level(0.0);
            }
            if element.device == DeviceType::CoupledInductor {
                seed[element.nodes.z] = element.params[inductor::INITIAL_CURRENT];
            }
        }

        let mut system = MnaSystem::new(size + capacitors.len()).with_cache_capacity(0);
        let mut perturbation = PERTURBATION_START;
        let mut iteration = 0;

        let solution = loop {
            self.assemble(&mut system, netlist, &capacitors, couplings, &ctx, &seed)?;
            let solution = system.solve_uncached()?;

            let changed = self.update_switches(netlist, &solution, &ctx, perturbation)?;
            if changed == 0 {
                break solution;
            }

            iteration += 1;
            if iteration > 2 {
                perturbation *= PERTURBATION_DECAY;
            }
            if iteration >= self.max_iterations {
                warn!(iterations = iteration, "initial switch states did not settle");
                return Err(SimError::not_converged(iteration, 0.0));
            }
        };

        debug!(iterations = iteration, size, "initial operating point solved");
        state.fill_potentials(&solution);
        Ok(())
    }

    fn assemble(
        &self,
        system: &mut MnaSystem,
        netlist: &Netlist,
        capacitors: &[usize],
        couplings: &CouplingArrays,
        ctx: &SolverContext,
        seed: &[f64],
    ) -> Result<()> {
        let size = netlist.matrix_size();
        system.matrix_mut().clear();
        system.rhs_mut().fill(0.0);

        for (idx, element) in netlist.elements().iter().enumerate() {
            if let Some(k) = capacitors.iter().position(|&c| c == idx) {
                let row = size + k;
                system.matrix_mut().stamp_branch(element.nodes.x, element.nodes.y, row);
                system.rhs_mut()[row] += element.params[capacitor::INITIAL_VOLTAGE];
                continue;
            }

            let history = match element.device {
                DeviceType::Inductor | DeviceType::CoupledInductor => {
                    History::new(element.params[inductor::INITIAL_CURRENT], 0.0)
                }
                _ => History::default(),
            };
            let stamper = self.registry.get_required(element.device)?;
            stamper.stamp_matrix(system.matrix_mut(), element.nodes, &element.params, ctx);
            stamper.stamp_vector(
                system.rhs_mut(),
                element.nodes,
                &element.params,
                ctx,
                INIT_TIME,
                history,
            );

            if element.nodes.z != 0 {
                for term in couplings.terms_for(idx) {
                    let zm = ctx.inductor_impedance(term.mutual_inductance);
                    system.matrix_mut().add(element.nodes.z, term.partner_row, -zm);
                    system.rhs_mut()[element.nodes.z] -= zm * seed[term.partner_row];
                }
            }
        }
        Ok(())
    }

    /// Apply legal switch transitions; returns how many switches changed.
    fn update_switches(
        &self,
        netlist: &mut Netlist,
        solution: &[f64],
        ctx: &SolverContext,
        perturbation: f64,
    ) -> Result<usize> {
        let mut changed = 0;
        for element in netlist.elements_mut() {
            let Some(validator) = element.validator() else {
                continue;
            };
            let stamper = self.registry.get_required(element.device)?;
            let (vx, vy) = (solution[element.nodes.x], solution[element.nodes.y]);
            let current = stamper.calculate_current(
                vx,
                vy,
                &element.params,
                ctx,
                INIT_TIME,
                History::default(),
            );
            let transition = TransitionContext {
                gate_signal: element.gate_level(0.0),
                voltage: vx - vy,
                current,
                time: 0.0,
                last_transition_time: f64::NEG_INFINITY,
            };
            let next = validator
                .with_forward_voltage_scale(perturbation)
                .compute_next_state(element.switch_state, &transition);
            if next != element.switch_state {
                debug!(
                    element = %element.name,
                    from = %element.switch_state,
                    to = %next,
                    "initial switch transition"
                );
                element.set_switch_state(next);
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Restore potentials and switch states stored by a previous run.
fn restore(netlist: &mut Netlist, state: &mut MatrixStateArrays) {
    state.clear_potentials();
    for element in netlist.elements_mut() {
        match element.device {
            DeviceType::Capacitor => {
                state.set_potential(element.nodes.x, element.params[capacitor::STORED_POTENTIAL_X]);
                state.set_potential(element.nodes.y, element.params[capacitor::STORED_POTENTIAL_Y]);
            }
            DeviceType::CoupledInductor => {
                state.set_potential(element.nodes.z, element.params[inductor::STORED_CURRENT]);
            }
            DeviceType::Diode => {
                let on = element.params[diode::STATE] != 0.0;
                element.set_switch_state(SwitchState::from_conducting(on));
            }
            d if d.is_switch() => {
                let restored = SwitchState::from_resistance(
                    element.params[switch::R_CURRENT],
                    element.params[switch::R_ON],
                    element.params[switch::R_OFF],
                );
                element.set_switch_state(restored);
            }
            _ => {}
        }
    }
}

/// Seed the current histories (and branch rows of current-carrying branches).
fn init_currents(netlist: &Netlist, state: &mut MatrixStateArrays, mode: InitMode) {
    let resume = mode == InitMode::Continue;
    for (idx, element) in netlist.elements().iter().enumerate() {
        let current = match element.device {
            DeviceType::Capacitor if resume => element.params[capacitor::STORED_CURRENT],
            DeviceType::Inductor | DeviceType::CoupledInductor => {
                let slot = if resume {
                    inductor::STORED_CURRENT
                } else {
                    inductor::INITIAL_CURRENT
                };
                element.params[slot]
            }
            DeviceType::CurrentSource => {
                let slot = if resume {
                    current_source::STORED_CURRENT
                } else {
                    current_source::AMPLITUDE
                };
                element.params[slot]
            }
            DeviceType::VoltageSource => {
                let controlled = SourceKind::from_code(element.params[voltage_source::SOURCE_TYPE])
                    == Some(SourceKind::VoltageControlled);
                if resume || controlled {
                    element.params[voltage_source::STORED_CURRENT]
                } else {
                    continue;
                }
            }
            _ => continue,
        };

        state.set_current(idx, current);
        if element.device.has_branch() {
            state.set_potential(element.nodes.z, current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;
    use approx::assert_relative_eq;

    fn setup(src: &str) -> (Netlist, MatrixStateArrays, CouplingArrays) {
        let netlist = Netlist::from_ast(&parse(src).unwrap()).unwrap();
        let state = MatrixStateArrays::new(netlist.matrix_size(), netlist.element_count());
        let couplings = netlist.coupling_arrays().unwrap();
        (netlist, state, couplings)
    }

    #[test]
    fn test_capacitor_initial_voltage() {
        let (mut netlist, mut state, couplings) = setup("R1 a 0 1k\nC1 a 0 1u ic=3");
        let registry = StamperRegistry::with_defaults();
        InitialConditionSolver::new(&registry)
            .initialize(&mut netlist, &mut state, &couplings, InitMode::ColdStart)
            .unwrap();
        assert_relative_eq!(state.p_alt[1], 3.0, epsilon = 1e-9);
        assert_relative_eq!(state.p_alt_alt_alt[1], 3.0, epsilon = 1e-9);
        assert_eq!(state.p_alt.len(), netlist.matrix_size());
    }

    #[test]
    fn test_inductor_initial_current() {
        let (mut netlist, mut state, couplings) = setup("L1 a 0 1m ic=2\nR1 a 0 10");
        let registry = StamperRegistry::with_defaults();
        InitialConditionSolver::new(&registry)
            .initialize(&mut netlist, &mut state, &couplings, InitMode::ColdStart)
            .unwrap();
        // 2 A from a to ground through L1 must return through R1
        assert_relative_eq!(state.p_alt[1], -20.0, epsilon = 1e-3);
        assert_eq!(state.i_alt[0], 2.0);
    }

    #[test]
    fn test_diode_settles_conducting() {
        let (mut netlist, mut state, couplings) = setup("V1 a 0 10\nD1 a b\nR1 b 0 100");
        let registry = StamperRegistry::with_defaults();
        InitialConditionSolver::new(&registry)
            .initialize(&mut netlist, &mut state, &couplings, InitMode::ColdStart)
            .unwrap();
        let d1 = netlist.element("D1").unwrap();
        assert_eq!(d1.switch_state, SwitchState::On);
        assert_relative_eq!(state.p_alt[2], 9.3, epsilon = 1e-3);
    }

    #[test]
    fn test_cold_start_iteration_cap() {
        let (mut netlist, mut state, couplings) = setup("V1 a 0 10\nD1 a b\nR1 b 0 100");
        let registry = StamperRegistry::with_defaults();
        let result = InitialConditionSolver::new(&registry)
            .with_max_iterations(1)
            .initialize(&mut netlist, &mut state, &couplings, InitMode::ColdStart);
        match result {
            Err(SimError::SwitchingNotConverged { iterations, time }) => {
                assert_eq!(iterations, 1);
                assert_eq!(time, 0.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reverse_diode_stays_off() {
        let (mut netlist, mut state, couplings) = setup("V1 a 0 10\nD1 b a\nR1 b 0 100");
        let registry = StamperRegistry::with_defaults();
        InitialConditionSolver::new(&registry)
            .initialize(&mut netlist, &mut state, &couplings, InitMode::ColdStart)
            .unwrap();
        assert_eq!(netlist.element("D1").unwrap().switch_state, SwitchState::Off);
    }

    #[test]
    fn test_continue_restores_stored_slots() {
        let (mut netlist, mut state, couplings) =
            setup("R1 a 0 1k\nC1 a 0 1u\nL1 a 0 1m\nS1 a 0 gate=0");
        {
            let elements = netlist.elements_mut();
            elements[1].params[capacitor::STORED_POTENTIAL_X] = 4.5;
            elements[1].params[capacitor::STORED_CURRENT] = 0.25;
            elements[2].params[inductor::STORED_CURRENT] = -1.5;
            elements[3].params[switch::R_CURRENT] = elements[3].params[switch::R_ON];
        }
        let registry = StamperRegistry::with_defaults();
        InitialConditionSolver::new(&registry)
            .initialize(&mut netlist, &mut state, &couplings, InitMode::Continue)
            .unwrap();
        assert_eq!(state.p_alt[1], 4.5);
        assert_eq!(state.i_alt[1], 0.25);
        assert_eq!(state.i_alt[2], -1.5);
        assert_eq!(netlist.element("S1").unwrap().switch_state, SwitchState::On);
    }
}
