//! Time-stepping simulator.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::circuit::{CouplingArrays, Netlist, Signal, SignalSource};
use crate::components::params::{capacitor, current_source, inductor, switch, voltage_source};
use crate::components::{DeviceType, History, StamperRegistry};
use crate::error::{Result, SimError};
use crate::switching::TransitionContext;

use super::context::SolverContext;
use super::initial::{InitMode, InitialConditionSolver};
use super::mna::{switch_signature, CacheStats, MnaSystem, Precision, DEFAULT_CACHE_CAPACITY};
use super::state::MatrixStateArrays;
use super::{END_TIME_TOLERANCE, MAX_SWITCHING_ITERATIONS};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Re-solves allowed per step while switch states keep changing.
    pub max_switching_iterations: usize,
    /// Arithmetic of the LU factorization.
    pub precision: Precision,
    /// Cached factorizations (0 disables the cache).
    pub cache_capacity: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_switching_iterations: MAX_SWITCHING_ITERATIONS,
            precision: Precision::Double,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_switching_iterations(mut self, max_iterations: usize) -> Self {
        self.max_switching_iterations = max_iterations.max(1);
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

/// Outcome of [`Simulator::step_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// More steps remain before the end time.
    Continuing,
    /// The end time has been reached.
    EndReached,
}

/// Transient simulator for one netlist.
pub struct Simulator {
    netlist: Netlist,
    registry: Arc<StamperRegistry>,
    ctx: SolverContext,
    config: SimulatorConfig,
    system: MnaSystem,
    state: MatrixStateArrays,
    couplings: CouplingArrays,
    /// Element currents of the last accepted step
    currents: Vec<f64>,
    time: f64,
    steps: u64,
}

impl Simulator {
    /// Create a simulator with the default stampers and configuration.
    pub fn new(netlist: Netlist, ctx: SolverContext) -> Result<Self> {
        Self::with_config(
            netlist,
            ctx,
            Arc::new(StamperRegistry::with_defaults()),
            SimulatorConfig::default(),
        )
    }

    pub fn with_config(
        mut netlist: Netlist,
        ctx: SolverContext,
        registry: Arc<StamperRegistry>,
        config: SimulatorConfig,
    ) -> Result<Self> {
        netlist.prepare()?;
        for element in netlist.elements() {
            registry.get_required(element.device)?;
        }

        let size = netlist.matrix_size();
        let couplings = netlist.coupling_arrays()?;
        let system = MnaSystem::new(size)
            .with_precision(config.precision)
            .with_cache_capacity(config.cache_capacity);
        let state = MatrixStateArrays::new(size, netlist.element_count());
        let currents = vec![0.0; netlist.element_count()];

        Ok(Self {
            netlist,
            registry,
            ctx,
            config,
            system,
            state,
            couplings,
            currents,
            time: 0.0,
            steps: 0,
        })
    }

    /// Compute the state at `t = 0` and reset time.
    pub fn initialize(&mut self, mode: InitMode) -> Result<()> {
        InitialConditionSolver::new(&self.registry)
            .with_max_iterations(self.config.max_switching_iterations)
            .initialize(&mut self.netlist, &mut self.state, &self.couplings, mode)?;

        self.currents.copy_from_slice(&self.state.i_alt);
        self.sync_histories();
        self.time = 0.0;
        self.steps = 0;
        debug!(mode = ?mode, size = self.state.matrix_size(), "simulator initialized");
        Ok(())
    }

    /// Advance by one step of `dt`.
    pub fn step(&mut self) -> Result<()> {
        // Multiplying keeps the rounding of long runs at one ulp.
        let t_new = (self.steps + 1) as f64 * self.ctx.dt();

        for element in self.netlist.elements_mut() {
            if let Some(gate) = element.gate {
                element.params[switch::GATE] = gate.value_at(t_new);
            }
        }

        let mut iteration = 0;
        let (solution, currents) = loop {
            let solution = self.solve_at(t_new)?;
            let currents = self.element_currents(&solution, t_new)?;
            if self.update_switches(&solution, &currents, t_new) == 0 {
                break (solution, currents);
            }

            iteration += 1;
            if iteration >= self.config.max_switching_iterations {
                warn!(iterations = iteration, time = t_new, "switch states did not converge");
                return Err(SimError::not_converged(iteration, t_new));
            }
        };

        self.commit(&solution, &currents, t_new);
        Ok(())
    }

    /// Step unless `end` has been reached.
    ///
    /// The last step may overshoot `end` when it is not a multiple of `dt`.
    pub fn step_until(&mut self, end: f64) -> Result<StepStatus> {
        let limit = end - END_TIME_TOLERANCE * self.ctx.dt();
        if self.time >= limit {
            return Ok(StepStatus::EndReached);
        }
        self.step()?;
        if self.time >= limit {
            Ok(StepStatus::EndReached)
        } else {
            Ok(StepStatus::Continuing)
        }
    }

    fn solve_at(&mut self, time: f64) -> Result<Vec<f64>> {
        let elements = self.netlist.elements();
        self.system
            .assemble_matrix(elements, &self.registry, &self.ctx, &self.couplings)?;
        self.system.assemble_vector(
            elements,
            &self.registry,
            &self.ctx,
            &self.couplings,
            time,
            &self.state.p_alt,
        )?;
        self.system.solve(&switch_signature(elements))
    }

    fn element_currents(&self, solution: &[f64], time: f64) -> Result<Vec<f64>> {
        self.netlist
            .elements()
            .iter()
            .map(|e| {
                if e.device.has_branch() {
                    return Ok(solution[e.nodes.z]);
                }
                let stamper = self.registry.get_required(e.device)?;
                Ok(stamper.calculate_current(
                    solution[e.nodes.x],
                    solution[e.nodes.y],
                    &e.params,
                    &self.ctx,
                    time,
                    e.history,
                ))
            })
            .collect()
    }

    /// Apply legal switch transitions; returns how many switches changed.
    fn update_switches(&mut self, solution: &[f64], currents: &[f64], time: f64) -> usize {
        let mut changed = 0;
        for (element, &current) in self.netlist.elements_mut().iter_mut().zip(currents) {
            let Some(validator) = element.validator() else {
                continue;
            };
            let transition = TransitionContext {
                gate_signal: element.gate_level(time),
                voltage: solution[element.nodes.x] - solution[element.nodes.y],
                current,
                time,
                last_transition_time: element.last_transition,
            };
            let next = validator.compute_next_state(element.switch_state, &transition);
            if next == element.switch_state {
                continue;
            }

            debug!(
                element = %element.name,
                from = %element.switch_state,
                to = %next,
                time,
                "switch transition"
            );
            element.set_switch_state(next);
            element.last_transition = time;
            if element.device != DeviceType::Diode {
                element.params[switch::LAST_SWITCH_TIME] = time;
            }
            changed += 1;
        }
        changed
    }

    fn commit(&mut self, solution: &[f64], currents: &[f64], time: f64) {
        self.state.commit(solution, currents);
        self.currents.copy_from_slice(currents);
        self.sync_histories();

        for (element, &current) in self.netlist.elements_mut().iter_mut().zip(currents) {
            if element.device.is_switch() && element.device != DeviceType::Diode {
                element.params[switch::CURRENT] = current;
                element.params[switch::VOLTAGE] = element.history.voltage;
            }
        }

        self.time = time;
        self.steps += 1;
    }

    /// Copy the accepted currents and voltages into the element histories.
    fn sync_histories(&mut self) {
        let state = &self.state;
        for (idx, element) in self.netlist.elements_mut().iter_mut().enumerate() {
            element.history = History::new(
                state.i_alt[idx],
                state.previous_voltage(element.nodes.x, element.nodes.y),
            );
        }
    }

    /// Write the present state into the stored-value parameter slots, so a
    /// later run can start with [`InitMode::Continue`].
    pub fn store_state(&mut self) {
        let p = &self.state.p_alt;
        for (element, &current) in self.netlist.elements_mut().iter_mut().zip(&self.currents) {
            let (x, y) = (element.nodes.x, element.nodes.y);
            match element.device {
                DeviceType::Capacitor => {
                    element.params[capacitor::STORED_CURRENT] = current;
                    element.params[capacitor::STORED_VOLTAGE] = p[x] - p[y];
                    element.params[capacitor::STORED_POTENTIAL_X] = p[x];
                    element.params[capacitor::STORED_POTENTIAL_Y] = p[y];
                }
                DeviceType::Inductor | DeviceType::CoupledInductor => {
                    element.params[inductor::STORED_CURRENT] = current;
                }
                DeviceType::CurrentSource => {
                    element.params[current_source::STORED_CURRENT] = current;
                }
                DeviceType::VoltageSource => {
                    element.params[voltage_source::STORED_CURRENT] = current;
                }
                _ => {}
            }
        }
    }

    /// Present value of a resolved signal.
    pub fn signal_value(&self, signal: &Signal) -> f64 {
        match signal.source {
            SignalSource::Potential(row) => self.state.p.get(row).copied().unwrap_or(0.0),
            SignalSource::Current(idx) => self.currents.get(idx).copied().unwrap_or(0.0),
        }
    }

    /// Get the present potential of a node by label.
    pub fn node_voltage(&self, label: &str) -> Option<f64> {
        let index = self.netlist.node_index(label)?;
        self.state.p.get(index).copied()
    }

    /// Get the present current of an element by name.
    pub fn element_current(&self, name: &str) -> Option<f64> {
        let idx = self.netlist.element_index(name)?;
        self.currents.get(idx).copied()
    }

    pub fn potentials(&self) -> &[f64] {
        &self.state.p
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn context(&self) -> &SolverContext {
        &self.ctx
    }

    pub fn state(&self) -> &MatrixStateArrays {
        &self.state
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.system.cache_stats()
    }

    /// Get a reference to the netlist.
    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    pub fn into_netlist(self) -> Netlist {
        self.netlist
    }
}
