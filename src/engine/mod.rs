//! Headless simulation engine.
//!
//! [`HeadlessSimulationEngine`] drives one transient run at a time: it loads
//! a circuit, applies parameter overrides, initializes the [`Simulator`] and
//! steps it to the configured duration while logging the probed signals into
//! a [`DataContainer`]. A run can be cancelled from another thread through a
//! [`CancelHandle`]; the run then returns the data gathered so far.

mod config;
mod data;
mod result;

pub use config::{SimulationConfig, DEFAULT_DT, DEFAULT_DURATION};
pub use data::{DataContainer, DataSink};
pub use result::{MetadataValue, SimulationResult, SimulationStatus};

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, info_span, warn};

use crate::circuit::{Netlist, Signal};
use crate::components::StamperRegistry;
use crate::dsl::parse_file;
use crate::error::{Result, SimError};
use crate::solver::{SolverContext, Simulator, StepStatus};

/// Steps between progress reports.
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Upper bound on preallocated sample rows.
const MAX_PREALLOCATED_ROWS: u64 = 1 << 20;

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Idle = 0,
    Running = 1,
    Paused = 2,
    Cancelled = 3,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::Cancelled,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Progress report passed to the progress listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub time: f64,
    pub end_time: f64,
    pub step: u64,
    pub expected_steps: u64,
}

impl Progress {
    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.end_time <= 0.0 {
            return 0.0;
        }
        (self.time / self.end_time).min(1.0)
    }
}

pub type ProgressListener = Box<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Cancels the run of the engine it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl CancelHandle {
    /// Request cancellation; the running simulation stops before its next step.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
        let _ = self.state.compare_exchange(
            EngineState::Running as u8,
            EngineState::Cancelled as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Runs simulations without any user interface.
pub struct HeadlessSimulationEngine {
    state: Arc<AtomicU8>,
    cancel: Arc<AtomicBool>,
    current_time: AtomicF64,
    end_time: AtomicF64,
    current_step: AtomicU64,
    registry: Arc<StamperRegistry>,
    progress_listener: Option<ProgressListener>,
}

impl Default for HeadlessSimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessSimulationEngine {
    /// Engine with the default device stampers.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(StamperRegistry::with_defaults()))
    }

    pub fn with_registry(registry: Arc<StamperRegistry>) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(EngineState::Idle as u8)),
            cancel: Arc::new(AtomicBool::new(false)),
            current_time: AtomicF64::default(),
            end_time: AtomicF64::default(),
            current_step: AtomicU64::new(0),
            registry,
            progress_listener: None,
        }
    }

    /// Called every [`PROGRESS_INTERVAL`] steps.
    pub fn set_progress_listener(&mut self, listener: impl Fn(Progress) + Send + Sync + 'static) {
        self.progress_listener = Some(Box::new(listener));
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancel),
            state: Arc::clone(&self.state),
        }
    }

    /// Request cancellation of the current run.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    pub fn current_time(&self) -> f64 {
        self.current_time.load()
    }

    pub fn current_step(&self) -> u64 {
        self.current_step.load(Ordering::Acquire)
    }

    /// Completed fraction of the current or last run.
    pub fn progress(&self) -> f64 {
        let end = self.end_time.load();
        if end <= 0.0 {
            return 0.0;
        }
        (self.current_time() / end).min(1.0)
    }

    /// Load `config.circuit_file` and simulate it.
    pub fn run_simulation(&self, config: &SimulationConfig) -> SimulationResult {
        self.guarded(|| {
            let started = Instant::now();
            let loaded = config
                .circuit_file
                .as_deref()
                .ok_or_else(|| SimError::invalid_param("no circuit file configured"))
                .and_then(parse_file)
                .and_then(|ast| Netlist::from_ast(&ast));
            match loaded {
                Ok(mut netlist) => self.execute(&mut netlist, config, started),
                Err(err) => {
                    error!(error = %err, "failed to load circuit");
                    finish_failed(SimulationResult::failed(err), config, started)
                }
            }
        })
    }

    /// Simulate an already built netlist.
    ///
    /// Overrides from `config` are applied to `netlist`, and on success the
    /// final state is stored into its parameters for a continued run.
    pub fn run_netlist(
        &self,
        netlist: &mut Netlist,
        config: &SimulationConfig,
    ) -> SimulationResult {
        self.guarded(|| self.execute(netlist, config, Instant::now()))
    }

    fn guarded(&self, run: impl FnOnce() -> SimulationResult) -> SimulationResult {
        if let Err(current) = self.state.compare_exchange(
            EngineState::Idle as u8,
            EngineState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            let state = EngineState::from_u8(current);
            warn!(%state, "simulation rejected");
            return SimulationResult::failed(SimError::EngineBusy {
                state: state.to_string(),
            });
        }
        self.cancel.store(false, Ordering::Release);
        let _idle = IdleOnDrop(&self.state);

        match panic::catch_unwind(AssertUnwindSafe(run)) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%message, "simulation panicked");
                SimulationResult::failed(SimError::Aborted { message })
            }
        }
    }

    fn execute(
        &self,
        netlist: &mut Netlist,
        config: &SimulationConfig,
        started: Instant,
    ) -> SimulationResult {
        let span = info_span!(
            "simulation",
            solver = %config.solver_type,
            dt = config.dt,
            duration = config.duration
        );
        let _enter = span.enter();

        let mut result = SimulationResult::new(SimulationStatus::Success)
            .with_metadata("solver", config.solver_type.to_string())
            .with_metadata("dt", config.dt)
            .with_metadata("duration", config.duration)
            .with_metadata("overrides", config.overrides.len());
        if let Some(path) = &config.circuit_file {
            result = result.with_metadata("source_file", path.display().to_string());
        }

        match self.simulate(netlist, config, started, &mut result) {
            Ok(status) => result.status = status,
            Err(err) => {
                error!(error = %err, time = self.current_time(), "simulation failed");
                result.status = SimulationStatus::Failed;
                result.error = Some(err);
            }
        }

        result.wall_clock_ms = started.elapsed().as_millis() as u64;
        info!(
            status = %result.status,
            steps = result.total_steps,
            wall_clock_ms = result.wall_clock_ms,
            "simulation finished"
        );
        result
    }

    fn simulate(
        &self,
        netlist: &mut Netlist,
        config: &SimulationConfig,
        started: Instant,
        result: &mut SimulationResult,
    ) -> Result<SimulationStatus> {
        config.validate()?;
        for (name, value) in &config.overrides {
            netlist.apply_override(name, *value)?;
        }

        let signals = netlist.resolve_signals()?;
        if signals.is_empty() {
            result.add_warning("circuit has no signals to log");
        }
        let expected_steps = config.expected_steps();
        let rows = if config.enable_data_logging {
            (expected_steps / config.data_logging_interval as u64 + 1).min(MAX_PREALLOCATED_ROWS)
        } else {
            0
        };
        let names = signals.iter().map(|s| s.name.clone()).collect();
        result.data = DataContainer::with_capacity(names, rows as usize);

        let ctx = SolverContext::new(config.dt, config.solver_type)?;
        let mut sim = Simulator::with_config(
            netlist.clone(),
            ctx,
            Arc::clone(&self.registry),
            config.simulator.clone(),
        )?;
        sim.initialize(config.init_mode)?;

        self.end_time.store(config.duration);
        self.current_time.store(0.0);
        self.current_step.store(0, Ordering::Release);
        info!(
            expected_steps,
            signals = signals.len(),
            init = ?config.init_mode,
            "simulation started"
        );

        let mut values = vec![0.0; signals.len()];
        let interval = config.data_logging_interval as u64;
        if config.enable_data_logging {
            record(&sim, &signals, &mut values, &mut result.data);
        }

        let status = loop {
            if self.cancel.load(Ordering::Acquire) {
                warn!(time = sim.time(), step = sim.steps(), "simulation cancelled");
                break SimulationStatus::Cancelled;
            }
            if let Some(limit) = config.timeout {
                if started.elapsed() > limit {
                    warn!(time = sim.time(), ?limit, "simulation timed out");
                    result.add_warning(format!("wall-clock limit of {:?} exceeded", limit));
                    break SimulationStatus::Timeout;
                }
            }

            let step_status = sim.step_until(config.duration)?;
            let step = sim.steps();
            if config.enable_data_logging && step % interval == 0 {
                record(&sim, &signals, &mut values, &mut result.data);
            }
            self.current_time.store(sim.time());
            self.current_step.store(step, Ordering::Release);

            if step % PROGRESS_INTERVAL == 0 {
                if let Some(listener) = &self.progress_listener {
                    listener(Progress {
                        time: sim.time(),
                        end_time: config.duration,
                        step,
                        expected_steps,
                    });
                }
            }

            if step_status == StepStatus::EndReached {
                break SimulationStatus::Success;
            }
        };

        let cache = sim.cache_stats();
        result.total_steps = sim.steps();
        result.simulated_time = sim.time();
        result.metadata.insert("cache_hits".to_string(), cache.hits.into());
        result.metadata.insert("cache_misses".to_string(), cache.misses.into());

        if status == SimulationStatus::Success {
            sim.store_state();
            *netlist = sim.into_netlist();
        }
        Ok(status)
    }
}

/// Puts the engine back to `Idle` when a run ends, however it ends.
struct IdleOnDrop<'a>(&'a AtomicU8);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(EngineState::Idle as u8, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn record(sim: &Simulator, signals: &[Signal], values: &mut [f64], sink: &mut impl DataSink) {
    for (value, signal) in values.iter_mut().zip(signals) {
        *value = sim.signal_value(signal);
    }
    sink.insert_values_at_end(values, sim.time());
}

fn finish_failed(
    mut result: SimulationResult,
    config: &SimulationConfig,
    started: Instant,
) -> SimulationResult {
    if let Some(path) = &config.circuit_file {
        result = result.with_metadata("source_file", path.display().to_string());
    }
    result.wall_clock_ms = started.elapsed().as_millis() as u64;
    result
}
