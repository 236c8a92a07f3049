//! Flat netlist: elements with matrix indices, node labels and couplings.

use std::collections::HashMap;

use tracing::debug;

use super::coupling::{CouplingArrays, MutualCouplingRegistry};
use super::labels::LabelResolver;
use super::validate::{check_terminals, validate_netlist};
use crate::components::params::{capacitor, current_source, diode, inductor, switch, voltage_source};
use crate::components::{
    CurrentSourceStamper, DeviceType, DiodeStamper, History, SourceKind, SwitchStamper, Terminals,
    VoltageSourceStamper,
};
use crate::dsl::{CircuitAst, ComponentDef, ComponentType, ModelDef, ProbeDef, SourceForm, TranDef};
use crate::error::{Result, SimError};
use crate::switching::{GateSignal, StateTransitionValidator, SwitchState};

/// Label of the ground node.
pub const GROUND_LABEL: &str = "0";

/// One circuit element with its matrix indices and state.
#[derive(Debug, Clone, PartialEq)]
pub struct NetlistElement {
    pub name: String,
    pub device: DeviceType,
    pub nodes: Terminals,
    /// Type-specific parameter vector (see [`crate::components::params`]).
    pub params: Vec<f64>,
    /// Current and voltage of the last accepted step.
    pub history: History,
    /// Gate drive of a controlled switch.
    pub gate: Option<GateSignal>,
    pub switch_state: SwitchState,
    /// Time of the last switch transition.
    pub last_transition: f64,
}

impl NetlistElement {
    /// Create an element. A short parameter vector is padded with the
    /// device's defaults.
    pub fn new(
        name: impl Into<String>,
        device: DeviceType,
        nodes: Terminals,
        mut params: Vec<f64>,
    ) -> Self {
        device.complete_parameters(&mut params);
        let mut element = Self {
            name: name.into(),
            device,
            nodes,
            params,
            history: History::default(),
            gate: None,
            switch_state: SwitchState::Off,
            last_transition: f64::NEG_INFINITY,
        };
        element.switch_state = SwitchState::from_conducting(element.is_conducting());
        element
    }

    pub fn with_gate(mut self, gate: GateSignal) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Conduction as encoded in the parameter vector.
    pub fn is_conducting(&self) -> bool {
        match self.device {
            DeviceType::Diode => DiodeStamper::is_conducting(&self.params),
            d if d.is_switch() => SwitchStamper::is_conducting(&self.params),
            _ => false,
        }
    }

    /// Set the switch state and the matching resistance or conduction flag.
    pub fn set_switch_state(&mut self, state: SwitchState) {
        self.switch_state = state;
        match self.device {
            DeviceType::Diode => {
                DiodeStamper::set_conducting(&mut self.params, state.is_conducting())
            }
            d if d.is_switch() => {
                SwitchStamper::set_conducting(&mut self.params, state.is_conducting())
            }
            _ => {}
        }
    }

    pub fn forward_voltage(&self) -> f64 {
        match self.device {
            DeviceType::Diode => DiodeStamper::forward_voltage(&self.params),
            d if d.is_switch() => self.params.get(switch::U_FORWARD).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Commutation rules for a switching element.
    pub fn validator(&self) -> Option<StateTransitionValidator> {
        let switch_type = self.device.switch_type()?;
        let recovery_time = match self.device {
            DeviceType::Diode => 0.0,
            _ => self.params.get(switch::RECOVERY_TIME).copied().unwrap_or(0.0),
        };
        Some(StateTransitionValidator::new(
            switch_type,
            self.forward_voltage(),
            recovery_time,
        ))
    }

    /// Gate level at time `t` (0 without a gate).
    pub fn gate_level(&self, t: f64) -> f64 {
        self.gate.map_or(0.0, |g| g.value_at(t))
    }
}

/// Where a logged signal is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    /// Potential of a matrix row
    Potential(usize),
    /// Current of an element
    Current(usize),
}

/// A resolved output signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
    pub source: SignalSource,
}

/// A circuit ready for simulation.
///
/// Matrix index 0 is ground, nodes follow, and branch rows of voltage
/// sources and coupled inductors come last.
#[derive(Debug, Clone)]
pub struct Netlist {
    elements: Vec<NetlistElement>,
    labels: LabelResolver,
    node_count: usize,
    branch_count: usize,
    couplings: MutualCouplingRegistry,
    probes: Vec<ProbeDef>,
    tran: Option<TranDef>,
}

impl Default for Netlist {
    fn default() -> Self {
        Self::new()
    }
}

impl Netlist {
    /// Empty netlist holding only the ground node.
    pub fn new() -> Self {
        let mut labels = LabelResolver::new();
        labels.insert(GROUND_LABEL.to_string(), 0);
        Self {
            elements: Vec::new(),
            labels,
            node_count: 1,
            branch_count: 0,
            couplings: MutualCouplingRegistry::new(),
            probes: Vec::new(),
            tran: None,
        }
    }

    /// Build a netlist from a parsed AST.
    pub fn from_ast(ast: &CircuitAst) -> Result<Self> {
        let mut netlist = Netlist::new();

        for node in &ast.nodes {
            netlist.add_node(node)?;
        }

        for def in &ast.components {
            let element = netlist.element_from_def(def, &ast.models)?;
            netlist.add_element(element)?;
        }

        for coupling in &ast.couplings {
            netlist.couple(&coupling.inductor_a, &coupling.inductor_b, coupling.coefficient)?;
        }

        netlist.probes = ast.probes.clone();
        netlist.tran = ast.tran;

        validate_netlist(&netlist)?;
        debug!(
            elements = netlist.elements.len(),
            nodes = netlist.node_count,
            branches = netlist.branch_count,
            couplings = netlist.couplings.len(),
            "netlist built"
        );
        Ok(netlist)
    }

    /// Index of a node, adding it if new.
    pub fn add_node(&mut self, label: &str) -> Result<usize> {
        if let Some(index) = self.labels.index_of(label) {
            return Ok(index);
        }
        let index = self.node_count;
        self.labels.add_label(label, index)?;
        self.node_count += 1;
        self.renumber_branches();
        Ok(index)
    }

    /// Append an element. Branch rows are assigned automatically.
    ///
    /// Terminals must name nodes added before; a controlled source's control
    /// nodes likewise.
    pub fn add_element(&mut self, mut element: NetlistElement) -> Result<usize> {
        if self.element_index(&element.name).is_some() {
            return Err(SimError::DuplicateComponent { name: element.name });
        }
        check_terminals(&element, self.node_count)?;
        element.device.complete_parameters(&mut element.params);
        let has_branch = element.device.has_branch();
        if !has_branch {
            element.nodes.z = 0;
        }
        self.elements.push(element);
        if has_branch {
            self.renumber_branches();
        }
        Ok(self.elements.len() - 1)
    }

    /// Magnetically couple two inductors. Plain inductors become branch inductors.
    pub fn couple(&mut self, a: &str, b: &str, k: f64) -> Result<()> {
        let ia = self.inductor_index(a)?;
        let ib = self.inductor_index(b)?;
        let la = self.inductance(ia);
        let lb = self.inductance(ib);
        self.couplings.register(ia, ib, k, la, lb)?;
        for idx in [ia, ib] {
            self.elements[idx].device = DeviceType::CoupledInductor;
        }
        self.renumber_branches();
        Ok(())
    }

    fn inductor_index(&self, name: &str) -> Result<usize> {
        let idx = self
            .element_index(name)
            .ok_or_else(|| SimError::invalid_coupling(format!("unknown inductor '{}'", name)))?;
        match self.elements[idx].device {
            DeviceType::Inductor | DeviceType::CoupledInductor => Ok(idx),
            other => Err(SimError::invalid_coupling(format!(
                "'{}' is not an inductor ({})",
                name, other
            ))),
        }
    }

    fn inductance(&self, idx: usize) -> f64 {
        self.elements[idx].params.get(inductor::INDUCTANCE).copied().unwrap_or(0.0)
    }

    fn renumber_branches(&mut self) {
        let mut next = self.node_count;
        for element in &mut self.elements {
            if element.device.has_branch() {
                element.nodes.z = next;
                next += 1;
            } else {
                element.nodes.z = 0;
            }
        }
        self.branch_count = next - self.node_count;
    }

    fn node(&self, name: &str) -> Result<usize> {
        self.labels
            .index_of(name)
            .ok_or_else(|| SimError::NodeNotFound { node: name.to_string() })
    }

    fn element_from_def(
        &self,
        def: &ComponentDef,
        models: &HashMap<String,
        ModelDef>,
    ) -> Result<NetlistElement> {
        let x = self.node(&def.nodes[0])?;
        let y = self.node(&def.nodes[1])?;
        let nodes = Terminals::new(x, y);
        let value = def.value().unwrap_or(0.0);

        let model = match &def.model_ref {
            Some(name) => {
                let model = models.get(name).ok_or_else(|| SimError::UndefinedModel {
                    model: name.clone(),
                    component: def.name.clone(),
                })?;
                if model.model_type.component_type() != def.component_type {
                    return Err(SimError::invalid_component(
                        &def.name,
                        def.line,
                        format!("model '{}' does not fit this element", name),
                    ));
                }
                Some(model)
            }
            None => None,
        };
        // Inline parameters override the model.
        let lookup = |key: &str| {
            def.param(key)
                .or_else(|| model.and_then(|m| m.params.get(key).copied()))
        };

        let element = match def.component_type {
            ComponentType::Resistor => NetlistElement::new(
                &def.name,
                DeviceType::Resistor,
                nodes,
                vec![value],
            ),
            ComponentType::Capacitor => {
                let mut params = vec![0.0; capacitor::LEN];
                params[capacitor::CAPACITANCE] = value;
                params[capacitor::INITIAL_VOLTAGE] = def.param("ic").unwrap_or(0.0);
                NetlistElement::new(&def.name, DeviceType::Capacitor, nodes, params)
            }
            ComponentType::Inductor => {
                let mut params = vec![0.0; inductor::LEN];
                params[inductor::INDUCTANCE] = value;
                params[inductor::INITIAL_CURRENT] = def.param("ic").unwrap_or(0.0);
                NetlistElement::new(&def.name, DeviceType::Inductor, nodes, params)
            }
            ComponentType::VoltageSource => {
                let params = match def.source {
                    Some(SourceForm::Ac) => VoltageSourceStamper::ac_parameters(
                        value,
                        def.values[1],
                        def.values.get(2).copied().unwrap_or(0.0),
                    ),
                    _ => VoltageSourceStamper::dc_parameters(value),
                };
                NetlistElement::new(&def.name, DeviceType::VoltageSource, nodes, params)
            }
            ComponentType::CurrentSource => {
                let params = match def.source {
                    Some(SourceForm::Ac) => CurrentSourceStamper::ac_parameters(
                        value,
                        def.values[1],
                        def.values.get(2).copied().unwrap_or(0.0),
                    ),
                    _ => CurrentSourceStamper::dc_parameters(value),
                };
                NetlistElement::new(&def.name, DeviceType::CurrentSource, nodes, params)
            }
            ComponentType::Vcvs => {
                let cx = self.node(&def.nodes[2])?;
                let cy = self.node(&def.nodes[3])?;
                let params = VoltageSourceStamper::controlled_parameters(value, cx, cy);
                NetlistElement::new(&def.name, DeviceType::VoltageSource, nodes, params)
            }
            ComponentType::Diode => {
                let params = DiodeStamper::parameters(
                    lookup("ron").unwrap_or(diode::DEFAULT_R_ON),
                    lookup("roff").unwrap_or(diode::DEFAULT_R_OFF),
                    lookup("vf").unwrap_or(diode::DEFAULT_U_FORWARD),
                );
                NetlistElement::new(&def.name, DeviceType::Diode, nodes, params)
            }
            ComponentType::Switch
            | ComponentType::Mosfet
            | ComponentType::Igbt
            | ComponentType::Thyristor => {
                let device = match def.component_type {
                    ComponentType::Switch => DeviceType::IdealSwitch,
                    ComponentType::Mosfet => DeviceType::Mosfet,
                    ComponentType::Igbt => DeviceType::Igbt,
                    _ => DeviceType::Thyristor,
                };
                let gate = match def.param("freq") {
                    Some(freq) => GateSignal::pulse(
                        freq,
                        def.param("duty").unwrap_or(0.5),
                        def.param("delay").unwrap_or(0.0),
                    ),
                    None => GateSignal::Constant(def.param("gate").unwrap_or(0.0)),
                };
                let mut params = SwitchStamper::parameters(
                    lookup("ron").unwrap_or(switch::DEFAULT_R_ON),
                    lookup("roff").unwrap_or(switch::DEFAULT_R_OFF),
                    lookup("vf").unwrap_or_else(|| SwitchStamper::default_forward_voltage(device)),
                    gate.value_at(0.0),
                );
                params[switch::RECOVERY_TIME] =
                    lookup("trr").unwrap_or(switch::DEFAULT_RECOVERY_TIME);
                NetlistElement::new(&def.name, device, nodes, params).with_gate(gate)
            }
            ComponentType::Coupling => {
                return Err(SimError::invalid_component(
                    &def.name,
                    def.line,
                    "coupling is not a two-terminal element",
                ));
            }
        };

        Ok(element)
    }

    /// Make the netlist safe to simulate after direct edits through
    /// [`Netlist::elements_mut`]: pads short parameter vectors and checks
    /// every matrix index.
    pub fn prepare(&mut self) -> Result<()> {
        for element in &mut self.elements {
            element.device.complete_parameters(&mut element.params);
        }
        validate_netlist(self)
    }

    /// Change a parameter by name: `R1` sets the primary value, `C1.ic` a named slot.
    ///
    /// Slot names: `ic`, `amp`, `freq`, `phase`, `gain`, `ron`, `roff`, `vf`,
    /// `trr` and `gate`.
    pub fn apply_override(&mut self, name: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            let message = format!("override {} = {} is not finite", name, value);
            return Err(SimError::invalid_param(message));
        }
        let unknown = || SimError::UnknownParameter { name: name.to_string() };
        let (element_name, slot) = match name.split_once('.') {
            Some((element, slot)) => (element, Some(slot.to_ascii_lowercase())),
            None => (name, None),
        };
        let idx = self.element_index(element_name).ok_or_else(unknown)?;
        let element = &mut self.elements[idx];
        let kind = SourceKind::from_code(element.params[voltage_source::SOURCE_TYPE]);
        let controlled = element.device == DeviceType::VoltageSource
            && kind == Some(SourceKind::VoltageControlled);

        let offset = match (element.device, slot.as_deref()) {
            (DeviceType::Resistor, None) => 0,
            (DeviceType::Capacitor, None) => capacitor::CAPACITANCE,
            (DeviceType::Capacitor, Some("ic")) => capacitor::INITIAL_VOLTAGE,
            (DeviceType::Inductor | DeviceType::CoupledInductor, None) => inductor::INDUCTANCE,
            (DeviceType::Inductor | DeviceType::CoupledInductor, Some("ic")) => {
                inductor::INITIAL_CURRENT
            }
            (DeviceType::VoltageSource, Some("gain")) if controlled => voltage_source::AMPLITUDE,
            (DeviceType::VoltageSource, None | Some("amp")) if !controlled => {
                voltage_source::AMPLITUDE
            }
            (DeviceType::VoltageSource, None) => voltage_source::AMPLITUDE,
            (DeviceType::VoltageSource, Some("freq")) if !controlled => voltage_source::FREQUENCY,
            (DeviceType::VoltageSource, Some("phase")) if !controlled => voltage_source::PHASE,
            (DeviceType::CurrentSource, None | Some("amp")) => current_source::AMPLITUDE,
            (DeviceType::CurrentSource, Some("freq")) => current_source::FREQUENCY,
            (DeviceType::CurrentSource, Some("phase")) => current_source::PHASE,
            (DeviceType::Diode, None | Some("ron")) => diode::R_ON,
            (DeviceType::Diode, Some("roff")) => diode::R_OFF,
            (DeviceType::Diode, Some("vf")) => diode::U_FORWARD,
            (d, Some("gate")) if d.is_switch() && d != DeviceType::Diode => {
                element.gate = Some(GateSignal::Constant(value));
                element.params[switch::GATE] = value;
                return Ok(());
            }
            (d, None | Some("ron")) if d.is_switch() => switch::R_ON,
            (d, Some("roff")) if d.is_switch() => switch::R_OFF,
            (d, Some("vf")) if d.is_switch() => switch::U_FORWARD,
            (d, Some("trr")) if d.is_switch() => switch::RECOVERY_TIME,
            _ => return Err(unknown()),
        };

        let conducting = element.is_conducting();
        element.params[offset] = value;
        if element.device.is_switch() && element.device != DeviceType::Diode {
            SwitchStamper::set_conducting(&mut element.params, conducting);
        }
        if element.device == DeviceType::CoupledInductor && offset == inductor::INDUCTANCE {
            self.refresh_couplings(idx)?;
        }
        debug!(parameter = name, value, "parameter override applied");
        Ok(())
    }

    /// Re-register the couplings of element `idx` after its inductance changed.
    fn refresh_couplings(&mut self, idx: usize) -> Result<()> {
        let existing: Vec<(usize, usize, f64)> = self
            .couplings
            .couplings_for(idx)
            .iter()
            .map(|c| (c.inductor_a(), c.inductor_b(), c.coefficient()))
            .collect();
        for (a, b, k) in existing {
            self.couplings.remove_coupling(a, b);
            let la = self.inductance(a);
            let lb = self.inductance(b);
            self.couplings.register(a, b, k, la, lb)?;
        }
        Ok(())
    }

    /// Signals to log: the `.probe` list, or every node potential without one.
    pub fn resolve_signals(&self) -> Result<Vec<Signal>> {
        if self.probes.is_empty() {
            return Ok((1..self.node_count)
                .filter_map(|index| {
                    self.labels.label_at(index).map(|label| Signal {
                        name: label.to_string(),
                        source: SignalSource::Potential(index),
                    })
                })
                .collect());
        }

        self.probes
            .iter()
            .map(|probe| {
                let source = match probe {
                    ProbeDef::Node(label) => {
                        SignalSource::Potential(self.labels.index_or_error(label, "probe")?)
                    }
                    ProbeDef::Current(name) => {
                        let idx = self.element_index(name).ok_or_else(|| {
                            SimError::label_not_found(probe.signal_name(), "probe")
                        })?;
                        SignalSource::Current(idx)
                    }
                };
                Ok(Signal {
                    name: probe.signal_name(),
                    source,
                })
            })
            .collect()
    }

    pub fn add_probe(&mut self, probe: ProbeDef) {
        if !self.probes.contains(&probe) {
            self.probes.push(probe);
        }
    }

    pub fn probes(&self) -> &[ProbeDef] {
        &self.probes
    }

    pub fn elements(&self) -> &[NetlistElement] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [NetlistElement] {
        &mut self.elements
    }

    pub fn element(&self, name: &str) -> Option<&NetlistElement> {
        self.element_index(name).map(|i| &self.elements[i])
    }

    /// Index of an element by name; exact match first, then case-insensitive.
    pub fn element_index(&self, name: &str) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| e.name == name)
            .or_else(|| self.elements.iter().position(|e| e.name.eq_ignore_ascii_case(name)))
    }

    pub fn labels(&self) -> &LabelResolver {
        &self.labels
    }

    pub fn node_index(&self, label: &str) -> Option<usize> {
        self.labels.index_of(label)
    }

    /// Number of nodes including ground.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn branch_count(&self) -> usize {
        self.branch_count
    }

    /// Full matrix dimension, ground row included.
    pub fn matrix_size(&self) -> usize {
        self.node_count + self.branch_count
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn couplings(&self) -> &MutualCouplingRegistry {
        &self.couplings
    }

    /// Branch row per element (0 for elements without one).
    pub fn branch_rows(&self) -> Vec<usize> {
        self.elements.iter().map(|e| e.nodes.z).collect()
    }

    pub fn coupling_arrays(&self) -> Result<CouplingArrays> {
        self.couplings.build_coupling_arrays(&self.branch_rows())
    }

    pub fn tran(&self) -> Option<TranDef> {
        self.tran
    }
}
