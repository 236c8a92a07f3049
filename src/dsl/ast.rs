//! Abstract Syntax Tree types for the circuit DSL.

use std::collections::HashMap;

use crate::solver::SolverType;

/// Complete AST representation of a parsed circuit.
#[derive(Debug, Clone, Default)]
pub struct CircuitAst {
    /// All element instances in source order
    pub components: Vec<ComponentDef>,
    /// Model definitions
    pub models: HashMap<String, ModelDef>,
    /// Magnetic couplings (`K` lines)
    pub couplings: Vec<CouplingDef>,
    /// Transient analysis settings from `.tran`
    pub tran: Option<TranDef>,
    /// Signals requested with `.probe`
    pub probes: Vec<ProbeDef>,
    /// Non-ground node names in order of first appearance
    pub nodes: Vec<String>,
}

impl CircuitAst {
    /// Create a new empty circuit AST.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node name, ignoring ground aliases and repeats.
    pub(crate) fn add_node(&mut self, name: &str) {
        if !is_ground(name) && !self.nodes.iter().any(|n| n == name) {
            self.nodes.push(name.to_string());
        }
    }
}

/// Whether a node name refers to ground.
pub fn is_ground(name: &str) -> bool {
    name == "0" || name.eq_ignore_ascii_case("gnd")
}

/// A component definition from the DSL.
#[derive(Debug, Clone)]
pub struct ComponentDef {
    pub component_type: ComponentType,
    /// Unique component name
    pub name: String,
    /// Connected node names
    pub nodes: Vec<String>,
    /// Positional numbers after the nodes
    pub values: Vec<f64>,
    /// Waveform keyword for sources
    pub source: Option<SourceForm>,
    /// Reference to a `.model`
    pub model_ref: Option<String>,
    /// `name=value` parameters, lower-cased
    pub params: HashMap<String, f64>,
    /// Source line number for error reporting
    pub line: usize,
}

impl ComponentDef {
    /// First positional value.
    pub fn value(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn param(&self, name: &str) -> Option<f64> {
        self.params.get(name).copied()
    }
}

/// Waveform keyword of a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceForm {
    /// `DC value`
    Dc,
    /// `AC amplitude frequency [phase]`
    Ac,
}

/// Element types supported by the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    CurrentSource,
    /// Voltage-controlled voltage source
    Vcvs,
    Diode,
    /// Ideal switch
    Switch,
    Mosfet,
    Igbt,
    Thyristor,
    /// Magnetic coupling between two inductors
    Coupling,
}

impl ComponentType {
    /// Parse a component type from its DSL prefix.
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'R' => Some(Self::Resistor),
            'C' => Some(Self::Capacitor),
            'L' => Some(Self::Inductor),
            'V' => Some(Self::VoltageSource),
            'I' => Some(Self::CurrentSource),
            'E' => Some(Self::Vcvs),
            'D' => Some(Self::Diode),
            'S' => Some(Self::Switch),
            'M' => Some(Self::Mosfet),
            'K' => Some(Self::Coupling),
            _ => None,
        }
    }

    /// Parse a component type from a keyword. The element name follows the keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "IGBT" => Some(Self::Igbt),
            "THY" | "THYRISTOR" | "SCR" => Some(Self::Thyristor),
            _ => None,
        }
    }

    /// Get the expected number of nodes for this component type.
    ///
    /// For couplings the "nodes" are the names of the two inductors.
    pub fn expected_node_count(&self) -> usize {
        match self {
            Self::Vcvs => 4, // out+, out-, ctrl+, ctrl-
            _ => 2,
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            Self::Diode | Self::Switch | Self::Mosfet | Self::Igbt | Self::Thyristor
        )
    }
}

/// A model definition for diodes and switches.
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    pub model_type: ModelType,
    /// Model parameters, lower-cased
    pub params: HashMap<String, f64>,
    /// Source line number
    pub line: usize,
}

/// Model types for parameterized components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Diode,
    Switch,
    Mosfet,
    Igbt,
    Thyristor,
}

impl ModelType {
    /// Parse a model type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "D" | "DIODE" => Some(Self::Diode),
            "S" | "SW" | "SWITCH" => Some(Self::Switch),
            "NMOS" | "MOSFET" => Some(Self::Mosfet),
            "IGBT" => Some(Self::Igbt),
            "THY" | "THYRISTOR" | "SCR" => Some(Self::Thyristor),
            _ => None,
        }
    }

    /// Component type this model may be used with.
    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::Diode => ComponentType::Diode,
            Self::Switch => ComponentType::Switch,
            Self::Mosfet => ComponentType::Mosfet,
            Self::Igbt => ComponentType::Igbt,
            Self::Thyristor => ComponentType::Thyristor,
        }
    }
}

/// `K<name> <inductor> <inductor> <k>`
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingDef {
    pub name: String,
    pub inductor_a: String,
    pub inductor_b: String,
    pub coefficient: f64,
    pub line: usize,
}

/// `.tran <dt> <duration> [solver]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranDef {
    pub dt: f64,
    pub duration: f64,
    pub solver: Option<SolverType>,
}

/// A signal requested with `.probe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeDef {
    /// Node potential by label
    Node(String),
    /// Element current, written `I(name)`
    Current(String),
}

impl ProbeDef {
    /// Signal name as shown in results.
    pub fn signal_name(&self) -> String {
        match self {
            Self::Node(label) => label.clone(),
            Self::Current(name) => format!("I({})", name),
        }
    }
}
