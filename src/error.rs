//! Error types for the powersim circuit simulator.
//!
//! This module provides a unified error type [`SimError`] that covers
//! all error conditions that can occur during netlist parsing, circuit
//! construction, and transient simulation.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for all powersim operations.
#[derive(Error, Debug)]
pub enum SimError {
    // ============ DSL Parsing Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Invalid component definition
    #[error("Invalid component '{name}' at line {line}: {message}")]
    InvalidComponent {
        name: String,
        line: usize,
        message: String,
    },

    /// Unknown component type
    #[error("Unknown component type '{component_type}' at line {line}")]
    UnknownComponentType { component_type: String, line: usize },

    /// Undefined model reference
    #[error("Undefined model '{model}' referenced by component '{component}'")]
    UndefinedModel { model: String, component: String },

    /// Duplicate component name
    #[error("Duplicate component name '{name}'")]
    DuplicateComponent { name: String },

    /// Duplicate model name
    #[error("Duplicate model name '{name}'")]
    DuplicateModel { name: String },

    // ============ Netlist Errors ============
    /// Node or element not found in the netlist
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    /// A measurement references a label that does not exist
    #[error("Error in measurement component {component}\nThe label reference \"{label}\" was not found.\nPlease check the label or disable the measurement component.")]
    LabelNotFound { label: String, component: String },

    /// Label rejected by the resolver
    #[error("Invalid label: {message}")]
    InvalidLabel { message: String },

    /// Coupling rejected by the registry
    #[error("Invalid coupling: {message}")]
    InvalidCoupling { message: String },

    /// The same inductor pair was coupled twice
    #[error("Coupling between inductors {a} and {b} already exists")]
    DuplicateCoupling { a: usize, b: usize },

    /// Parameter override names an unknown element or slot
    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },

    /// Invalid circuit topology
    #[error("Invalid circuit topology: {message}")]
    InvalidTopology { message: String },

    // ============ Configuration Errors ============
    /// Step width is not a positive finite number
    #[error("Invalid step width dt = {dt:e}: must be a positive finite number")]
    InvalidStepWidth { dt: f64 },

    /// Duration is not a positive finite number
    #[error("Invalid simulation duration {duration:e}: must be a positive finite number")]
    InvalidDuration { duration: f64 },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    /// Unrecognized solver type string
    #[error("Unknown solver type '{name}' (expected be, trz or gs)")]
    InvalidSolverType { name: String },

    // ============ Simulation Errors ============
    /// Matrix is singular and cannot be solved
    #[error("Singular matrix - circuit may have a short circuit or floating node")]
    SingularMatrix,

    /// Matrix or vector dimensions do not agree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Switch states kept changing beyond the iteration cap
    #[error("Switching did not converge within {iterations} iterations at t = {time:e}s")]
    SwitchingNotConverged { iterations: usize, time: f64 },

    /// No stamper registered for a device type
    #[error("No stamper registered for device type {device}")]
    MissingStamper { device: String },

    /// Engine is not idle
    #[error("Simulation engine is busy (state: {state})")]
    EngineBusy { state: String },

    /// A run was aborted by a panic inside the simulator
    #[error("Simulation aborted: {message}")]
    Aborted { message: String },

    // ============ I/O Errors ============
    /// Error reading circuit file
    #[error("Failed to read circuit file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid component error
    pub fn invalid_component(
        name: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidComponent {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a label-not-found error
    pub fn label_not_found(label: impl Into<String>, component: impl Into<String>) -> Self {
        Self::LabelNotFound {
            label: label.into(),
            component: component.into(),
        }
    }

    /// Create an invalid coupling error
    pub fn invalid_coupling(message: impl Into<String>) -> Self {
        Self::InvalidCoupling {
            message: message.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }

    /// Create a switching non-convergence error
    pub fn not_converged(iterations: usize, time: f64) -> Self {
        Self::SwitchingNotConverged { iterations, time }
    }
}
