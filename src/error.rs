//! Error types for the power-tree estimator.
//!
//! This module provides a unified error type [`PowerTreeError`] that covers
//! netlist parsing, network construction, and the relaxation solve.
//! Limit excursions are not errors; they are reported as
//! [`Warnings`](crate::components::Warnings) in the result rows.

use thiserror::Error;

/// Result type alias using [`PowerTreeError`].
pub type Result<T> = std::result::Result<T, PowerTreeError>;

/// Unified error type for all power-tree operations.
#[derive(Error, Debug)]
pub enum PowerTreeError {
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

    /// Unknown component keyword
    #[error("Unknown component type '{component_type}' at line {line}")]
    UnknownComponentType { component_type: String, line: usize },

    /// Undefined interpolation table reference
    #[error("Undefined table '{table}' referenced by component '{component}'")]
    UndefinedTable { table: String, component: String },

    // ============ Network Construction Errors ============
    /// Invalid parameter value
    #[error("Invalid parameter '{param}' for component '{component}': {message}")]
    InvalidParameter {
        component: String,
        param: String,
        message: String,
    },

    /// Malformed interpolation table
    #[error("Invalid table for component '{component}': {message}")]
    InvalidTable { component: String, message: String },

    /// Malformed limits
    #[error("Invalid limit '{metric}' for component '{component}': {message}")]
    InvalidLimits {
        component: String,
        metric: String,
        message: String,
    },

    /// Duplicate component or rail name
    #[error("Duplicate name '{name}'")]
    DuplicateName { name: String },

    /// Component or rail not found in network
    #[error("Component '{name}' not found in network")]
    ComponentNotFound { name: String },

    /// Child component type not allowed below parent type
    #[error("Component '{child}' ({child_kind}) cannot be connected to '{parent}' ({parent_kind})")]
    IncompatibleChild {
        parent: String,
        parent_kind: String,
        child: String,
        child_kind: String,
    },

    /// More than one power multiplexer
    #[error("Only one PMux is allowed per network ('{existing}' already present)")]
    MultipleMux { existing: String },

    /// Invalid network topology
    #[error("Invalid network topology: {message}")]
    InvalidTopology { message: String },

    /// Invalid load phase definition
    #[error("Invalid phases: {message}")]
    InvalidPhases { message: String },

    /// Reserved phase name used
    #[error("Phase name '{name}' is reserved")]
    ReservedPhaseName { name: String },

    /// Phase configuration not supported by the component kind
    #[error("Component '{component}' does not support this phase configuration: {message}")]
    UnsupportedPhaseConfig { component: String, message: String },

    // ============ Solver Errors ============
    /// Output polarity of a series element would invert
    #[error("Unstable system: '{component}' would invert output voltage polarity")]
    UnstableSystem { component: String },

    /// Relaxation did not reach a fixed point
    #[error("Steady state not reached after {iterations} iterations{}", phase_suffix(.phase))]
    ConvergenceFailure {
        iterations: usize,
        phase: Option<String>,
    },

    /// Requested phase is not defined
    #[error("Phase '{phase}' is not defined")]
    UnknownPhase { phase: String },

    /// Invalid solver parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ I/O Errors ============
    /// Error reading netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a report
    #[error("Report output error: {source}")]
    OutputError {
        #[from]
        source: std::io::Error,
    },
}

fn phase_suffix(phase: &Option<String>) -> String {
    match phase {
        Some(p) => format!(" in phase '{}'", p),
        None => String::new(),
    }
}

impl PowerTreeError {
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

    /// Create an invalid parameter error
    pub fn invalid_param(
        component: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            component: component.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid table error
    pub fn invalid_table(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTable {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a component-not-found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::ComponentNotFound { name: name.into() }
    }

    /// Create a topology error
    pub fn topology(message: impl Into<String>) -> Self {
        Self::InvalidTopology {
            message: message.into(),
        }
    }

    /// Create an unstable system error
    pub fn unstable(component: impl Into<String>) -> Self {
        Self::UnstableSystem {
            component: component.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, phase: Option<&str>) -> Self {
        Self::ConvergenceFailure {
            iterations,
            phase: phase.map(str::to_string),
        }
    }
}
