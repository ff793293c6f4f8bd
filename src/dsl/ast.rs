//! Abstract Syntax Tree types for the power-tree DSL.

use std::collections::HashMap;

use crate::components::{InterpTable, Metric, PhaseConfig};

/// Complete AST representation of a parsed netlist.
#[derive(Debug, Clone, Default)]
pub struct NetlistAst {
    /// System name from `.system`
    pub name: Option<String>,
    /// Component instances, in declaration order
    pub components: Vec<ComponentDef>,
    /// Interpolation tables from `.table`
    pub tables: HashMap<String, InterpTable>,
    /// Load phases from `.phases`, in declaration order
    pub phases: Vec<(String, f64)>,
    /// Per-component phase configuration from `.active` and `.phase`
    pub phase_configs: Vec<PhaseDef>,
    /// Per-component limits from `.limits`
    pub limits: Vec<LimitDef>,
}

impl NetlistAst {
    /// Create a new empty netlist AST.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A component definition from the DSL.
#[derive(Debug, Clone)]
pub struct ComponentDef {
    /// Component type keyword
    pub component_type: ComponentType,
    /// Unique component name
    pub name: String,
    /// Parent component or rail names (several only for PMUX)
    pub parents: Vec<String>,
    /// Output rail name
    pub rail: Option<String>,
    /// Group label
    pub group: Option<String>,
    /// Physical parameters
    pub params: HashMap<String, ParamValue>,
    /// Source line number for error reporting
    pub line: usize,
}

/// A parameter value: a number or a reference to a `.table`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Ref(String),
}

/// Component types supported by the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    /// Voltage source
    Source,
    /// Constant power load
    PLoad,
    /// Constant current load
    ILoad,
    /// Resistive load
    RLoad,
    /// Resistive series loss
    RLoss,
    /// Voltage-drop series loss
    VLoss,
    /// Switching converter
    Converter,
    /// Linear regulator
    LinReg,
    /// Power switch
    PSwitch,
    /// Power multiplexer
    PMux,
    /// Bridge rectifier
    Rectifier,
}

impl ComponentType {
    /// Parse a component type from a keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "SOURCE" => Some(Self::Source),
            "PLOAD" => Some(Self::PLoad),
            "ILOAD" => Some(Self::ILoad),
            "RLOAD" => Some(Self::RLoad),
            "RLOSS" => Some(Self::RLoss),
            "VLOSS" => Some(Self::VLoss),
            "CONVERTER" => Some(Self::Converter),
            "LINREG" => Some(Self::LinReg),
            "PSWITCH" => Some(Self::PSwitch),
            "PMUX" => Some(Self::PMux),
            "RECTIFIER" => Some(Self::Rectifier),
            _ => None,
        }
    }

    /// Parameter names accepted by this type.
    pub fn allowed_params(&self) -> &'static [&'static str] {
        match self {
            Self::Source => &["vo", "rs"],
            Self::PLoad => &["pwr", "pwrs", "rt", "loss"],
            Self::ILoad => &["ii", "iis", "rt", "loss"],
            Self::RLoad => &["rs", "rt", "loss"],
            Self::RLoss => &["rs", "rt"],
            Self::VLoss => &["vdrop", "rt"],
            Self::Converter => &["vo", "eff", "iq", "iis", "rt"],
            Self::LinReg => &["vo", "vdrop", "ig", "iis", "rt"],
            Self::PSwitch | Self::PMux => &["rs", "ig", "iis", "rt"],
            Self::Rectifier => &["vdrop", "rs", "ig", "iis", "rt"],
        }
    }
}

/// Phase configuration of one component.
#[derive(Debug, Clone)]
pub struct PhaseDef {
    pub component: String,
    pub config: PhaseConfig,
    pub line: usize,
}

/// Limits of one component.
#[derive(Debug, Clone)]
pub struct LimitDef {
    pub component: String,
    /// `(metric, min, max)` entries
    pub ranges: Vec<(Metric, f64, f64)>,
    pub line: usize,
}
