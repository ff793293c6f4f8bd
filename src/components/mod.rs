//! Component models for power-tree analysis.
//!
//! This module provides behavioral models for all supported components:
//! - Sources: [`Source`]
//! - Loads: power, current and resistive [`Load`]s
//! - Series losses: resistive and voltage-drop [`SeriesLoss`]
//! - Regulation: [`Converter`], [`LinReg`]
//! - Switching: [`PSwitch`], [`PMux`], [`Rectifier`]
//!
//! Each model implements [`PowerComponent`], the contract the relaxation
//! solver drives. The solver only ever calls through that trait.

mod converter;
mod interp;
mod limits;
mod linreg;
mod load;
mod loss;
mod phase;
mod rectifier;
mod source;
mod switch;

pub use converter::Converter;
pub use interp::{InterpTable, Interpolator, TableKind};
pub use limits::{Limits, Metric, Range, Warnings, LIMIT_MAX};
pub use linreg::LinReg;
pub use load::{Load, LoadModel};
pub use loss::{DropModel, SeriesLoss};
pub use phase::{LoadPhase, PhaseConfig, PhaseCtx};
pub use rectifier::Rectifier;
pub use source::Source;
pub use switch::{PMux, PSwitch};

use std::collections::HashMap;
use std::fmt;

use crate::dsl::{ComponentDef, ComponentType, ParamValue};
use crate::error::{PowerTreeError, Result};

/// Maximum number of inputs of any node (the PMux).
pub const MAX_INPUTS: usize = 4;

/// Component kind, used for child compatibility and report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Source,
    Load,
    SLoss,
    Converter,
    LinReg,
    PSwitch,
    PMux,
    Rectifier,
}

impl ComponentKind {
    /// Report name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Source => "SOURCE",
            ComponentKind::Load => "LOAD",
            ComponentKind::SLoss => "SLOSS",
            ComponentKind::Converter => "CONVERTER",
            ComponentKind::LinReg => "LINREG",
            ComponentKind::PSwitch => "PSWITCH",
            ComponentKind::PMux => "PMUX",
            ComponentKind::Rectifier => "RECTIFIER",
        }
    }

    /// Whether a component of kind `child` may be connected below this kind.
    pub fn accepts_child(&self, child: ComponentKind) -> bool {
        *self != ComponentKind::Load && child != ComponentKind::Source
    }

    /// Whether the kind can be restricted to a list of active phases.
    pub fn supports_active_phases(&self) -> bool {
        !matches!(self, ComponentKind::Load | ComponentKind::SLoss)
    }

    /// Whether the kind takes phase-specific values.
    pub fn supports_phase_values(&self) -> bool {
        *self == ComponentKind::Load
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Voltages and off-states of a node's parents, in declared order.
///
/// Ordinary nodes have one input, sources none, and the PMux up to
/// [`MAX_INPUTS`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inputs {
    voltages: [f64; MAX_INPUTS],
    off: [bool; MAX_INPUTS],
    len: usize,
}

impl Inputs {
    /// No inputs (root node).
    pub fn empty() -> Self {
        Self {
            voltages: [0.0; MAX_INPUTS],
            off: [true; MAX_INPUTS],
            len: 0,
        }
    }

    /// A single input.
    pub fn single(voltage: f64, off: bool) -> Self {
        let mut inputs = Self::empty();
        inputs.push(voltage, off);
        inputs
    }

    /// Append an input. Inputs beyond [`MAX_INPUTS`] are ignored.
    pub fn push(&mut self, voltage: f64, off: bool) {
        debug_assert!(self.len < MAX_INPUTS, "too many inputs");
        if self.len < MAX_INPUTS {
            self.voltages[self.len] = voltage;
            self.off[self.len] = off;
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Voltage and off-state of input `k`; a missing input reads as dead.
    pub fn get(&self, k: Option<usize>) -> (f64, bool) {
        match k {
            Some(k) if k < self.len => (self.voltages[k], self.off[k]),
            _ => (0.0, true),
        }
    }

    /// The first input.
    pub fn primary(&self) -> (f64, bool) {
        self.get(Some(0))
    }

    /// Index of the first input that is on and carries a nonzero voltage.
    pub fn priority_input(&self) -> Option<usize> {
        (0..self.len).find(|&k| !self.off[k] && self.voltages[k] != 0.0)
    }
}

/// Output state of a node after a forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeState {
    /// Output is off; children see a dead input.
    pub off: bool,
    /// Index of the input the node draws from, `None` for roots and an
    /// unselected PMux.
    pub input: Option<usize>,
}

impl NodeState {
    /// Ordinary node drawing from its single parent.
    pub fn on() -> Self {
        Self {
            off: false,
            input: Some(0),
        }
    }

    /// Ordinary node with its output off.
    pub fn off() -> Self {
        Self {
            off: true,
            input: Some(0),
        }
    }

    /// Root node.
    pub fn root(off: bool) -> Self {
        Self { off, input: None }
    }

    /// Node drawing from the given input.
    pub fn selected(input: Option<usize>, off: bool) -> Self {
        Self { off, input }
    }
}

impl Default for NodeState {
    fn default() -> Self {
        Self::on()
    }
}

/// Power, loss and thermal figures of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLoss {
    /// Input power (W)
    pub power: f64,
    /// Dissipated power (W)
    pub loss: f64,
    /// Efficiency (%)
    pub efficiency: f64,
    /// Temperature rise (°C)
    pub temp_rise: f64,
    /// Peak temperature (°C)
    pub peak_temp: f64,
}

impl PowerLoss {
    /// Figures from input power and loss.
    ///
    /// `default_eff` is reported when the input power is zero.
    pub fn new(power: f64, loss: f64, default_eff: f64, rt: f64, ambient: f64) -> Self {
        let temp_rise = loss * rt;
        Self {
            power,
            loss,
            efficiency: efficiency(power, power - loss, default_eff),
            temp_rise,
            peak_temp: ambient + temp_rise,
        }
    }

    /// All figures zero, with the given efficiency.
    pub fn idle(efficiency: f64) -> Self {
        Self {
            power: 0.0,
            loss: 0.0,
            efficiency,
            temp_rise: 0.0,
            peak_temp: 0.0,
        }
    }
}

/// Efficiency in percent, `default` when there is no input power.
pub fn efficiency(input: f64, output: f64, default: f64) -> f64 {
    if input > 0.0 {
        100.0 * (output / input).abs()
    } else {
        default
    }
}

/// Sign of `x`, zero at zero.
pub(crate) fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// The physics contract every component kind implements.
///
/// Voltages and currents are the node's own: `v_in`/`i_in` at its input,
/// `v_out`/`i_out` at its output, where `i_out` is the current drawn by the
/// children attributed to this node.
pub trait PowerComponent {
    /// Unique component name.
    fn name(&self) -> &str;

    /// Component kind.
    fn kind(&self) -> ComponentKind;

    /// Operating limits.
    fn limits(&self) -> &Limits;

    /// First guess of the input current.
    fn initial_input_current(&self, ctx: &PhaseCtx) -> f64;

    /// First guess of the output voltage.
    fn initial_output_voltage(&self, ctx: &PhaseCtx) -> f64;

    /// Starting state.
    fn initial_state(&self, ctx: &PhaseCtx) -> NodeState {
        if ctx.is_active() {
            NodeState::on()
        } else {
            NodeState::off()
        }
    }

    /// Input current given the parent inputs, this node's forward state,
    /// output voltage and child current.
    fn solve_input_current(
        &self,
        inputs: &Inputs,
        state: &NodeState,
        v_out: f64,
        i_out: f64,
        ctx: &PhaseCtx,
    ) -> f64;

    /// Output voltage and resulting state given the parent inputs.
    fn solve_output_voltage(
        &self,
        inputs: &Inputs,
        i_in: f64,
        i_out: f64,
        ctx: &PhaseCtx,
    ) -> Result<(f64, NodeState)>;

    /// Power, loss and thermal figures at the final operating point.
    fn solve_power_loss(
        &self,
        v_in: f64,
        v_out: f64,
        i_in: f64,
        i_out: f64,
        ambient: f64,
        ctx: &PhaseCtx,
    ) -> PowerLoss;

    /// Limit excursions at the final operating point.
    fn check_warnings(
        &self,
        v_in: f64,
        v_out: f64,
        i_in: f64,
        i_out: f64,
        ambient: f64,
        ctx: &PhaseCtx,
    ) -> Warnings;
}

/// Metric values shared by the regulating and switching kinds.
pub(crate) fn throughput_metrics(
    v_in: f64,
    v_out: f64,
    i_in: f64,
    i_out: f64,
    pl: &PowerLoss,
    ambient: f64,
) -> [(Metric, f64); 10] {
    [
        (Metric::Vi, v_in),
        (Metric::Vo, v_out),
        (Metric::Vd, (v_in - v_out).abs()),
        (Metric::Ii, i_in),
        (Metric::Io, i_out),
        (Metric::Pi, pl.power),
        (Metric::Po, pl.power - pl.loss),
        (Metric::Pl, pl.loss),
        (Metric::Tr, pl.temp_rise),
        (Metric::Tp, ambient + pl.temp_rise),
    ]
}

/// A power-tree component.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Source(Source),
    Load(Load),
    Loss(SeriesLoss),
    Converter(Converter),
    LinReg(LinReg),
    PSwitch(PSwitch),
    PMux(PMux),
    Rectifier(Rectifier),
}

impl Component {
    /// Create a component from a netlist definition.
    pub fn from_def(def: &ComponentDef, tables: &HashMap<String, InterpTable>) -> Result<Self> {
        let params = DefParams { def, tables };
        params.check_known(def.component_type.allowed_params())?;

        let component = match def.component_type {
            ComponentType::Source => Component::Source(
                Source::new(&def.name, params.required("vo")?).with_rs(params.number("rs", 0.0)?),
            ),
            ComponentType::PLoad => Component::Load(
                Load::power(&def.name, params.required("pwr")?)
                    .with_sleep(params.number("pwrs", 0.0)?)
                    .with_rt(params.number("rt", 0.0)?)
                    .as_loss(params.flag("loss")?),
            ),
            ComponentType::ILoad => Component::Load(
                Load::current(&def.name, params.required("ii")?)
                    .with_sleep(params.number("iis", 0.0)?)
                    .with_rt(params.number("rt", 0.0)?)
                    .as_loss(params.flag("loss")?),
            ),
            ComponentType::RLoad => Component::Load(
                Load::resistance(&def.name, params.required("rs")?)
                    .with_rt(params.number("rt", 0.0)?)
                    .as_loss(params.flag("loss")?),
            ),
            ComponentType::RLoss => Component::Loss(
                SeriesLoss::resistive(&def.name, params.required("rs")?)
                    .with_rt(params.number("rt", 0.0)?),
            ),
            ComponentType::VLoss => Component::Loss(
                SeriesLoss::voltage_drop(
                    &def.name,
                    params.interpolator("vdrop", TableKind::VoltageDrop, None)?,
                )
                .with_rt(params.number("rt", 0.0)?),
            ),
            ComponentType::Converter => Component::Converter(
                Converter::new(&def.name, params.required("vo")?, 1.0)
                    .with_eff(params.interpolator("eff", TableKind::Efficiency, None)?)
                    .with_iq(params.number("iq", 0.0)?)
                    .with_iis(params.number("iis", 0.0)?)
                    .with_rt(params.number("rt", 0.0)?),
            ),
            ComponentType::LinReg => Component::LinReg(
                LinReg::new(&def.name, params.required("vo")?)
                    .with_vdrop(params.number("vdrop", 0.0)?)
                    .with_ig(params.interpolator("ig", TableKind::GroundCurrent, Some(0.0))?)
                    .with_iis(params.number("iis", 0.0)?)
                    .with_rt(params.number("rt", 0.0)?),
            ),
            ComponentType::PSwitch => Component::PSwitch(
                PSwitch::new(&def.name)
                    .with_rs(params.number("rs", 0.0)?)
                    .with_ig(params.interpolator("ig", TableKind::GroundCurrent, Some(0.0))?)
                    .with_iis(params.number("iis", 0.0)?)
                    .with_rt(params.number("rt", 0.0)?),
            ),
            ComponentType::PMux => Component::PMux(
                PMux::new(&def.name)
                    .with_rs(params.number("rs", 0.0)?)
                    .with_ig(params.interpolator("ig", TableKind::GroundCurrent, Some(0.0))?)
                    .with_iis(params.number("iis", 0.0)?)
                    .with_rt(params.number("rt", 0.0)?),
            ),
            ComponentType::Rectifier => Component::Rectifier(
                Rectifier::new(&def.name)
                    .with_vdrop(params.number("vdrop", 0.0)?)
                    .with_rs(params.number("rs", 0.0)?)
                    .with_ig(params.interpolator("ig", TableKind::GroundCurrent, Some(0.0))?)
                    .with_iis(params.number("iis", 0.0)?)
                    .with_rt(params.number("rt", 0.0)?),
            ),
        };
        Ok(component)
    }

    fn inner(&self) -> &dyn PowerComponent {
        match self {
            Component::Source(c) => c,
            Component::Load(c) => c,
            Component::Loss(c) => c,
            Component::Converter(c) => c,
            Component::LinReg(c) => c,
            Component::PSwitch(c) => c,
            Component::PMux(c) => c,
            Component::Rectifier(c) => c,
        }
    }

    /// Replace the operating limits.
    pub fn set_limits(&mut self, limits: Limits) {
        match self {
            Component::Source(c) => c.limits = limits,
            Component::Load(c) => c.limits = limits,
            Component::Loss(c) => c.limits = limits,
            Component::Converter(c) => c.limits = limits,
            Component::LinReg(c) => c.limits = limits,
            Component::PSwitch(c) => c.limits = limits,
            Component::PMux(c) => c.limits = limits,
            Component::Rectifier(c) => c.limits = limits,
        }
    }

    /// Builder form of [`Component::set_limits`].
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.set_limits(limits);
        self
    }

    /// Check the physical parameters and limits.
    pub fn validate(&self) -> Result<()> {
        match self {
            Component::Source(c) => c.validate()?,
            Component::Load(c) => c.validate()?,
            Component::Loss(c) => c.validate()?,
            Component::Converter(c) => c.validate()?,
            Component::LinReg(c) => c.validate()?,
            Component::PSwitch(c) => c.validate()?,
            Component::PMux(c) => c.validate()?,
            Component::Rectifier(c) => c.validate()?,
        }
        self.limits().validate(self.name())
    }

    /// Mutable access to a source component.
    pub fn as_source_mut(&mut self) -> Option<&mut Source> {
        match self {
            Component::Source(s) => Some(s),
            _ => None,
        }
    }
}

impl PowerComponent for Component {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn kind(&self) -> ComponentKind {
        self.inner().kind()
    }

    fn limits(&self) -> &Limits {
        self.inner().limits()
    }

    fn initial_input_current(&self, ctx: &PhaseCtx) -> f64 {
        self.inner().initial_input_current(ctx)
    }

    fn initial_output_voltage(&self, ctx: &PhaseCtx) -> f64 {
        self.inner().initial_output_voltage(ctx)
    }

    fn initial_state(&self, ctx: &PhaseCtx) -> NodeState {
        self.inner().initial_state(ctx)
    }

    fn solve_input_current(
        &self,
        inputs: &Inputs,
        state: &NodeState,
        v_out: f64,
        i_out: f64,
        ctx: &PhaseCtx,
    ) -> f64 {
        self.inner()
            .solve_input_current(inputs, state, v_out, i_out, ctx)
    }

    fn solve_output_voltage(
        &self,
        inputs: &Inputs,
        i_in: f64,
        i_out: f64,
        ctx: &PhaseCtx,
    ) -> Result<(f64, NodeState)> {
        self.inner().solve_output_voltage(inputs, i_in, i_out, ctx)
    }

    fn solve_power_loss(
        &self,
        v_in: f64,
        v_out: f64,
        i_in: f64,
        i_out: f64,
        ambient: f64,
        ctx: &PhaseCtx,
    ) -> PowerLoss {
        self.inner()
            .solve_power_loss(v_in, v_out, i_in, i_out, ambient, ctx)
    }

    fn check_warnings(
        &self,
        v_in: f64,
        v_out: f64,
        i_in: f64,
        i_out: f64,
        ambient: f64,
        ctx: &PhaseCtx,
    ) -> Warnings {
        self.inner()
            .check_warnings(v_in, v_out, i_in, i_out, ambient, ctx)
    }
}

macro_rules! impl_from_kind {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Component {
                fn from(c: $ty) -> Self {
                    Component::$variant(c)
                }
            }
        )*
    };
}

impl_from_kind! {
    Source => Source,
    Load => Load,
    Loss => SeriesLoss,
    Converter => Converter,
    LinReg => LinReg,
    PSwitch => PSwitch,
    PMux => PMux,
    Rectifier => Rectifier,
}

/// Parameter access for [`Component::from_def`].
struct DefParams<'a> {
    def: &'a ComponentDef,
    tables: &'a HashMap<String, InterpTable>,
}

impl<'a> DefParams<'a> {
    fn err(&self, message: impl Into<String>) -> PowerTreeError {
        PowerTreeError::invalid_component(&self.def.name, self.def.line, message)
    }

    fn check_known(&self, allowed: &[&str]) -> Result<()> {
        for key in self.def.params.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(self.err(format!("unknown parameter '{}'", key)));
            }
        }
        Ok(())
    }

    fn required(&self, key: &str) -> Result<f64> {
        match self.def.params.get(key) {
            Some(ParamValue::Number(v)) => Ok(*v),
            Some(ParamValue::Ref(r)) => Err(self.err(format!("'{}' must be a number, got '{}'", key, r))),
            None => Err(self.err(format!("missing required parameter '{}'", key))),
        }
    }

    fn number(&self, key: &str, default: f64) -> Result<f64> {
        match self.def.params.get(key) {
            None => Ok(default),
            Some(_) => self.required(key),
        }
    }

    fn flag(&self, key: &str) -> Result<bool> {
        match self.def.params.get(key) {
            None => Ok(false),
            Some(ParamValue::Number(v)) => Ok(*v != 0.0),
            Some(ParamValue::Ref(r)) => match r.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Ok(true),
                "false" | "no" | "off" => Ok(false),
                _ => Err(self.err(format!("'{}' must be true or false, got '{}'", key, r))),
            },
        }
    }

    /// A constant or a reference to a `.table`.
    fn interpolator(&self, key: &str, kind: TableKind, default: Option<f64>) -> Result<Interpolator> {
        match (self.def.params.get(key), default) {
            (Some(ParamValue::Number(v)), _) => Ok(Interpolator::Constant(*v)),
            (Some(ParamValue::Ref(table)), _) => {
                let t = self
                    .tables
                    .get(table)
                    .ok_or_else(|| PowerTreeError::UndefinedTable {
                        table: table.clone(),
                        component: self.def.name.clone(),
                    })?;
                Interpolator::from_table(&self.def.name, kind, t)
            }
            (None, Some(v)) => Ok(Interpolator::Constant(v)),
            (None, None) => Err(self.err(format!("missing required parameter '{}'", key))),
        }
    }
}
