//! Terminal loads: constant power, constant current and resistive.

use super::{
    ComponentKind, Inputs, LoadPhase, Limits, Metric, NodeState, PhaseCtx, PowerComponent,
    PowerLoss, Warnings,
};
use crate::error::{PowerTreeError, Result};

/// How a load draws current from its input voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadModel {
    /// Constant power (W), with sleep power.
    Power { pwr: f64, pwrs: f64 },
    /// Constant current (A), with sleep current.
    Current { ii: f64, iis: f64 },
    /// Resistance (Ohm). Unlisted phases keep the nominal resistance.
    Resistance { rs: f64 },
}

impl LoadModel {
    fn type_name(&self) -> &'static str {
        match self {
            LoadModel::Power { .. } => "PLoad",
            LoadModel::Current { .. } => "ILoad",
            LoadModel::Resistance { .. } => "RLoad",
        }
    }
}

/// A load terminating a branch of the tree.
///
/// The output voltage of a load is always zero. With `loss` set, the
/// dissipated power is reported as loss at 0 % efficiency instead of power
/// at 100 %.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub name: String,
    pub model: LoadModel,
    /// Thermal resistance (°C/W)
    pub rt: f64,
    /// Report the dissipation as loss.
    pub loss: bool,
    pub limits: Limits,
}

impl Load {
    fn with_model(name: impl Into<String>, model: LoadModel) -> Self {
        Self {
            name: name.into(),
            model,
            rt: 0.0,
            loss: false,
            limits: Limits::default(),
        }
    }

    /// Constant-power load.
    pub fn power(name: impl Into<String>, pwr: f64) -> Self {
        Self::with_model(name, LoadModel::Power { pwr, pwrs: 0.0 })
    }

    /// Constant-current load.
    pub fn current(name: impl Into<String>, ii: f64) -> Self {
        Self::with_model(name, LoadModel::Current { ii, iis: 0.0 })
    }

    /// Resistive load.
    pub fn resistance(name: impl Into<String>, rs: f64) -> Self {
        Self::with_model(name, LoadModel::Resistance { rs })
    }

    /// Set the sleep power or current. Ignored by resistive loads.
    pub fn with_sleep(mut self, sleep: f64) -> Self {
        match &mut self.model {
            LoadModel::Power { pwrs, .. } => *pwrs = sleep,
            LoadModel::Current { iis, .. } => *iis = sleep,
            LoadModel::Resistance { .. } => {}
        }
        self
    }

    pub fn with_rt(mut self, rt: f64) -> Self {
        self.rt = rt.abs();
        self
    }

    /// Report the dissipation as loss.
    pub fn as_loss(mut self, loss: bool) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self) -> Result<()> {
        match self.model {
            LoadModel::Resistance { rs } if !(rs > 0.0 && rs.is_finite()) => Err(
                PowerTreeError::invalid_param(&self.name, "rs", "resistance must be > 0"),
            ),
            LoadModel::Power { pwr, pwrs } if !pwr.is_finite() || !pwrs.is_finite() => Err(
                PowerTreeError::invalid_param(&self.name, "pwr", "must be finite"),
            ),
            LoadModel::Current { ii, iis } if !ii.is_finite() || !iis.is_finite() => Err(
                PowerTreeError::invalid_param(&self.name, "ii", "must be finite"),
            ),
            _ => Ok(()),
        }
    }

    /// Human-readable load type.
    pub fn type_name(&self) -> &'static str {
        self.model.type_name()
    }

    /// Check a phase-specific value for this load.
    pub fn validate_phase_value(&self, value: f64) -> Result<()> {
        match self.model {
            LoadModel::Resistance { .. } if !(value > 0.0) => Err(PowerTreeError::invalid_param(
                &self.name,
                "rs",
                "phase resistance must be > 0",
            )),
            _ if !value.is_finite() => Err(PowerTreeError::invalid_param(
                &self.name,
                "phase",
                "phase value must be finite",
            )),
            _ => Ok(()),
        }
    }

    /// The power, current or resistance in effect for the phase.
    fn demand(&self, ctx: &PhaseCtx) -> f64 {
        let phase = ctx.load_phase();
        match (self.model, phase) {
            (_, LoadPhase::Value(v)) => v,
            (LoadModel::Power { pwr, .. }, LoadPhase::Nominal) => pwr,
            (LoadModel::Power { pwrs, .. }, LoadPhase::Sleep) => pwrs,
            (LoadModel::Current { ii, .. }, LoadPhase::Nominal) => ii,
            (LoadModel::Current { iis, .. }, LoadPhase::Sleep) => iis,
            (LoadModel::Resistance { rs }, _) => rs,
        }
    }
}

impl PowerComponent for Load {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Load
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn initial_input_current(&self, ctx: &PhaseCtx) -> f64 {
        match self.model {
            LoadModel::Power { .. } | LoadModel::Current { .. } => self.demand(ctx).abs(),
            LoadModel::Resistance { .. } => 0.0,
        }
    }

    fn initial_output_voltage(&self, _ctx: &PhaseCtx) -> f64 {
        0.0
    }

    fn initial_state(&self, _ctx: &PhaseCtx) -> NodeState {
        NodeState::on()
    }

    fn solve_input_current(
        &self,
        inputs: &Inputs,
        state: &NodeState,
        _v_out: f64,
        _i_out: f64,
        ctx: &PhaseCtx,
    ) -> f64 {
        let (v_in, parent_off) = inputs.get(state.input);
        if v_in == 0.0 || parent_off {
            return 0.0;
        }
        let value = self.demand(ctx);
        match self.model {
            LoadModel::Power { .. } => value / v_in.abs(),
            LoadModel::Current { .. } => value.abs(),
            LoadModel::Resistance { .. } => v_in.abs() / value,
        }
    }

    fn solve_output_voltage(
        &self,
        inputs: &Inputs,
        _i_in: f64,
        _i_out: f64,
        _ctx: &PhaseCtx,
    ) -> Result<(f64, NodeState)> {
        let (_, parent_off) = inputs.primary();
        let state = if parent_off {
            NodeState::off()
        } else {
            NodeState::on()
        };
        Ok((0.0, state))
    }

    fn solve_power_loss(
        &self,
        v_in: f64,
        _v_out: f64,
        i_in: f64,
        _i_out: f64,
        ambient: f64,
        _ctx: &PhaseCtx,
    ) -> PowerLoss {
        if v_in == 0.0 {
            return PowerLoss::idle(if self.loss { 0.0 } else { 100.0 });
        }
        let dissipated = (v_in * i_in).abs();
        let temp_rise = dissipated * self.rt;
        if self.loss {
            PowerLoss {
                power: 0.0,
                loss: dissipated,
                efficiency: 0.0,
                temp_rise,
                peak_temp: ambient + temp_rise,
            }
        } else {
            PowerLoss {
                power: dissipated,
                loss: 0.0,
                efficiency: 100.0,
                temp_rise,
                peak_temp: ambient + temp_rise,
            }
        }
    }

    fn check_warnings(
        &self,
        v_in: f64,
        _v_out: f64,
        i_in: f64,
        _i_out: f64,
        ambient: f64,
        ctx: &PhaseCtx,
    ) -> Warnings {
        if ctx.load_phase() == LoadPhase::Sleep {
            return Warnings::none();
        }
        let p = v_in * i_in;
        let tr = p.abs() * self.rt;
        let tp = ambient + tr;
        match self.model {
            LoadModel::Power { .. } => self.limits.check(&[
                (Metric::Vi, v_in),
                (Metric::Ii, i_in),
                (Metric::Tr, tr),
                (Metric::Tp, tp),
            ]),
            LoadModel::Current { .. } => self.limits.check(&[
                (Metric::Vi, v_in),
                (Metric::Pi, p),
                (Metric::Tr, tr),
                (Metric::Tp, tp),
            ]),
            LoadModel::Resistance { .. } => self.limits.check(&[
                (Metric::Vi, v_in),
                (Metric::Ii, i_in),
                (Metric::Pi, p),
                (Metric::Tr, tr),
                (Metric::Tp, tp),
            ]),
        }
    }
}
