//! Linear regulator.

use super::{
    throughput_metrics, ComponentKind, Inputs, Interpolator, Limits, NodeState, PhaseCtx,
    PowerComponent, PowerLoss, TableKind, Warnings,
};
use crate::error::{PowerTreeError, Result};

/// A linear (series pass) regulator.
///
/// The output follows `min(|vo|, max(|vi| - vdrop, 0))` with the polarity
/// of `vo`. Input current is the output current plus the ground current
/// `ig(|io|, |vi|)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinReg {
    pub name: String,
    /// Nominal output voltage (V)
    pub vo: f64,
    /// Dropout voltage (V)
    pub vdrop: f64,
    /// Ground current, constant or interpolated
    pub ig: Interpolator,
    /// Sleep current when phase-excluded (A)
    pub iis: f64,
    /// Thermal resistance (°C/W)
    pub rt: f64,
    pub limits: Limits,
}

impl LinReg {
    /// Create a regulator with zero dropout and ground current.
    pub fn new(name: impl Into<String>, vo: f64) -> Self {
        Self {
            name: name.into(),
            vo,
            vdrop: 0.0,
            ig: Interpolator::Constant(0.0),
            iis: 0.0,
            rt: 0.0,
            limits: Limits::default(),
        }
    }

    pub fn with_vdrop(mut self, vdrop: f64) -> Self {
        self.vdrop = vdrop.abs();
        self
    }

    pub fn with_ig(mut self, ig: Interpolator) -> Self {
        self.ig = ig;
        self
    }

    pub fn with_iis(mut self, iis: f64) -> Self {
        self.iis = iis.abs();
        self
    }

    pub fn with_rt(mut self, rt: f64) -> Self {
        self.rt = rt.abs();
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.vo.is_finite() {
            return Err(PowerTreeError::invalid_param(&self.name, "vo", "must be finite"));
        }
        if self.vdrop >= self.vo.abs() {
            return Err(PowerTreeError::invalid_param(
                &self.name,
                "vdrop",
                format!("dropout {} must be below output voltage {}", self.vdrop, self.vo.abs()),
            ));
        }
        self.ig.validate(&self.name, TableKind::GroundCurrent)
    }

    /// Output magnitude for input `v_in`.
    fn regulated(&self, v_in: f64) -> f64 {
        self.vo.abs().min((v_in.abs() - self.vdrop).max(0.0))
    }
}

impl PowerComponent for LinReg {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::LinReg
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn initial_input_current(&self, ctx: &PhaseCtx) -> f64 {
        if ctx.is_active() {
            self.ig.interp(0.0, 0.0)
        } else {
            self.iis
        }
    }

    fn initial_output_voltage(&self, ctx: &PhaseCtx) -> f64 {
        if ctx.is_active() {
            self.vo
        } else {
            0.0
        }
    }

    fn solve_input_current(
        &self,
        inputs: &Inputs,
        state: &NodeState,
        _v_out: f64,
        i_out: f64,
        ctx: &PhaseCtx,
    ) -> f64 {
        let (v_in, parent_off) = inputs.get(state.input);
        if v_in == 0.0 || parent_off {
            return 0.0;
        }
        if !ctx.is_active() {
            return self.iis;
        }
        i_out + self.ig.interp(i_out.abs(), v_in.abs())
    }

    fn solve_output_voltage(
        &self,
        inputs: &Inputs,
        _i_in: f64,
        _i_out: f64,
        ctx: &PhaseCtx,
    ) -> Result<(f64, NodeState)> {
        let (v_in, parent_off) = inputs.primary();
        if v_in == 0.0 || parent_off || !ctx.is_active() {
            return Ok((0.0, NodeState::off()));
        }
        let v = self.regulated(v_in);
        let v = if self.vo >= 0.0 { v } else { -v };
        Ok((v, NodeState::on()))
    }

    fn solve_power_loss(
        &self,
        v_in: f64,
        _v_out: f64,
        i_in: f64,
        i_out: f64,
        ambient: f64,
        ctx: &PhaseCtx,
    ) -> PowerLoss {
        if !ctx.is_active() {
            let sleep = (self.iis * v_in).abs();
            return PowerLoss::new(sleep, sleep, 0.0, self.rt, ambient);
        }
        let v = self.regulated(v_in);
        let mut loss = if v_in == 0.0 || v == 0.0 {
            0.0
        } else {
            self.ig.interp(i_out.abs(), v_in.abs()) * v_in.abs()
        };
        if i_out.abs() > 0.0 {
            loss += (v_in.abs() - v) * i_out;
        }
        PowerLoss::new((v_in * i_in).abs(), loss, 0.0, self.rt, ambient)
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
        if !ctx.is_active() {
            return Warnings::none();
        }
        let pl = self.solve_power_loss(v_in, v_out, i_in, i_out, ambient, ctx);
        self.limits
            .check(&throughput_metrics(v_in, v_out, i_in, i_out, &pl, ambient))
    }
}
