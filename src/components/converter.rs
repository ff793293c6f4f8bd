//! Switching converter.

use super::{
    throughput_metrics, ComponentKind, Inputs, Interpolator, Limits, Metric, NodeState, PhaseCtx,
    PowerComponent, PowerLoss, TableKind, Warnings,
};
use crate::error::{PowerTreeError, Result};

/// A switching converter regulating its output to `vo`.
///
/// Input current follows from power balance with efficiency
/// `eff(|io|, |vi|)`. At no load the converter draws its quiescent current
/// `iq`; when excluded from a phase it is off and draws `iis`.
#[derive(Debug, Clone, PartialEq)]
pub struct Converter {
    pub name: String,
    /// Output voltage (V)
    pub vo: f64,
    /// Efficiency, constant or interpolated
    pub eff: Interpolator,
    /// Quiescent current (A)
    pub iq: f64,
    /// Sleep current when phase-excluded (A)
    pub iis: f64,
    /// Thermal resistance (°C/W)
    pub rt: f64,
    pub limits: Limits,
}

impl Converter {
    /// Create a converter with constant efficiency (0 < eff <= 1).
    pub fn new(name: impl Into<String>, vo: f64, eff: f64) -> Self {
        Self {
            name: name.into(),
            vo,
            eff: Interpolator::Constant(eff),
            iq: 0.0,
            iis: 0.0,
            rt: 0.0,
            limits: Limits::default(),
        }
    }

    /// Use an efficiency table or constant.
    pub fn with_eff(mut self, eff: Interpolator) -> Self {
        self.eff = eff;
        self
    }

    pub fn with_iq(mut self, iq: f64) -> Self {
        self.iq = iq.abs();
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
        self.eff.validate(&self.name, TableKind::Efficiency)
    }
}

impl PowerComponent for Converter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Converter
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn initial_input_current(&self, ctx: &PhaseCtx) -> f64 {
        if ctx.is_active() {
            self.iq
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
        if v_in == 0.0 || self.vo == 0.0 || parent_off {
            return 0.0;
        }
        if !ctx.is_active() {
            return self.iis;
        }
        if i_out == 0.0 {
            return self.iq;
        }
        let eff = self.eff.interp(i_out.abs(), v_in.abs());
        (self.vo * i_out / (v_in * eff)).abs()
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
        Ok((self.vo, NodeState::on()))
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
        let loss = if i_out == 0.0 {
            (self.iq * v_in).abs()
        } else {
            let eff = self.eff.interp(i_out.abs(), v_in.abs());
            (i_in * v_in * (1.0 - eff)).abs()
        };
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
        let metrics = throughput_metrics(v_in, v_out, i_in, i_out, &pl, ambient);
        // no voltage-drop limit on a regulating converter
        let metrics: Vec<_> = metrics
            .into_iter()
            .filter(|(m, _)| *m != Metric::Vd)
            .collect();
        self.limits.check(&metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{InterpTable, PhaseConfig};

    #[test]
    fn test_power_balance() {
        let c = Converter::new("U1", 5.0, 0.8);
        let i = c.solve_input_current(
            &Inputs::single(12.0, false),
            &NodeState::on(),
            5.0,
            0.1,
            &PhaseCtx::nominal(),
        );
        assert!((i - 5.0 * 0.1 / (0.8 * 12.0)).abs() < 1e-12);

        let pl = c.solve_power_loss(12.0, 5.0, i, 0.1, 25.0, &PhaseCtx::nominal());
        assert!((pl.power - 0.625).abs() < 1e-12);
        assert!((pl.loss - 0.125).abs() < 1e-12);
        assert!((pl.efficiency - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_load_draws_quiescent_current() {
        let c = Converter::new("U1", 5.0, 0.9).with_iq(1e-4);
        let ctx = PhaseCtx::nominal();
        let i = c.solve_input_current(&Inputs::single(12.0, false), &NodeState::on(), 5.0, 0.0, &ctx);
        assert_eq!(i, 1e-4);
        let pl = c.solve_power_loss(12.0, 5.0, i, 0.0, 25.0, &ctx);
        assert!((pl.loss - 12e-4).abs() < 1e-15);
        assert!(pl.efficiency.abs() < 1e-9);
    }

    #[test]
    fn test_zero_power_efficiency_is_zero() {
        let c = Converter::new("U1", 5.0, 0.9);
        let pl = c.solve_power_loss(0.0, 0.0, 0.0, 0.0, 25.0, &PhaseCtx::nominal());
        assert_eq!(pl.efficiency, 0.0);
    }

    #[test]
    fn test_phase_excluded_sleeps() {
        let c = Converter::new("U1", 5.0, 0.9).with_iis(1e-6);
        let conf = PhaseConfig::Active(vec!["run".to_string()]);
        let ctx = PhaseCtx::new(Some("sleep"), &conf);
        let (v, state) = c.solve_output_voltage(&Inputs::single(12.0, false), 0.0, 0.0, &ctx).unwrap();
        assert_eq!(v, 0.0);
        assert!(state.off);
        let i = c.solve_input_current(&Inputs::single(12.0, false), &state, 0.0, 0.0, &ctx);
        assert_eq!(i, 1e-6);
        assert!(c.check_warnings(12.0, 0.0, i, 0.0, 25.0, &ctx).is_empty());
    }

    #[test]
    fn test_efficiency_table() {
        let table = InterpTable::current_only(vec![0.1, 1.0], vec![0.5, 0.9]);
        let eff = Interpolator::from_table("U1", TableKind::Efficiency, &table).unwrap();
        let c = Converter::new("U1", 5.0, 1.0).with_eff(eff);
        let i = c.solve_input_current(
            &Inputs::single(10.0, false),
            &NodeState::on(),
            5.0,
            1.0,
            &PhaseCtx::nominal(),
        );
        assert!((i - 5.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_efficiency() {
        assert!(Converter::new("U1", 5.0, 1.5).validate().is_err());
        assert!(Converter::new("U1", 5.0, 0.0).validate().is_err());
        assert!(Converter::new("U1", 5.0, 1.0).validate().is_ok());
    }
}
