//! Voltage source.

use super::{
    Inputs, Limits, Metric, NodeState, PhaseCtx, PowerComponent, PowerLoss, Warnings,
    ComponentKind,
};
use crate::error::{PowerTreeError, Result};

/// A voltage source with series resistance.
///
/// A source is always the root of a subsystem. Its output is
/// `vo - rs * io`, and it is off when `vo` is zero or when it is excluded
/// from the current phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub name: String,
    /// Open-circuit voltage (V)
    pub vo: f64,
    /// Series resistance (Ohm)
    pub rs: f64,
    pub limits: Limits,
}

impl Source {
    /// Create a new ideal source.
    pub fn new(name: impl Into<String>, vo: f64) -> Self {
        Self {
            name: name.into(),
            vo,
            rs: 0.0,
            limits: Limits::default(),
        }
    }

    /// Set the series resistance.
    pub fn with_rs(mut self, rs: f64) -> Self {
        self.rs = rs.abs();
        self
    }

    /// Set the operating limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.vo.is_finite() {
            return Err(PowerTreeError::invalid_param(&self.name, "vo", "must be finite"));
        }
        if !self.rs.is_finite() {
            return Err(PowerTreeError::invalid_param(&self.name, "rs", "must be finite"));
        }
        Ok(())
    }

    fn is_off(&self, ctx: &PhaseCtx) -> bool {
        self.vo == 0.0 || !ctx.is_active()
    }
}

impl PowerComponent for Source {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Source
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn initial_input_current(&self, _ctx: &PhaseCtx) -> f64 {
        0.0
    }

    fn initial_output_voltage(&self, ctx: &PhaseCtx) -> f64 {
        if self.is_off(ctx) {
            0.0
        } else {
            self.vo
        }
    }

    fn initial_state(&self, ctx: &PhaseCtx) -> NodeState {
        NodeState::root(self.is_off(ctx))
    }

    fn solve_input_current(
        &self,
        _inputs: &Inputs,
        state: &NodeState,
        _v_out: f64,
        i_out: f64,
        _ctx: &PhaseCtx,
    ) -> f64 {
        if state.off || self.vo == 0.0 {
            0.0
        } else {
            i_out
        }
    }

    fn solve_output_voltage(
        &self,
        _inputs: &Inputs,
        _i_in: f64,
        i_out: f64,
        ctx: &PhaseCtx,
    ) -> Result<(f64, NodeState)> {
        if self.is_off(ctx) {
            return Ok((0.0, NodeState::root(true)));
        }
        Ok((self.vo - self.rs * i_out, NodeState::root(false)))
    }

    fn solve_power_loss(
        &self,
        _v_in: f64,
        _v_out: f64,
        _i_in: f64,
        i_out: f64,
        ambient: f64,
        ctx: &PhaseCtx,
    ) -> PowerLoss {
        if self.is_off(ctx) {
            return PowerLoss::idle(100.0);
        }
        let power = (self.vo * i_out).abs();
        let loss = self.rs * i_out * i_out;
        PowerLoss::new(power, loss, 100.0, 0.0, ambient)
    }

    fn check_warnings(
        &self,
        _v_in: f64,
        v_out: f64,
        _i_in: f64,
        i_out: f64,
        _ambient: f64,
        _ctx: &PhaseCtx,
    ) -> Warnings {
        self.limits.check(&[
            (Metric::Io, i_out),
            (Metric::Po, v_out * i_out),
            (Metric::Pl, self.rs * i_out * i_out),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PhaseConfig;

    #[test]
    fn test_source_output_drop() {
        let s = Source::new("BAT", 12.0).with_rs(0.5);
        let ctx = PhaseCtx::nominal();
        let (v, state) = s.solve_output_voltage(&Inputs::empty(), 1.0, 1.0, &ctx).unwrap();
        assert!((v - 11.5).abs() < 1e-12);
        assert!(!state.off);
        assert_eq!(state.input, None);
    }

    #[test]
    fn test_source_power_and_loss() {
        let s = Source::new("BAT", 12.0).with_rs(0.5);
        let pl = s.solve_power_loss(12.0, 11.5, 1.0, 1.0, 25.0, &PhaseCtx::nominal());
        assert!((pl.power - 12.0).abs() < 1e-12);
        assert!((pl.loss - 0.5).abs() < 1e-12);
        assert!((pl.efficiency - 100.0 * 11.5 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_volt_source_is_off() {
        let s = Source::new("OFF", 0.0);
        let ctx = PhaseCtx::nominal();
        assert!(s.initial_state(&ctx).off);
        let (v, state) = s.solve_output_voltage(&Inputs::empty(), 0.0, 0.0, &ctx).unwrap();
        assert_eq!(v, 0.0);
        assert!(state.off);
        assert_eq!(s.solve_input_current(&Inputs::empty(), &state, 0.0, 1.0, &ctx), 0.0);
    }

    #[test]
    fn test_phase_excluded_source_is_off() {
        let s = Source::new("BAT", 5.0);
        let conf = PhaseConfig::Active(vec!["run".to_string()]);
        let ctx = PhaseCtx::new(Some("sleep"), &conf);
        assert_eq!(s.initial_output_voltage(&ctx), 0.0);
        let (v, state) = s.solve_output_voltage(&Inputs::empty(), 0.0, 0.0, &ctx).unwrap();
        assert_eq!(v, 0.0);
        assert!(state.off);
    }

    #[test]
    fn test_source_warnings() {
        let s = Source::new("BAT", 5.0).with_limits(Limits::new().with(Metric::Io, 0.0, 0.5));
        let w = s.check_warnings(5.0, 5.0, 1.0, 1.0, 25.0, &PhaseCtx::nominal());
        assert!(w.contains(Metric::Io));
        assert!(!w.contains(Metric::Po));
    }
}
