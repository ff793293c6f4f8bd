//! Power switch and power multiplexer.

use super::{
    throughput_metrics, ComponentKind, Inputs, Interpolator, Limits, NodeState, PhaseCtx,
    PowerComponent, PowerLoss, TableKind, Warnings,
};
use crate::error::{PowerTreeError, Result};

/// On-resistance, ground current and sleep current of a pass element.
///
/// Shared by [`PSwitch`] and [`PMux`], which differ only in how the input is
/// chosen.
#[derive(Debug, Clone, PartialEq)]
struct PassElement {
    rs: f64,
    ig: Interpolator,
    iis: f64,
    rt: f64,
}

impl Default for PassElement {
    fn default() -> Self {
        Self {
            rs: 0.0,
            ig: Interpolator::Constant(0.0),
            iis: 0.0,
            rt: 0.0,
        }
    }
}

impl PassElement {
    fn validate(&self, name: &str) -> Result<()> {
        if !self.rs.is_finite() {
            return Err(PowerTreeError::invalid_param(name, "rs", "must be finite"));
        }
        self.ig.validate(name, TableKind::GroundCurrent)
    }

    fn initial_input_current(&self, ctx: &PhaseCtx) -> f64 {
        if ctx.is_active() {
            self.ig.interp(0.0, 0.0)
        } else {
            self.iis
        }
    }

    fn input_current(&self, v_in: f64, parent_off: bool, i_out: f64, ctx: &PhaseCtx) -> f64 {
        if v_in == 0.0 || parent_off {
            return 0.0;
        }
        if !ctx.is_active() {
            return self.iis;
        }
        i_out + self.ig.interp(i_out.abs(), v_in.abs())
    }

    /// Output voltage with the polarity of `v_in`; `None` when off.
    fn output(&self, v_in: f64, parent_off: bool, i_out: f64, ctx: &PhaseCtx) -> Option<f64> {
        if v_in == 0.0 || parent_off || !ctx.is_active() {
            return None;
        }
        let v = v_in.abs() - self.rs * i_out;
        Some(if v_in >= 0.0 { v } else { -v })
    }

    fn power_loss(
        &self,
        v_in: f64,
        v_out: f64,
        i_in: f64,
        i_out: f64,
        ambient: f64,
        ctx: &PhaseCtx,
    ) -> PowerLoss {
        if !ctx.is_active() {
            let sleep = (self.iis * v_in).abs();
            return PowerLoss::new(sleep, sleep, 0.0, self.rt, ambient);
        }
        let mut loss = if v_in == 0.0 {
            0.0
        } else {
            self.ig.interp(i_out.abs(), v_in.abs()) * v_in.abs()
        };
        if i_out.abs() > 0.0 {
            loss += (v_in.abs() - v_out.abs()) * i_out;
        }
        PowerLoss::new((v_in * i_in).abs(), loss, 0.0, self.rt, ambient)
    }

    fn warnings(
        &self,
        limits: &Limits,
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
        let pl = self.power_loss(v_in, v_out, i_in, i_out, ambient, ctx);
        limits.check(&throughput_metrics(v_in, v_out, i_in, i_out, &pl, ambient))
    }
}

macro_rules! pass_builders {
    ($ty:ty) => {
        impl $ty {
            /// Set the on-resistance (Ohm).
            pub fn with_rs(mut self, rs: f64) -> Self {
                self.pass.rs = rs.abs();
                self
            }

            /// Set the ground current, constant or interpolated.
            pub fn with_ig(mut self, ig: Interpolator) -> Self {
                self.pass.ig = ig;
                self
            }

            pub fn with_iis(mut self, iis: f64) -> Self {
                self.pass.iis = iis.abs();
                self
            }

            pub fn with_rt(mut self, rt: f64) -> Self {
                self.pass.rt = rt.abs();
                self
            }

            pub fn with_limits(mut self, limits: Limits) -> Self {
                self.limits = limits;
                self
            }

            pub fn validate(&self) -> Result<()> {
                self.pass.validate(&self.name)
            }

            /// On-resistance (Ohm).
            pub fn rs(&self) -> f64 {
                self.pass.rs
            }
        }
    };
}

/// A load switch or eFuse: a series resistance with a ground current.
#[derive(Debug, Clone, PartialEq)]
pub struct PSwitch {
    pub name: String,
    pass: PassElement,
    pub limits: Limits,
}

impl PSwitch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pass: PassElement::default(),
            limits: Limits::default(),
        }
    }
}

pass_builders!(PSwitch);

impl PowerComponent for PSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::PSwitch
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn initial_input_current(&self, ctx: &PhaseCtx) -> f64 {
        self.pass.initial_input_current(ctx)
    }

    fn initial_output_voltage(&self, _ctx: &PhaseCtx) -> f64 {
        0.0
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
        self.pass.input_current(v_in, parent_off, i_out, ctx)
    }

    fn solve_output_voltage(
        &self,
        inputs: &Inputs,
        _i_in: f64,
        i_out: f64,
        ctx: &PhaseCtx,
    ) -> Result<(f64, NodeState)> {
        let (v_in, parent_off) = inputs.primary();
        Ok(match self.pass.output(v_in, parent_off, i_out, ctx) {
            Some(v) => (v, NodeState::on()),
            None => (0.0, NodeState::off()),
        })
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
        self.pass.power_loss(v_in, v_out, i_in, i_out, ambient, ctx)
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
        self.pass
            .warnings(&self.limits, v_in, v_out, i_in, i_out, ambient, ctx)
    }
}

/// A power multiplexer with up to four prioritized inputs.
///
/// The first input (in declared order) that is on and live is selected and
/// passed through like a [`PSwitch`]. With no live input the mux and
/// everything below it is off.
#[derive(Debug, Clone, PartialEq)]
pub struct PMux {
    pub name: String,
    pass: PassElement,
    pub limits: Limits,
}

impl PMux {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pass: PassElement::default(),
            limits: Limits::default(),
        }
    }
}

pass_builders!(PMux);

impl PowerComponent for PMux {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::PMux
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn initial_input_current(&self, ctx: &PhaseCtx) -> f64 {
        self.pass.initial_input_current(ctx)
    }

    fn initial_output_voltage(&self, _ctx: &PhaseCtx) -> f64 {
        0.0
    }

    fn initial_state(&self, ctx: &PhaseCtx) -> NodeState {
        NodeState::selected(Some(0), !ctx.is_active())
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
        self.pass.input_current(v_in, parent_off, i_out, ctx)
    }

    fn solve_output_voltage(
        &self,
        inputs: &Inputs,
        _i_in: f64,
        i_out: f64,
        ctx: &PhaseCtx,
    ) -> Result<(f64, NodeState)> {
        // an excluded mux stays on its priority input to draw the sleep current
        if !ctx.is_active() {
            return Ok((0.0, NodeState::selected(inputs.priority_input(), true)));
        }
        let Some(k) = inputs.priority_input() else {
            return Ok((0.0, NodeState::selected(None, true)));
        };
        let (v_in, parent_off) = inputs.get(Some(k));
        Ok(match self.pass.output(v_in, parent_off, i_out, ctx) {
            Some(v) => (v, NodeState::selected(Some(k), false)),
            None => (0.0, NodeState::selected(None, true)),
        })
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
        self.pass.power_loss(v_in, v_out, i_in, i_out, ambient, ctx)
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
        self.pass
            .warnings(&self.limits, v_in, v_out, i_in, i_out, ambient, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PhaseConfig;

    #[test]
    fn test_switch_drop_keeps_polarity() {
        let sw = PSwitch::new("SW").with_rs(0.1);
        let ctx = PhaseCtx::nominal();
        let (v, state) = sw
            .solve_output_voltage(&Inputs::single(-5.0, false), 1.0, 1.0, &ctx)
            .unwrap();
        assert!((v + 4.9).abs() < 1e-12);
        assert!(!state.off);
    }

    #[test]
    fn test_switch_loss() {
        let sw = PSwitch::new("SW")
            .with_rs(0.1)
            .with_ig(Interpolator::Constant(1e-3));
        let ctx = PhaseCtx::nominal();
        let i = sw.solve_input_current(&Inputs::single(5.0, false), &NodeState::on(), 4.9, 1.0, &ctx);
        assert!((i - 1.001).abs() < 1e-12);
        let pl = sw.solve_power_loss(5.0, 4.9, i, 1.0, 25.0, &ctx);
        assert!((pl.loss - (5e-3 + 0.1)).abs() < 1e-12);
        assert!((pl.power - 5.005).abs() < 1e-12);
    }

    #[test]
    fn test_switch_off_phase() {
        let sw = PSwitch::new("SW").with_iis(2e-6);
        let conf = PhaseConfig::Active(vec!["on".to_string()]);
        let ctx = PhaseCtx::new(Some("off"), &conf);
        let (v, state) = sw
            .solve_output_voltage(&Inputs::single(5.0, false), 0.0, 0.0, &ctx)
            .unwrap();
        assert_eq!(v, 0.0);
        assert!(state.off);
        let i = sw.solve_input_current(&Inputs::single(5.0, false), &state, 0.0, 0.0, &ctx);
        assert_eq!(i, 2e-6);
        let pl = sw.solve_power_loss(5.0, 0.0, i, 0.0, 25.0, &ctx);
        assert_eq!(pl.power, pl.loss);
    }

    #[test]
    fn test_mux_off_phase_draws_sleep_current() {
        let mux = PMux::new("MUX").with_rs(0.1).with_iis(1e-3);
        let conf = PhaseConfig::Active(vec!["on".to_string()]);
        let ctx = PhaseCtx::new(Some("off"), &conf);
        let mut inputs = Inputs::empty();
        inputs.push(12.0, true);
        inputs.push(5.0, false);
        let (v, state) = mux.solve_output_voltage(&inputs, 0.0, 0.0, &ctx).unwrap();
        assert_eq!(v, 0.0);
        assert!(state.off);
        assert_eq!(state.input, Some(1));
        let i = mux.solve_input_current(&inputs, &state, 0.0, 0.0, &ctx);
        assert_eq!(i, 1e-3);
        let pl = mux.solve_power_loss(5.0, 0.0, i, 0.0, 25.0, &ctx);
        assert!((pl.power - 5e-3).abs() < 1e-15);
        assert_eq!(pl.power, pl.loss);
    }

    #[test]
    fn test_mux_selects_first_live_input() {
        let mux = PMux::new("MUX").with_rs(0.1);
        let mut inputs = Inputs::empty();
        inputs.push(12.0, true);
        inputs.push(5.0, false);
        inputs.push(3.3, true);
        let (v, state) = mux
            .solve_output_voltage(&inputs, 1.0, 1.0, &PhaseCtx::nominal())
            .unwrap();
        assert!((v - 4.9).abs() < 1e-12);
        assert_eq!(state.input, Some(1));
        assert!(!state.off);

        let i = mux.solve_input_current(&inputs, &state, v, 1.0, &PhaseCtx::nominal());
        assert!((i - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mux_without_live_input_is_off() {
        let mux = PMux::new("MUX");
        let mut inputs = Inputs::empty();
        inputs.push(12.0, true);
        inputs.push(0.0, false);
        let (v, state) = mux
            .solve_output_voltage(&inputs, 0.0, 0.0, &PhaseCtx::nominal())
            .unwrap();
        assert_eq!(v, 0.0);
        assert!(state.off);
        assert_eq!(state.input, None);
        assert_eq!(
            mux.solve_input_current(&inputs, &state, 0.0, 0.0, &PhaseCtx::nominal()),
            0.0
        );
    }
}
