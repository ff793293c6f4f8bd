//! Bridge rectifier.

use super::{
    throughput_metrics, ComponentKind, Inputs, Interpolator, Limits, NodeState, PhaseCtx,
    PowerComponent, PowerLoss, TableKind, Warnings,
};
use crate::error::{PowerTreeError, Result};

/// A full-bridge rectifier.
///
/// Two conduction paths are in series with the load. With a nonzero `vdrop`
/// the bridge is built from diodes and drops `2 * vdrop`; otherwise it is an
/// active MOSFET bridge dropping `2 * rs * io` and drawing a ground current.
/// The output is always positive.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectifier {
    pub name: String,
    /// Diode forward voltage (V), zero for a MOSFET bridge
    pub vdrop: f64,
    /// MOSFET on-resistance (Ohm)
    pub rs: f64,
    /// Ground current of the MOSFET controller
    pub ig: Interpolator,
    /// Sleep current when phase-excluded (A)
    pub iis: f64,
    /// Thermal resistance (°C/W)
    pub rt: f64,
    pub limits: Limits,
}

impl Rectifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vdrop: 0.0,
            rs: 0.0,
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

    pub fn with_rs(mut self, rs: f64) -> Self {
        self.rs = rs.abs();
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

    /// Diode bridge rather than MOSFET bridge.
    pub fn is_diode(&self) -> bool {
        self.vdrop != 0.0
    }

    pub fn validate(&self) -> Result<()> {
        if !self.vdrop.is_finite() || !self.rs.is_finite() {
            return Err(PowerTreeError::invalid_param(
                &self.name,
                "vdrop",
                "drop and resistance must be finite",
            ));
        }
        self.ig.validate(&self.name, TableKind::GroundCurrent)
    }

    fn ground_current(&self, v_in: f64, i_out: f64) -> f64 {
        if self.is_diode() {
            0.0
        } else {
            self.ig.interp(i_out.abs(), v_in.abs())
        }
    }

    fn output(&self, v_in: f64, i_out: f64) -> f64 {
        if self.is_diode() {
            v_in.abs() - 2.0 * self.vdrop
        } else {
            v_in.abs() - 2.0 * self.rs * i_out
        }
    }
}

impl PowerComponent for Rectifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Rectifier
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn initial_input_current(&self, ctx: &PhaseCtx) -> f64 {
        if ctx.is_active() {
            self.ground_current(0.0, 0.0)
        } else {
            self.iis
        }
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
        if v_in == 0.0 || parent_off {
            return 0.0;
        }
        if !ctx.is_active() {
            return self.iis;
        }
        i_out + self.ground_current(v_in, i_out)
    }

    fn solve_output_voltage(
        &self,
        inputs: &Inputs,
        _i_in: f64,
        i_out: f64,
        ctx: &PhaseCtx,
    ) -> Result<(f64, NodeState)> {
        let (v_in, parent_off) = inputs.primary();
        if v_in == 0.0 || parent_off || !ctx.is_active() {
            return Ok((0.0, NodeState::off()));
        }
        let v_out = self.output(v_in, i_out);
        if self.is_diode() && v_out <= 0.0 {
            return Err(PowerTreeError::unstable(&self.name));
        }
        Ok((v_out, NodeState::on()))
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
        if !ctx.is_active() {
            let sleep = (self.iis * v_in).abs();
            return PowerLoss::new(sleep, sleep, 0.0, self.rt, ambient);
        }
        if v_in == 0.0 {
            return PowerLoss::new(0.0, 0.0, 0.0, self.rt, ambient);
        }
        let loss = if self.is_diode() {
            2.0 * self.vdrop * i_out.abs()
        } else {
            let mut loss = self.ground_current(v_in, i_out) * v_in.abs();
            if i_out.abs() > 0.0 {
                loss += (v_in.abs() - v_out.abs()) * i_out;
            }
            loss
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
        self.limits
            .check(&throughput_metrics(v_in, v_out, i_in, i_out, &pl, ambient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diode_bridge() {
        let rect = Rectifier::new("BR").with_vdrop(0.7);
        let ctx = PhaseCtx::nominal();
        let (v, _) = rect
            .solve_output_voltage(&Inputs::single(-12.0, false), 1.0, 1.0, &ctx)
            .unwrap();
        assert!((v - 10.6).abs() < 1e-12);
        let i = rect.solve_input_current(&Inputs::single(-12.0, false), &NodeState::on(), v, 1.0, &ctx);
        assert_eq!(i, 1.0);
        let pl = rect.solve_power_loss(-12.0, v, i, 1.0, 25.0, &ctx);
        assert!((pl.loss - 1.4).abs() < 1e-12);
        assert!((pl.power - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_diode_bridge_polarity_inversion() {
        let rect = Rectifier::new("BR").with_vdrop(0.7);
        let err = rect
            .solve_output_voltage(&Inputs::single(1.0, false), 0.1, 0.1, &PhaseCtx::nominal())
            .unwrap_err();
        assert!(matches!(err, PowerTreeError::UnstableSystem { .. }));
    }

    #[test]
    fn test_mosfet_bridge() {
        let rect = Rectifier::new("BR")
            .with_rs(0.05)
            .with_ig(Interpolator::Constant(1e-3));
        assert!(!rect.is_diode());
        let ctx = PhaseCtx::nominal();
        let (v, _) = rect
            .solve_output_voltage(&Inputs::single(-10.0, false), 2.0, 2.0, &ctx)
            .unwrap();
        assert!((v - 9.8).abs() < 1e-12);
        let i = rect.solve_input_current(&Inputs::single(-10.0, false), &NodeState::on(), v, 2.0, &ctx);
        assert!((i - 2.001).abs() < 1e-12);
        let pl = rect.solve_power_loss(-10.0, v, i, 2.0, 25.0, &ctx);
        assert!((pl.loss - (1e-2 + 0.4)).abs() < 1e-9);
    }
}
