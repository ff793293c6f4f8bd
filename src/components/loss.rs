//! Series loss elements: resistive (RLoss) and voltage drop (VLoss).

use super::{
    sign, throughput_metrics, ComponentKind, Inputs, Interpolator, Limits, NodeState, PhaseCtx,
    PowerComponent, PowerLoss, TableKind, Warnings,
};
use crate::error::{PowerTreeError, Result};

/// How a series element drops voltage.
#[derive(Debug, Clone, PartialEq)]
pub enum DropModel {
    /// Resistive drop `rs * io`.
    Resistance(f64),
    /// Fixed or interpolated voltage drop.
    Voltage(Interpolator),
}

/// A series element between a parent and its children.
///
/// The output voltage is the input voltage reduced by the drop, keeping the
/// input polarity. A drop large enough to flip the polarity makes the
/// system unstable.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesLoss {
    pub name: String,
    pub drop: DropModel,
    /// Thermal resistance (°C/W)
    pub rt: f64,
    pub limits: Limits,
}

impl SeriesLoss {
    /// Resistive loss (e.g. a PCB trace or a fuse).
    pub fn resistive(name: impl Into<String>, rs: f64) -> Self {
        Self {
            name: name.into(),
            drop: DropModel::Resistance(rs.abs()),
            rt: 0.0,
            limits: Limits::default(),
        }
    }

    /// Voltage-drop loss (e.g. a diode).
    pub fn voltage_drop(name: impl Into<String>, vdrop: Interpolator) -> Self {
        Self {
            name: name.into(),
            drop: DropModel::Voltage(vdrop),
            rt: 0.0,
            limits: Limits::default(),
        }
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
        match &self.drop {
            DropModel::Resistance(rs) if !rs.is_finite() => Err(PowerTreeError::invalid_param(
                &self.name,
                "rs",
                "must be finite",
            )),
            DropModel::Resistance(_) => Ok(()),
            DropModel::Voltage(ip) => ip.validate(&self.name, TableKind::VoltageDrop),
        }
    }

    /// Output voltage for input `v_in` and output current `i_out`.
    fn output(&self, v_in: f64, i_out: f64) -> f64 {
        let drop = match &self.drop {
            DropModel::Resistance(rs) => rs * i_out,
            DropModel::Voltage(ip) => ip.interp(i_out.abs(), v_in.abs()),
        };
        v_in - drop * sign(v_in)
    }
}

impl PowerComponent for SeriesLoss {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::SLoss
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn initial_input_current(&self, _ctx: &PhaseCtx) -> f64 {
        0.0
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
        i_out: f64,
        _ctx: &PhaseCtx,
    ) -> f64 {
        let (v_in, parent_off) = inputs.get(state.input);
        if v_in == 0.0 || parent_off {
            0.0
        } else {
            i_out
        }
    }

    fn solve_output_voltage(
        &self,
        inputs: &Inputs,
        _i_in: f64,
        i_out: f64,
        _ctx: &PhaseCtx,
    ) -> Result<(f64, NodeState)> {
        let (v_in, parent_off) = inputs.primary();
        if parent_off {
            return Ok((0.0, NodeState::off()));
        }
        let v_out = self.output(v_in, i_out);
        if sign(v_out) != sign(v_in) {
            return Err(PowerTreeError::unstable(&self.name));
        }
        Ok((v_out, NodeState::on()))
    }

    fn solve_power_loss(
        &self,
        v_in: f64,
        _v_out: f64,
        i_in: f64,
        i_out: f64,
        ambient: f64,
        _ctx: &PhaseCtx,
    ) -> PowerLoss {
        let v_out = self.output(v_in, i_out);
        if v_in == 0.0 || sign(v_out) != sign(v_in) {
            return PowerLoss::idle(0.0);
        }
        let loss = (v_in - v_out).abs() * i_out;
        PowerLoss::new((v_in * i_in).abs(), loss, 100.0, self.rt, ambient)
    }

    fn check_warnings(
        &self,
        v_in: f64,
        v_out: f64,
        i_in: f64,
        i_out: f64,
        ambient: f64,
        _ctx: &PhaseCtx,
    ) -> Warnings {
        // every power and thermal metric from the terminal quantities
        let p_in = v_in.abs() * i_in;
        let p_loss = p_in - v_out.abs() * i_out;
        let pl = PowerLoss::new(p_in, p_loss, 100.0, self.rt, ambient);
        let metrics = throughput_metrics(v_in, v_out, i_in, i_out, &pl, ambient);
        self.limits.check(&metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{InterpTable, Metric};

    #[test]
    fn test_resistive_drop() {
        let r = SeriesLoss::resistive("R1", 0.1);
        let (v, state) = r
            .solve_output_voltage(&Inputs::single(5.0, false), 1.0, 1.0, &PhaseCtx::nominal())
            .unwrap();
        assert!((v - 4.9).abs() < 1e-12);
        assert!(!state.off);
        let pl = r.solve_power_loss(5.0, 4.9, 1.0, 1.0, 25.0, &PhaseCtx::nominal());
        assert!((pl.loss - 0.1).abs() < 1e-12);
        assert!((pl.power - 5.0).abs() < 1e-12);
        assert!((pl.efficiency - 98.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_input_keeps_polarity() {
        let r = SeriesLoss::resistive("R1", 1.0);
        let (v, _) = r
            .solve_output_voltage(&Inputs::single(-5.0, false), 0.5, 0.5, &PhaseCtx::nominal())
            .unwrap();
        assert!((v + 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_polarity_inversion_is_unstable() {
        let r = SeriesLoss::resistive("R1", 25.0);
        let err = r
            .solve_output_voltage(&Inputs::single(-15.0, false), 0.7, 0.7, &PhaseCtx::nominal())
            .unwrap_err();
        assert!(matches!(err, PowerTreeError::UnstableSystem { ref component } if component == "R1"));
    }

    #[test]
    fn test_interpolated_voltage_drop() {
        let table = InterpTable::current_only(vec![0.0, 1.0], vec![0.3, 0.7]);
        let ip = Interpolator::from_table("D1", TableKind::VoltageDrop, &table).unwrap();
        let d = SeriesLoss::voltage_drop("D1", ip);
        let (v, _) = d
            .solve_output_voltage(&Inputs::single(5.0, false), 0.5, 0.5, &PhaseCtx::nominal())
            .unwrap();
        assert!((v - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_parent_off_propagates() {
        let r = SeriesLoss::resistive("R1", 0.1);
        let (v, state) = r
            .solve_output_voltage(&Inputs::single(5.0, true), 0.0, 0.0, &PhaseCtx::nominal())
            .unwrap();
        assert_eq!(v, 0.0);
        assert!(state.off);
    }

    #[test]
    fn test_thermal_warnings_follow_terminal_loss() {
        let limits = Limits::new()
            .with(Metric::Pl, 0.0, 0.8)
            .with(Metric::Tr, 0.0, 7.0);
        let r = SeriesLoss::resistive("R1", 0.5)
            .with_rt(10.0)
            .with_limits(limits);
        // 1 W dissipated between the terminals, 10 °C rise
        let w = r.check_warnings(5.0, 4.0, 1.0, 1.0, 25.0, &PhaseCtx::nominal());
        assert!(w.contains(Metric::Pl));
        assert!(w.contains(Metric::Tr));
        assert!(!w.contains(Metric::Po));
    }

    #[test]
    fn test_negative_constant_drop_rejected() {
        let d = SeriesLoss::voltage_drop("D1", Interpolator::Constant(-0.3));
        assert!(d.validate().is_err());
    }
}
