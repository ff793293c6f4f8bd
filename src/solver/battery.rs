//! Battery-life estimation by repeated steady-state solves.

use crate::error::{PowerTreeError, Result};
use crate::network::{validate_network, PowerNetwork};

use super::analyzer::SolveConfig;
use super::relax::Relaxation;

/// Terminal state of a battery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryState {
    /// Remaining capacity (Ah)
    pub capacity: f64,
    /// Open-circuit voltage (V)
    pub voltage: f64,
    /// Internal resistance (Ω)
    pub resistance: f64,
}

/// A battery model driven by the estimator.
pub trait Battery {
    /// Current state without drawing charge.
    fn probe(&mut self) -> BatteryState;

    /// Draw `current` (A) for `dt` seconds and return the new state.
    fn deplete(&mut self, dt: f64, current: f64) -> BatteryState;
}

/// One point of a discharge curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterySample {
    /// Elapsed time (s)
    pub time: f64,
    /// Remaining capacity (Ah)
    pub capacity: f64,
    /// Open-circuit voltage (V)
    pub voltage: f64,
    /// Internal resistance (Ω)
    pub resistance: f64,
}

impl BatterySample {
    fn at(time: f64, state: BatteryState) -> Self {
        Self {
            time,
            capacity: state.capacity,
            voltage: state.voltage,
            resistance: state.resistance,
        }
    }
}

/// Discharge `battery` through the network until its voltage reaches
/// `cutoff` or its capacity is exhausted.
///
/// The source named `source` takes the battery's voltage and resistance
/// before every step. With load phases the network cycles through them with
/// the phase duration as time step; without phases each step draws 1/1000
/// of the initial capacity. `net` itself is left untouched.
pub fn battery_life(
    net: &PowerNetwork,
    source: &str,
    cutoff: f64,
    battery: &mut dyn Battery,
    config: &SolveConfig,
) -> Result<Vec<BatterySample>> {
    config.validate()?;
    validate_network(net)?;
    let mut net = net.clone();
    let id = net.find(source)?;
    if net.component_mut(source)?.as_source_mut().is_none() {
        return Err(PowerTreeError::invalid_param(source, "source", "not a source"));
    }

    let phases: Vec<(Option<String>, f64)> = if net.phases().is_empty() {
        vec![(None, 0.0)]
    } else {
        net.phases()
            .iter()
            .map(|(name, t)| (Some(name.clone()), *t))
            .collect()
    };

    let _span = tracing::info_span!("battery_life", source, cutoff).entered();
    let mut state = battery.probe();
    let initial_capacity = state.capacity;
    let mut samples = vec![BatterySample::at(0.0, state)];
    let mut time = 0.0;
    let mut step = 0;
    let mut cycle_charge = 0.0;

    while state.capacity > 0.0 && state.voltage > cutoff {
        if let Some(src) = net.component_mut(source)?.as_source_mut() {
            src.vo = state.voltage;
            src.rs = state.resistance;
        }

        let (phase, duration) = &phases[step % phases.len()];
        let sol = Relaxation::new(&net, phase.as_deref(), config).run()?;
        let current = sol.current(id).abs();
        let dt = match phase {
            Some(_) => *duration,
            None if current > 0.0 => 3.6 * initial_capacity / current,
            None => return Err(no_current(source)),
        };

        cycle_charge += current * dt;
        step += 1;
        if step % phases.len() == 0 {
            if cycle_charge == 0.0 {
                return Err(no_current(source));
            }
            cycle_charge = 0.0;
        }

        state = battery.deplete(dt, current);
        time += dt;
        if state.capacity > 0.0 && state.voltage > cutoff {
            samples.push(BatterySample::at(time, state));
        }
    }

    tracing::debug!(steps = step, hours = time / 3600.0, "battery depleted");
    Ok(samples)
}

fn no_current(source: &str) -> PowerTreeError {
    PowerTreeError::InvalidSimulationParam {
        message: format!("source '{}' draws no current, battery would never deplete", source),
    }
}
