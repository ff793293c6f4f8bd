//! Analysis driver: phase loop, result rows and rail report.

use crate::error::{PowerTreeError, Result};
use crate::network::{validate_network, PowerNetwork};

use super::aggregate::{self, RailRow, Report};
use super::relax::Relaxation;
use super::state::Solution;
use super::{DEFAULT_AMBIENT, DEFAULT_ITOL, DEFAULT_MAX_ITERATIONS, DEFAULT_VTOL};

/// Configuration for an analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveConfig {
    /// Relative voltage tolerance.
    pub vtol: f64,
    /// Relative current tolerance.
    pub itol: f64,
    /// Iteration limit per phase.
    pub max_iterations: usize,
    /// Solve only this phase (all phases when `None`).
    pub phase: Option<String>,
    /// Ambient temperature (°C).
    pub ambient: f64,
    /// Extra columns copied onto every report row.
    pub tags: Vec<(String, String)>,
    /// Report 24 h energy.
    pub energy: bool,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            vtol: DEFAULT_VTOL,
            itol: DEFAULT_ITOL,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            phase: None,
            ambient: DEFAULT_AMBIENT,
            tags: Vec::new(),
            energy: false,
        }
    }
}

impl SolveConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relative voltage tolerance.
    pub fn with_vtol(mut self, vtol: f64) -> Self {
        self.vtol = vtol;
        self
    }

    /// Set the relative current tolerance.
    pub fn with_itol(mut self, itol: f64) -> Self {
        self.itol = itol;
        self
    }

    /// Set the iteration limit per phase.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Restrict the analysis to one phase.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    pub fn with_ambient(mut self, ambient: f64) -> Self {
        self.ambient = ambient;
        self
    }

    /// Add a tag column.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn with_energy(mut self, energy: bool) -> Self {
        self.energy = energy;
        self
    }

    /// Reject non-physical solver parameters.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| PowerTreeError::InvalidSimulationParam { message };
        if !(self.vtol.is_finite() && self.vtol > 0.0) {
            return Err(invalid(format!("vtol must be positive, got {}", self.vtol)));
        }
        if !(self.itol.is_finite() && self.itol > 0.0) {
            return Err(invalid(format!("itol must be positive, got {}", self.itol)));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least 1".to_string()));
        }
        if !self.ambient.is_finite() {
            return Err(invalid(format!("ambient must be finite, got {}", self.ambient)));
        }
        Ok(())
    }
}

/// Steady-state analysis of a power network.
///
/// # Example
///
/// ```
/// use powertree_core::{Analyzer, Load, NodeOptions, PowerNetwork, Source};
///
/// let mut net = PowerNetwork::new("demo", Source::new("BAT", 5.0), NodeOptions::new()).unwrap();
/// net.add_component("BAT", Load::power("MCU", 0.5), NodeOptions::new()).unwrap();
///
/// let report = Analyzer::new(&net).solve().unwrap();
/// let total = report.total(None).unwrap();
/// assert!((total.power - 0.5).abs() < 1e-6);
/// ```
pub struct Analyzer<'a> {
    net: &'a PowerNetwork,
    config: SolveConfig,
}

impl<'a> Analyzer<'a> {
    /// Create an analyzer with default configuration.
    pub fn new(net: &'a PowerNetwork) -> Self {
        Self {
            net,
            config: SolveConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: SolveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SolveConfig {
        &self.config
    }

    /// Solve every requested phase and fold the results into a report.
    ///
    /// Any phase failing to converge aborts the whole analysis.
    pub fn solve(&self) -> Result<Report> {
        let _span = tracing::info_span!("solve", system = self.net.name()).entered();
        self.config.validate()?;
        validate_network(self.net)?;

        let phases = self.phase_list()?;
        let mut rows = Vec::new();
        let mut solutions = Vec::with_capacity(phases.len());
        let mut totals = Vec::with_capacity(phases.len());
        for phase in &phases {
            let _phase_span = tracing::debug_span!("phase", name = phase.unwrap_or("")).entered();
            let sol = Relaxation::new(self.net, *phase, &self.config).run()?;
            let (phase_rows, phase_totals) = aggregate::phase_rows(self.net, &sol, &self.config);
            rows.extend(phase_rows);
            totals.push(phase_totals);
            solutions.push(sol);
        }
        if phases.len() > 1 {
            rows.push(aggregate::average_row(&totals));
        }

        Ok(Report {
            system: self.net.name().to_string(),
            rows,
            solutions,
            tags: self.config.tags.clone(),
            energy: self.config.energy,
        })
    }

    /// Solve a single phase and return the raw solution.
    ///
    /// `None` evaluates every component at its nominal values.
    pub fn solve_phase(&self, phase: Option<&str>) -> Result<Solution> {
        self.config.validate()?;
        validate_network(self.net)?;
        if let Some(p) = phase {
            self.check_phase(p)?;
        }
        let _span = tracing::debug_span!("phase", name = phase.unwrap_or("")).entered();
        Relaxation::new(self.net, phase, &self.config).run()
    }

    /// Solve, then summarize current, power and loss per input rail.
    ///
    /// Empty when no rails are defined.
    pub fn rail_report(&self) -> Result<Vec<RailRow>> {
        let report = self.solve()?;
        Ok(aggregate::rail_rows(&report))
    }

    /// Phases to solve, in declaration order.
    fn phase_list(&self) -> Result<Vec<Option<&str>>> {
        if let Some(p) = self.config.phase.as_deref() {
            self.check_phase(p)?;
            return Ok(vec![Some(p)]);
        }
        let phases = self.net.phases();
        if phases.is_empty() {
            Ok(vec![None])
        } else {
            Ok(phases.iter().map(|(name, _)| Some(name.as_str())).collect())
        }
    }

    fn check_phase(&self, phase: &str) -> Result<()> {
        if self.net.metadata().phase_duration(phase).is_none() {
            return Err(PowerTreeError::UnknownPhase {
                phase: phase.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Converter, Load, Source};
    use crate::network::NodeOptions;
    use crate::solver::RowKind;

    fn buck_network() -> PowerNetwork {
        let mut net = PowerNetwork::new("buck", Source::new("BAT", 12.0), NodeOptions::new()).unwrap();
        net.add_component(
            "BAT",
            Converter::new("BUCK", 5.0, 0.8),
            NodeOptions::new().with_rail("5V"),
        )
        .unwrap();
        net.add_component("5V", Load::current("MCU", 0.1), NodeOptions::new())
            .unwrap();
        net.add_component("BUCK", Load::current("LED", 0.05), NodeOptions::new())
            .unwrap();
        net
    }

    #[test]
    fn test_config_validation() {
        assert!(SolveConfig::new().validate().is_ok());
        assert!(SolveConfig::new().with_vtol(0.0).validate().is_err());
        assert!(SolveConfig::new().with_itol(f64::NAN).validate().is_err());
        assert!(SolveConfig::new().with_max_iterations(0).validate().is_err());
    }

    #[test]
    fn test_rows_and_total() {
        let net = buck_network();
        let report = Analyzer::new(&net).solve().unwrap();
        assert_eq!(report.rows.len(), 5);
        assert!(!report.has_subsystems());

        let buck = report.row("BUCK", None).unwrap();
        assert_eq!(buck.kind, RowKind::Component(crate::components::ComponentKind::Converter));
        assert_eq!(buck.parent.as_deref(), Some("BAT"));
        assert_eq!(buck.rail_out.as_deref(), Some("5V"));
        assert!((buck.iout.unwrap() - 0.15).abs() < 1e-9);
        assert!((buck.efficiency - 80.0).abs() < 1e-6);

        let total = report.total(None).unwrap();
        assert!((total.power - 0.75 / 0.8).abs() < 1e-6);
        assert!((total.loss - (0.75 / 0.8 - 0.75)).abs() < 1e-6);
        assert!(total.iout.is_some());
        assert!(report.average().is_none());
    }

    #[test]
    fn test_unknown_phase() {
        let net = buck_network();
        let err = Analyzer::new(&net)
            .with_config(SolveConfig::new().with_phase("sleep"))
            .solve()
            .unwrap_err();
        assert!(matches!(err, PowerTreeError::UnknownPhase { .. }));
        assert!(Analyzer::new(&net).solve_phase(Some("sleep")).is_err());
    }

    #[test]
    fn test_rail_report() {
        let net = buck_network();
        let rails = Analyzer::new(&net).rail_report().unwrap();
        assert_eq!(rails.len(), 1);
        assert_eq!(rails[0].rail, "5V");
        assert!((rails[0].voltage - 5.0).abs() < 1e-9);
        assert!((rails[0].current - 0.15).abs() < 1e-9);
        assert!((rails[0].power - 0.75).abs() < 1e-9);
        assert_eq!(rails[0].efficiency, 100.0);
    }

    #[test]
    fn test_phases_produce_average() {
        let mut net = buck_network();
        net.set_phases([("run", 10.0), ("idle", 30.0)]).unwrap();
        net.set_component_phases(
            "BUCK",
            crate::components::PhaseConfig::Active(vec!["run".to_string()]),
        )
        .unwrap();
        let report = Analyzer::new(&net).solve().unwrap();
        assert_eq!(report.solutions.len(), 2);

        let idle = report.total(Some("idle")).unwrap();
        assert_eq!(idle.power, 0.0);
        let run = report.total(Some("run")).unwrap();
        let avg = report.average().unwrap();
        assert!((avg.power - run.power * 0.25).abs() < 1e-9);
    }
}
