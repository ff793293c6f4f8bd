//! Folding converged solutions into report rows.

use crate::components::{efficiency, ComponentKind, PhaseCtx, PowerComponent, Warnings};
use crate::network::{NetworkMetadata, NodeId, PowerNetwork};

use super::analyzer::SolveConfig;
use super::state::Solution;

/// What a report row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// A single component
    Component(ComponentKind),
    /// Everything fed by one source (only with several sources)
    Subsystem,
    /// The whole system in one phase
    Total,
    /// Duration-weighted average over all phases
    Average,
}

/// One row of a solve report.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub name: String,
    pub kind: RowKind,
    /// Selected parent component
    pub parent: Option<String>,
    /// Rail of the parent
    pub rail_in: Option<String>,
    /// Rail of this component
    pub rail_out: Option<String>,
    pub group: Option<String>,
    /// Source feeding this component
    pub domain: Option<String>,
    pub phase: Option<String>,
    pub vin: Option<f64>,
    pub vout: Option<f64>,
    pub iin: Option<f64>,
    pub iout: Option<f64>,
    /// Input power (W)
    pub power: f64,
    /// Dissipated power (W)
    pub loss: f64,
    /// Efficiency (%)
    pub efficiency: f64,
    /// Temperature rise (°C), none for sources and summaries
    pub temp_rise: Option<f64>,
    /// Peak temperature (°C), none for sources and summaries
    pub peak_temp: Option<f64>,
    /// Energy per 24 h (Wh)
    pub energy: f64,
    /// Limit excursions of a component row
    pub warnings: Warnings,
    /// Some component covered by this row exceeded a limit
    pub flagged: bool,
}

impl ResultRow {
    fn summary(name: impl Into<String>, kind: RowKind, phase: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            rail_in: None,
            rail_out: None,
            group: None,
            domain: None,
            phase: phase.map(str::to_string),
            vin: None,
            vout: None,
            iin: None,
            iout: None,
            power: 0.0,
            loss: 0.0,
            efficiency: 100.0,
            temp_rise: None,
            peak_temp: None,
            energy: 0.0,
            warnings: Warnings::none(),
            flagged: false,
        }
    }

    /// Whether this row describes a component.
    pub fn is_component(&self) -> bool {
        matches!(self.kind, RowKind::Component(_))
    }
}

/// Result of [`Analyzer::solve`](super::Analyzer::solve).
#[derive(Debug, Clone)]
pub struct Report {
    /// System name
    pub system: String,
    /// Component rows then summaries, phase by phase, then the average row
    pub rows: Vec<ResultRow>,
    /// Raw solution of every solved phase
    pub solutions: Vec<Solution>,
    /// Caller tags, copied onto every row in the CSV output
    pub tags: Vec<(String, String)>,
    /// Include the 24 h energy column in the CSV output
    pub energy: bool,
}

impl Report {
    /// The row named `name` in `phase`.
    pub fn row(&self, name: &str, phase: Option<&str>) -> Option<&ResultRow> {
        self.rows
            .iter()
            .find(|r| r.name == name && r.phase.as_deref() == phase)
    }

    /// The system total of `phase`.
    pub fn total(&self, phase: Option<&str>) -> Option<&ResultRow> {
        self.rows
            .iter()
            .find(|r| r.kind == RowKind::Total && r.phase.as_deref() == phase)
    }

    /// The phase-weighted average row, present when several phases were solved.
    pub fn average(&self) -> Option<&ResultRow> {
        self.rows.iter().find(|r| r.kind == RowKind::Average)
    }

    /// Whether any component row exceeded a limit.
    pub fn has_warnings(&self) -> bool {
        self.rows.iter().any(|r| r.flagged)
    }

    /// Whether the system has several source domains.
    pub fn has_subsystems(&self) -> bool {
        self.rows.iter().any(|r| r.kind == RowKind::Subsystem)
    }
}

/// Per-phase system figures feeding the average row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PhaseTotals {
    pub power: f64,
    pub loss: f64,
    pub efficiency: f64,
    pub current: Option<f64>,
    pub duration: f64,
}

/// One source domain while a phase is being folded.
struct Domain {
    source: NodeId,
    voltage: f64,
    current: f64,
    power: f64,
    loss: f64,
    flagged: bool,
}

/// Energy per 24 h of a row dissipating `power` in `phase`.
pub(crate) fn energy(meta: &NetworkMetadata, phase: Option<&str>, power: f64) -> f64 {
    match phase.and_then(|p| meta.phase_duration(p)) {
        Some(duration) => (duration / 3600.0) * power * (24.0 * 3600.0 / meta.cycle_time()),
        None => power * 24.0,
    }
}

/// Component, subsystem and total rows of one solved phase.
pub(crate) fn phase_rows(
    net: &PowerNetwork,
    sol: &Solution,
    config: &SolveConfig,
) -> (Vec<ResultRow>, PhaseTotals) {
    let meta = net.metadata();
    let phase = sol.phase.as_deref();
    let state = &sol.state;
    let mut domain_of: Vec<Option<NodeId>> = vec![None; net.capacity()];
    let mut domains: Vec<Domain> = Vec::new();
    let mut rows = Vec::with_capacity(net.len() + 2);

    for &id in net.order() {
        let Some(node) = net.node(id) else { continue };
        let comp = &node.component;
        let ctx = PhaseCtx::new(phase, meta.phase_config(id));
        let selected = state.selected_parent(net, id);

        let (vin, iout) = if node.parents.is_empty() {
            (comp.initial_output_voltage(&ctx), state.i[id.0])
        } else {
            let vin = selected.map_or(0.0, |p| state.v[p.0]);
            let iout = if node.children.is_empty() {
                0.0
            } else {
                state.attributed_current(net, id)
            };
            (vin, iout)
        };
        let vout = state.v[id.0];
        let iin = state.i[id.0];

        let domain = if node.parents.is_empty() {
            Some(id)
        } else {
            selected.and_then(|p| domain_of[p.0])
        };
        domain_of[id.0] = domain;

        let pl = comp.solve_power_loss(vin, vout, iin, iout, config.ambient, &ctx);
        let warnings = comp.check_warnings(vin, vout, iin, iout, config.ambient, &ctx);
        if !warnings.is_empty() {
            tracing::warn!(component = comp.name(), phase, %warnings, "limits exceeded");
        }

        let is_source = comp.kind() == ComponentKind::Source;
        if is_source {
            domains.push(Domain {
                source: id,
                voltage: vin,
                current: iout,
                power: pl.power,
                loss: 0.0,
                flagged: false,
            });
        }
        if let Some(d) = domains.iter_mut().find(|d| Some(d.source) == domain) {
            d.loss += pl.loss;
            d.flagged |= !warnings.is_empty();
        }

        let parent = selected.or_else(|| node.parents.first().copied());
        let name_of = |id: NodeId| net.node(id).map(|n| n.component.name().to_string());
        rows.push(ResultRow {
            name: comp.name().to_string(),
            kind: RowKind::Component(comp.kind()),
            parent: parent.and_then(name_of),
            rail_in: parent.and_then(|p| meta.rail(p)).map(str::to_string),
            rail_out: meta.rail(id).map(str::to_string),
            group: meta.group(id).map(str::to_string),
            domain: domain.and_then(name_of),
            phase: phase.map(str::to_string),
            vin: Some(vin),
            vout: Some(vout),
            iin: Some(iin),
            iout: Some(iout),
            power: pl.power,
            loss: pl.loss,
            efficiency: pl.efficiency,
            temp_rise: (!is_source).then_some(pl.temp_rise),
            peak_temp: (!is_source).then_some(pl.peak_temp),
            energy: energy(meta, phase, pl.power),
            warnings,
            flagged: !warnings.is_empty(),
        });
    }

    let flagged = rows.iter().any(|r| r.flagged);
    if domains.len() > 1 {
        for d in &domains {
            let name = net.node(d.source).map_or("", |n| n.component.name());
            let mut row = ResultRow::summary(format!("Subsystem {}", name), RowKind::Subsystem, phase);
            row.vin = Some(d.voltage);
            row.iout = Some(d.current);
            row.power = d.power;
            row.loss = d.loss;
            row.efficiency = efficiency(d.power, d.power - d.loss, 100.0);
            row.energy = energy(meta, phase, d.power);
            row.flagged = d.flagged;
            rows.push(row);
        }
    }

    let power: f64 = domains.iter().map(|d| d.power).sum();
    let loss: f64 = domains.iter().map(|d| d.loss).sum();
    let current = match domains.as_slice() {
        [single] => Some(single.current),
        _ => None,
    };
    let mut total = ResultRow::summary("System total", RowKind::Total, phase);
    total.power = power;
    total.loss = loss;
    total.efficiency = efficiency(power, power - loss, 100.0);
    total.iout = current;
    total.energy = energy(meta, phase, power);
    total.flagged = flagged;
    rows.push(total);

    let totals = PhaseTotals {
        power,
        loss,
        efficiency: efficiency(power, power - loss, 100.0),
        current,
        duration: phase.and_then(|p| meta.phase_duration(p)).unwrap_or(0.0),
    };
    (rows, totals)
}

/// Duration-weighted average over the solved phases.
pub(crate) fn average_row(totals: &[PhaseTotals]) -> ResultRow {
    let time: f64 = totals.iter().map(|t| t.duration).sum();
    let weighted = |f: fn(&PhaseTotals) -> f64| -> f64 {
        if time > 0.0 {
            totals.iter().map(|t| f(t) * t.duration).sum::<f64>() / time
        } else {
            0.0
        }
    };

    let mut row = ResultRow::summary("System average", RowKind::Average, None);
    row.power = weighted(|t| t.power);
    row.loss = weighted(|t| t.loss);
    row.efficiency = weighted(|t| t.efficiency);
    if totals.iter().all(|t| t.current.is_some()) {
        row.iout = Some(weighted(|t| t.current.unwrap_or(0.0)));
    }
    row.energy = row.power * 24.0;
    row
}

/// One rail of a rail report.
#[derive(Debug, Clone, PartialEq)]
pub struct RailRow {
    pub phase: Option<String>,
    pub rail: String,
    /// Voltage seen by the first consumer (V)
    pub voltage: f64,
    /// Summed consumer input current (A)
    pub current: f64,
    /// Summed consumer input power (W)
    pub power: f64,
    /// Summed consumer loss (W)
    pub loss: f64,
    /// Efficiency (%)
    pub efficiency: f64,
    /// Union of consumer warnings
    pub warnings: Warnings,
}

/// Summarize component rows per phase and input rail.
pub(crate) fn rail_rows(report: &Report) -> Vec<RailRow> {
    let mut rails: Vec<RailRow> = Vec::new();
    for row in report.rows.iter().filter(|r| r.is_component()) {
        let Some(rail) = row.rail_in.as_deref() else { continue };
        let existing = rails
            .iter_mut()
            .find(|r| r.rail == rail && r.phase == row.phase);
        match existing {
            Some(r) => {
                r.current += row.iin.unwrap_or(0.0);
                r.power += row.power;
                r.loss += row.loss;
                r.warnings.merge(row.warnings);
            }
            None => rails.push(RailRow {
                phase: row.phase.clone(),
                rail: rail.to_string(),
                voltage: row.vin.unwrap_or(0.0),
                current: row.iin.unwrap_or(0.0),
                power: row.power,
                loss: row.loss,
                efficiency: 0.0,
                warnings: row.warnings,
            }),
        }
    }
    for r in &mut rails {
        r.efficiency = if r.loss == 0.0 {
            100.0
        } else {
            100.0 * r.power / (r.power + r.loss)
        };
    }
    rails
}
