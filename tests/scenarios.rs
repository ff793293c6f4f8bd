//! End-to-end tests for the power-tree estimator.

use approx::assert_abs_diff_eq;
use powertree_core::components::Interpolator;
use powertree_core::{
    battery_life, dsl, Analyzer, Battery, BatteryState, ComponentKind, Converter, LinReg, Load,
    Metric, NodeOptions, PMux, PSwitch, PhaseConfig, PowerComponent, PowerNetwork, PowerTreeError,
    Report, RowKind, SeriesLoss, SolveConfig, Source,
};

/// Helper: parse + build + solve
fn solve_netlist(netlist: &str) -> Report {
    let ast = dsl::parse(netlist).expect("parse failed");
    let net = PowerNetwork::from_ast(ast).expect("build failed");
    Analyzer::new(&net).solve().expect("solve failed")
}

fn phase_active(phases: &[&str]) -> PhaseConfig {
    PhaseConfig::Active(phases.iter().map(|p| p.to_string()).collect())
}

/// Source(12 V) → PMux fed by two phase-gated sources → 1 W load.
fn mux_network() -> PowerNetwork {
    let mut net = PowerNetwork::new("mux", Source::new("A", 12.0), NodeOptions::new()).unwrap();
    net.add_source(Source::new("B", 5.0), NodeOptions::new()).unwrap();
    net.add_mux(&["A", "B"], PMux::new("MUX").with_rs(0.1), NodeOptions::new())
        .unwrap();
    net.add_component("MUX", Load::power("LOAD", 1.0), NodeOptions::new())
        .unwrap();
    net.set_phases([("x", 100.0), ("y", 100.0)]).unwrap();
    net.set_component_phases("A", phase_active(&["x"])).unwrap();
    net.set_component_phases("B", phase_active(&["y"])).unwrap();
    net
}

/// A mixed tree exercising every regulating and switching kind.
fn mixed_network() -> PowerNetwork {
    let mut net =
        PowerNetwork::new("mixed", Source::new("BAT", 12.0).with_rs(0.2), NodeOptions::new())
            .unwrap();
    net.add_component(
        "BAT",
        Converter::new("BUCK", 5.0, 0.9).with_iq(1e-3),
        NodeOptions::new().with_rail("5V"),
    )
    .unwrap();
    net.add_component(
        "5V",
        LinReg::new("LDO", 3.3)
            .with_vdrop(0.3)
            .with_ig(Interpolator::Constant(100e-6)),
        NodeOptions::new().with_rail("3V3"),
    )
    .unwrap();
    net.add_component("3V3", Load::power("MCU", 0.2), NodeOptions::new())
        .unwrap();
    net.add_component("5V", SeriesLoss::resistive("TRACE", 0.5), NodeOptions::new())
        .unwrap();
    net.add_component("TRACE", Load::current("RADIO", 0.1), NodeOptions::new())
        .unwrap();
    net.add_component(
        "BAT",
        PSwitch::new("SW")
            .with_rs(0.05)
            .with_ig(Interpolator::Constant(10e-6)),
        NodeOptions::new(),
    )
    .unwrap();
    net.add_component("SW", Load::resistance("HEATER", 100.0), NodeOptions::new())
        .unwrap();
    net
}

// ── Reference scenarios ──────────────────────────────────────────

#[test]
fn test_source_with_power_load() {
    let mut net = PowerNetwork::new("s1", Source::new("5V", 5.0), NodeOptions::new()).unwrap();
    net.add_component("5V", Load::power("LOAD", 0.5), NodeOptions::new())
        .unwrap();
    let report = Analyzer::new(&net).solve().unwrap();

    let src = report.row("5V", None).unwrap();
    assert_abs_diff_eq!(src.iout.unwrap(), 0.1, epsilon = 1e-9);
    assert_abs_diff_eq!(src.power, 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(src.loss, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(src.efficiency, 100.0, epsilon = 1e-9);
    assert!(src.temp_rise.is_none());
    assert_eq!(report.solutions[0].iterations, 2);
}

#[test]
fn test_converter_chain() {
    let mut net = PowerNetwork::new("s2", Source::new("12V", 12.0), NodeOptions::new()).unwrap();
    net.add_component("12V", Converter::new("BUCK", 5.0, 0.8), NodeOptions::new())
        .unwrap();
    net.add_component("BUCK", Load::current("LOAD", 0.1), NodeOptions::new())
        .unwrap();
    let report = Analyzer::new(&net).solve().unwrap();

    let buck = report.row("BUCK", None).unwrap();
    assert_abs_diff_eq!(buck.iin.unwrap(), 0.0520833, epsilon = 1e-6);
    assert_abs_diff_eq!(buck.efficiency, 80.0, epsilon = 1e-6);
    let total = report.total(None).unwrap();
    assert_abs_diff_eq!(total.efficiency, 80.0, epsilon = 1e-6);
}

#[test]
fn test_mux_follows_active_source() {
    let net = mux_network();
    let report = Analyzer::new(&net).solve().unwrap();
    assert!(report.has_subsystems());

    let a_x = report.row("Subsystem A", Some("x")).unwrap();
    let b_x = report.row("Subsystem B", Some("x")).unwrap();
    assert!(a_x.power > 1.0);
    assert_eq!(b_x.power, 0.0);
    let mux_x = report.row("MUX", Some("x")).unwrap();
    assert_eq!(mux_x.parent.as_deref(), Some("A"));
    assert_eq!(mux_x.domain.as_deref(), Some("A"));

    let a_y = report.row("Subsystem A", Some("y")).unwrap();
    let b_y = report.row("Subsystem B", Some("y")).unwrap();
    assert_eq!(a_y.power, 0.0);
    assert!(b_y.power > 1.0);
    let load_y = report.row("LOAD", Some("y")).unwrap();
    assert_eq!(load_y.domain.as_deref(), Some("B"));
    assert_abs_diff_eq!(load_y.power, 1.0, epsilon = 1e-6);

    // the load sees the switch drop of the selected input
    let mux = net.find("MUX").unwrap();
    let y = &report.solutions[1];
    let i = y.current(net.find("LOAD").unwrap());
    assert_abs_diff_eq!(y.voltage(mux), 5.0 - 0.1 * i, epsilon = 1e-6);

    assert!(report.total(Some("x")).unwrap().iout.is_none());
    assert!(report.average().unwrap().iout.is_none());
}

#[test]
fn test_mux_without_live_input_is_off() {
    let mut net = mux_network();
    net.set_phases([("x", 100.0), ("y", 100.0), ("z", 50.0)]).unwrap();
    let report = Analyzer::new(&net)
        .with_config(SolveConfig::new().with_phase("z"))
        .solve()
        .unwrap();

    let mux = report.row("MUX", Some("z")).unwrap();
    assert_eq!(mux.vout, Some(0.0));
    assert_eq!(mux.power, 0.0);
    let load = report.row("LOAD", Some("z")).unwrap();
    assert_eq!(load.power, 0.0);
    assert_eq!(report.total(Some("z")).unwrap().power, 0.0);
}

#[test]
fn test_excluded_mux_draws_sleep_current() {
    let mut net = PowerNetwork::new("mux", Source::new("A", 12.0), NodeOptions::new()).unwrap();
    net.add_source(Source::new("B", 5.0), NodeOptions::new()).unwrap();
    net.add_mux(
        &["A", "B"],
        PMux::new("MUX").with_rs(0.1).with_iis(1e-3),
        NodeOptions::new(),
    )
    .unwrap();
    net.add_component("MUX", Load::power("LOAD", 1.0), NodeOptions::new())
        .unwrap();
    net.set_phases([("run", 100.0), ("sleep", 100.0)]).unwrap();
    net.set_component_phases("MUX", phase_active(&["run"])).unwrap();

    let report = Analyzer::new(&net).solve().unwrap();
    let mux = report.row("MUX", Some("sleep")).unwrap();
    assert_eq!(mux.parent.as_deref(), Some("A"));
    assert_eq!(mux.domain.as_deref(), Some("A"));
    assert_eq!(mux.vin, Some(12.0));
    assert_eq!(mux.vout, Some(0.0));
    assert_abs_diff_eq!(mux.iin.unwrap(), 1e-3, epsilon = 1e-12);
    assert_abs_diff_eq!(mux.power, 0.012, epsilon = 1e-9);
    assert_abs_diff_eq!(mux.loss, 0.012, epsilon = 1e-9);

    assert_eq!(report.row("LOAD", Some("sleep")).unwrap().power, 0.0);
    assert_abs_diff_eq!(
        report.row("Subsystem A", Some("sleep")).unwrap().power,
        0.012,
        epsilon = 1e-9
    );
    assert_eq!(report.row("Subsystem B", Some("sleep")).unwrap().power, 0.0);
}

#[test]
fn test_hand_built_tables_are_validated() {
    let mut net = PowerNetwork::new("t", Source::new("BAT", 12.0), NodeOptions::new()).unwrap();

    let decreasing = Converter::new("C1", 5.0, 0.9).with_eff(Interpolator::Linear1d {
        x: vec![0.5, 0.1],
        fx: vec![0.8, 0.9],
    });
    let err = net
        .add_component("BAT", decreasing, NodeOptions::new())
        .unwrap_err();
    assert!(matches!(err, PowerTreeError::InvalidTable { .. }));

    let out_of_range = Converter::new("C2", 5.0, 0.9).with_eff(Interpolator::Linear1d {
        x: vec![0.1, 0.5],
        fx: vec![0.0, 2.0],
    });
    assert!(net.add_component("BAT", out_of_range, NodeOptions::new()).is_err());

    let empty = LinReg::new("LDO", 3.3).with_ig(Interpolator::Linear1d {
        x: vec![],
        fx: vec![],
    });
    assert!(net.add_component("BAT", empty, NodeOptions::new()).is_err());

    let short_row = SeriesLoss::voltage_drop(
        "D1",
        Interpolator::Linear2d {
            x: vec![0.1, 1.0],
            y: vec![5.0, 12.0],
            fxy: vec![vec![0.3, 0.5], vec![0.4]],
        },
    );
    assert!(net.add_component("BAT", short_row, NodeOptions::new()).is_err());

    assert_eq!(net.len(), 1);
}

// ── Properties ───────────────────────────────────────────────────

#[test]
fn test_power_conservation() {
    let net = mixed_network();
    let report = Analyzer::new(&net).solve().unwrap();

    for (id, node) in net.nodes() {
        if node.children.is_empty() {
            continue;
        }
        let name = net.node(id).unwrap().component.name();
        let row = report.row(name, None).unwrap();
        let delivered: f64 = node
            .children
            .iter()
            .map(|c| {
                let child = net.node(*c).unwrap().component.name();
                report.row(child, None).unwrap().power
            })
            .sum();
        assert_abs_diff_eq!(row.power, delivered + row.loss, epsilon = 1e-6);
    }
}

#[test]
fn test_solve_is_idempotent() {
    let net = mixed_network();
    let analyzer = Analyzer::new(&net);
    let first = analyzer.solve().unwrap();
    let second = analyzer.solve().unwrap();
    assert_eq!(first.rows, second.rows);
    assert_eq!(first.solutions, second.solutions);
}

#[test]
fn test_off_propagates_downstream() {
    let mut net = mixed_network();
    net.add_component(
        "SW",
        Load::current("BLEED", 0.01).as_loss(true),
        NodeOptions::new(),
    )
    .unwrap();
    net.set_phases([("on", 10.0), ("off", 10.0)]).unwrap();
    net.set_component_phases("SW", phase_active(&["on"])).unwrap();
    let report = Analyzer::new(&net).solve().unwrap();

    let sw = report.row("SW", Some("off")).unwrap();
    assert_eq!(sw.vout, Some(0.0));
    assert_eq!(sw.power, 0.0);
    assert_eq!(sw.loss, 0.0);
    let heater = report.row("HEATER", Some("off")).unwrap();
    assert_eq!((heater.power, heater.loss), (0.0, 0.0));
    let bleed = report.row("BLEED", Some("off")).unwrap();
    assert_eq!((bleed.power, bleed.loss, bleed.efficiency), (0.0, 0.0, 0.0));

    let bleed_on = report.row("BLEED", Some("on")).unwrap();
    assert_eq!(bleed_on.power, 0.0);
    assert!(bleed_on.loss > 0.0);
}

#[test]
fn test_iteration_limit_is_an_error() {
    let mut net = PowerNetwork::new("s1", Source::new("5V", 5.0), NodeOptions::new()).unwrap();
    net.add_component("5V", Load::power("LOAD", 0.5), NodeOptions::new())
        .unwrap();
    let err = Analyzer::new(&net)
        .with_config(SolveConfig::new().with_max_iterations(1))
        .solve()
        .unwrap_err();
    assert!(matches!(err, PowerTreeError::ConvergenceFailure { iterations: 1, .. }));
}

#[test]
fn test_polarity_inversion_is_unstable() {
    let mut net = PowerNetwork::new("neg", Source::new("NEG", -15.0), NodeOptions::new()).unwrap();
    net.add_component("NEG", SeriesLoss::resistive("R", 25.0), NodeOptions::new())
        .unwrap();
    net.add_component("R", Load::current("LOAD", 0.7), NodeOptions::new())
        .unwrap();
    let err = Analyzer::new(&net).solve().unwrap_err();
    assert!(matches!(err, PowerTreeError::UnstableSystem { ref component } if component == "R"));
}

// ── DSL ──────────────────────────────────────────────────────────

#[test]
fn test_netlist_to_report() {
    let report = solve_netlist(
        "\
.system Demo
# 12 V input, 5 V rail
SOURCE    BAT  vo=12
CONVERTER BUCK parent=BAT vo=5 eff=0.8 rail=5V
ILOAD     MCU  parent=5V ii=100m
.limits MCU pi=(0 400m)
",
    );
    assert_eq!(report.system, "Demo");
    let buck = report.row("BUCK", None).unwrap();
    assert_abs_diff_eq!(buck.iin.unwrap(), 0.0520833, epsilon = 1e-6);

    let mcu = report.row("MCU", None).unwrap();
    assert_eq!(mcu.rail_in.as_deref(), Some("5V"));
    assert!(mcu.warnings.contains(Metric::Pi));
    assert!(report.total(None).unwrap().flagged);
}

#[test]
fn test_netlist_with_table_and_phases() {
    let report = solve_netlist(
        "\
.system Sensor
.phases run=10 sleep=30
.table EFF io=(50m 200m) data=(0.8 0.9)

SOURCE    BAT  vo=3.7
CONVERTER BUCK parent=BAT vo=1.8 eff=EFF iq=10u
PLOAD     MCU  parent=BUCK pwr=180m pwrs=0
.phase MCU run=180m
",
    );
    let run = report.row("BUCK", Some("run")).unwrap();
    // 100 mA load, efficiency interpolated to 5/6
    assert_abs_diff_eq!(run.efficiency, 100.0 * (0.8 + 0.1 / 3.0), epsilon = 1e-6);
    let sleep = report.row("BUCK", Some("sleep")).unwrap();
    assert_abs_diff_eq!(sleep.iin.unwrap(), 10e-6, epsilon = 1e-12);

    let avg = report.average().unwrap();
    assert_eq!(avg.kind, RowKind::Average);
    let run_total = report.total(Some("run")).unwrap().power;
    let sleep_total = report.total(Some("sleep")).unwrap().power;
    assert_abs_diff_eq!(avg.power, (run_total + 3.0 * sleep_total) / 4.0, epsilon = 1e-12);
}

#[test]
fn test_netlist_errors() {
    let err = dsl::parse("FOO X vo=1\n").unwrap_err();
    assert!(matches!(err, PowerTreeError::UnknownComponentType { .. }));

    let ast = dsl::parse("ILOAD L parent=BAT ii=1\n");
    assert!(ast.is_err() || PowerNetwork::from_ast(ast.unwrap()).is_err());
}

// ── Battery life ─────────────────────────────────────────────────

struct LinearCell {
    nominal: f64,
    remaining: f64,
}

impl LinearCell {
    fn state(&self) -> BatteryState {
        BatteryState {
            capacity: self.remaining,
            voltage: 3.0 + 1.2 * self.remaining / self.nominal,
            resistance: 0.05,
        }
    }
}

impl Battery for LinearCell {
    fn probe(&mut self) -> BatteryState {
        self.state()
    }

    fn deplete(&mut self, dt: f64, current: f64) -> BatteryState {
        self.remaining -= current * dt / 3600.0;
        self.state()
    }
}

#[test]
fn test_battery_life_ends_at_cutoff() {
    let mut net = PowerNetwork::new("cell", Source::new("CELL", 4.2), NodeOptions::new()).unwrap();
    net.add_component("CELL", Converter::new("BUCK", 1.8, 0.9), NodeOptions::new())
        .unwrap();
    net.add_component("BUCK", Load::power("MCU", 0.5), NodeOptions::new())
        .unwrap();
    net.set_phases([("active", 60.0), ("idle", 240.0)]).unwrap();
    net.set_component_phases("BUCK", phase_active(&["active"])).unwrap();

    let mut cell = LinearCell {
        nominal: 0.1,
        remaining: 0.1,
    };
    let samples = battery_life(&net, "CELL", 3.3, &mut cell, &SolveConfig::new()).unwrap();

    assert!(samples.len() > 2);
    assert!(samples.windows(2).all(|w| w[1].time > w[0].time));
    assert!(samples.iter().all(|s| s.voltage > 3.3));
    // the next step would cross the cutoff
    assert!(cell.state().voltage <= 3.3);
    assert_eq!(
        net.component("CELL").unwrap().kind(),
        ComponentKind::Source
    );
}
