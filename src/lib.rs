//! # Powertree Core
//!
//! A steady-state loss estimator for DC power trees.
//!
//! This library provides:
//! - A line-oriented DSL for describing power trees
//! - Behavioral models for sources, converters, regulators, switches,
//!   rectifiers, series losses and loads
//! - A relaxation solver driving the tree to its steady state, per load phase
//! - Per-component, per-subsystem and system-wide power, loss, efficiency and
//!   thermal results with limit warnings
//! - Rail reports and battery-life estimation
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dsl`] - Parser for the netlist language
//! - [`network`] - Power-tree graph representation and validation
//! - [`components`] - Component models and the physics contract
//! - [`solver`] - Relaxation, result aggregation and battery life
//! - [`report`] - CSV output
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! powertree board.ptree --energy > results.csv
//! ```
//!
//! ### Library
//!
//! ```
//! use powertree_core::{Analyzer, Converter, Load, NodeOptions, PowerNetwork, Source};
//!
//! let mut net = PowerNetwork::new("board", Source::new("BAT", 12.0), NodeOptions::new()).unwrap();
//! net.add_component("BAT", Converter::new("BUCK", 5.0, 0.8), NodeOptions::new().with_rail("5V"))
//!     .unwrap();
//! net.add_component("5V", Load::current("MCU", 0.1), NodeOptions::new()).unwrap();
//!
//! let report = Analyzer::new(&net).solve().unwrap();
//! let buck = report.row("BUCK", None).unwrap();
//! assert!((buck.efficiency - 80.0).abs() < 1e-6);
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmPowerTree } from 'powertree_core';
//!
//! const tree = new WasmPowerTree(netlist);
//! const csv = tree.solve_csv();
//! ```
//!
//! ## Solution Method
//!
//! Every component implements the same contract: an output voltage as a
//! function of its input voltage and load current, and an input current as a
//! function of its output voltage and load current. The solver alternates a
//! forward sweep of voltages from the sources down and a backward sweep of
//! currents from the loads up until both settle within tolerance. With load
//! phases the tree is solved once per phase and the results are weighted by
//! phase duration.

pub mod components;
pub mod dsl;
pub mod error;
pub mod network;
pub mod report;
pub mod solver;

// Re-export main types for convenience
pub use components::{
    Component, ComponentKind, Converter, LinReg, Limits, Load, Metric, PMux, PSwitch,
    PhaseConfig, PowerComponent, Rectifier, SeriesLoss, Source, Warnings,
};
pub use error::{PowerTreeError, Result};
pub use network::{NodeId, NodeOptions, PowerNetwork};
pub use solver::{
    battery_life, Analyzer, Battery, BatterySample, BatteryState, RailRow, Report, ResultRow,
    RowKind, Solution, SolveConfig, DEFAULT_AMBIENT, DEFAULT_ITOL, DEFAULT_MAX_ITERATIONS,
    DEFAULT_VTOL,
};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmPowerTree;
