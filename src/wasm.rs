//! WASM bindings for Powertree Core.
//!
//! This module provides JavaScript-friendly bindings for solving power trees
//! in the browser.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmPowerTree } from 'powertree_core';
//!
//! await init();
//!
//! const netlist = `
//!   .system Sensor
//!   SOURCE BAT vo=3.7 rs=0.1
//!   CONVERTER BUCK parent=BAT vo=1.8 eff=0.9 rail=1V8
//!   PLOAD MCU parent=1V8 pwr=20m
//! `;
//!
//! const tree = new WasmPowerTree(netlist);
//! console.log(tree.solve_csv());
//! ```

use wasm_bindgen::prelude::*;

use crate::dsl;
use crate::error::PowerTreeError;
use crate::network::PowerNetwork;
use crate::report;
use crate::solver::{Analyzer, SolveConfig};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_err(e: PowerTreeError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// WASM-compatible power-tree estimator.
#[wasm_bindgen]
pub struct WasmPowerTree {
    network: PowerNetwork,
}

#[wasm_bindgen]
impl WasmPowerTree {
    /// Build a power tree from a netlist string.
    ///
    /// # Returns
    /// A new `WasmPowerTree` or an error if the netlist is invalid.
    #[wasm_bindgen(constructor)]
    pub fn new(netlist: &str) -> Result<WasmPowerTree, JsValue> {
        let ast = dsl::parse(netlist).map_err(js_err)?;
        let network = PowerNetwork::from_ast(ast).map_err(js_err)?;
        crate::network::validate_network(&network).map_err(js_err)?;
        Ok(WasmPowerTree { network })
    }

    /// Solve all phases, or only `phase`, and return the result table as CSV.
    #[wasm_bindgen]
    pub fn solve_csv(&self, phase: Option<String>) -> Result<String, JsValue> {
        let report = Analyzer::new(&self.network)
            .with_config(config(phase))
            .solve()
            .map_err(js_err)?;
        let mut buf = Vec::new();
        report::write_results_csv(&report, &mut buf).map_err(js_err)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Solve and return the rail report as CSV.
    #[wasm_bindgen]
    pub fn rails_csv(&self, phase: Option<String>) -> Result<String, JsValue> {
        let rails = Analyzer::new(&self.network)
            .with_config(config(phase))
            .rail_report()
            .map_err(js_err)?;
        let mut buf = Vec::new();
        report::write_rails_csv(&rails, &mut buf).map_err(js_err)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// System name.
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.network.name().to_string()
    }

    /// Number of components.
    #[wasm_bindgen(getter)]
    pub fn len(&self) -> usize {
        self.network.len()
    }
}

fn config(phase: Option<String>) -> SolveConfig {
    let config = SolveConfig::new();
    match phase {
        Some(p) if !p.is_empty() => config.with_phase(p),
        _ => config,
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
