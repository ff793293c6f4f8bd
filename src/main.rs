//! Powertree - DC power-tree loss estimator
//!
//! Solves a power-tree netlist to steady state and prints the result table
//! as CSV.
//!
//! # Usage
//!
//! ```bash
//! powertree board.ptree --energy --tag Revision=B > results.csv
//! RUST_LOG=debug powertree board.ptree --phase sleep --rails
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use powertree_core::{
    dsl,
    error::{PowerTreeError, Result},
    report, Analyzer, PowerNetwork, SolveConfig, DEFAULT_AMBIENT, DEFAULT_ITOL,
    DEFAULT_MAX_ITERATIONS, DEFAULT_VTOL,
};
use tracing_subscriber::EnvFilter;

/// DC power-tree loss estimator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the power-tree netlist
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// Solve only this load phase
    #[arg(short, long)]
    phase: Option<String>,

    /// Relative voltage tolerance
    #[arg(long, default_value_t = DEFAULT_VTOL)]
    vtol: f64,

    /// Relative current tolerance
    #[arg(long, default_value_t = DEFAULT_ITOL)]
    itol: f64,

    /// Iteration limit per phase
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Ambient temperature in °C
    #[arg(short, long, default_value_t = DEFAULT_AMBIENT)]
    ambient: f64,

    /// Add a 24 h energy column
    #[arg(short, long)]
    energy: bool,

    /// Print the rail report instead of the component table
    #[arg(short, long)]
    rails: bool,

    /// Extra column copied onto every row (repeatable)
    #[arg(short, long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    tags: Vec<(String, String)>,
}

fn parse_tag(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

fn run(args: Args) -> Result<()> {
    // Parse and build the network
    let ast = dsl::parse_file(&args.netlist)?;
    let network = PowerNetwork::from_ast(ast)?;

    let mut config = SolveConfig::new()
        .with_vtol(args.vtol)
        .with_itol(args.itol)
        .with_max_iterations(args.max_iterations)
        .with_ambient(args.ambient)
        .with_energy(args.energy);
    if let Some(phase) = args.phase {
        config = config.with_phase(phase);
    }
    for (key, value) in args.tags {
        config = config.with_tag(key, value);
    }
    let analyzer = Analyzer::new(&network).with_config(config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.rails {
        let rails = analyzer.rail_report()?;
        if rails.is_empty() {
            tracing::warn!("no rails defined");
        }
        report::write_rails_csv(&rails, &mut out)?;
    } else {
        let results = analyzer.solve()?;
        report::write_results_csv(&results, &mut out)?;
    }
    out.flush().map_err(PowerTreeError::from)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
