//! Steady-state relaxation solver.
//!
//! This module provides the numerical engine of the power-tree analysis.
//!
//! ## Relaxation
//!
//! The network is driven to a fixed point by alternating two sweeps:
//!
//! ```text
//! forward  (topological order):  v[n], state[n] = f(v[parents], state[parents], i_out[n])
//! backward (reverse order):      i[n]           = g(v[parents], state[n], v[n], i_out[n])
//! ```
//!
//! where `i_out[n]` is the current drawn by the children attributed to `n`.
//! A child behind the power multiplexer is attributed only to the parent
//! the multiplexer selected in the forward sweep. Iteration stops when
//! every voltage and current moved less than its tolerance, and fails with
//! [`ConvergenceFailure`](crate::error::PowerTreeError::ConvergenceFailure)
//! when the iteration limit is reached first.
//!
//! The [`Analyzer`] runs the relaxation per load phase and folds the
//! solutions into report rows; [`battery_life`] repeats it against a
//! depleting battery.

mod aggregate;
mod analyzer;
mod battery;
mod relax;
mod state;

pub use aggregate::{RailRow, Report, ResultRow, RowKind};
pub use analyzer::{Analyzer, SolveConfig};
pub use battery::{battery_life, Battery, BatterySample, BatteryState};
pub use relax::{RelaxStatus, Relaxation};
pub use state::{Solution, SolverState};

/// Default relative voltage tolerance.
pub const DEFAULT_VTOL: f64 = 1e-6;

/// Default relative current tolerance.
pub const DEFAULT_ITOL: f64 = 1e-6;

/// Default iteration limit per phase.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Default ambient temperature (°C).
pub const DEFAULT_AMBIENT: f64 = 25.0;

/// Absolute tolerance added to the relative convergence test.
pub const ABS_TOL: f64 = 1e-9;
