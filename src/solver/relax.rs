//! Forward/backward relaxation to a steady state.

use crate::components::{PhaseCtx, PowerComponent};
use crate::error::{PowerTreeError, Result};
use crate::network::PowerNetwork;

use super::analyzer::SolveConfig;
use super::state::{Solution, SolverState};
use super::ABS_TOL;

/// Progress of a relaxation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxStatus {
    /// Vectors hold first guesses.
    Initializing,
    /// Sweeping.
    Iterating,
    /// Tolerances met.
    Converged,
    /// Iteration limit reached.
    Exhausted,
}

/// Fixed-point iteration over one phase of a network.
pub struct Relaxation<'a> {
    net: &'a PowerNetwork,
    phase: Option<&'a str>,
    vtol: f64,
    itol: f64,
    max_iterations: usize,
    status: RelaxStatus,
    state: SolverState,
}

impl<'a> Relaxation<'a> {
    /// Prepare a run with initial guesses for `phase`.
    pub fn new(net: &'a PowerNetwork, phase: Option<&'a str>, config: &SolveConfig) -> Self {
        Self {
            net,
            phase,
            vtol: config.vtol,
            itol: config.itol,
            max_iterations: config.max_iterations,
            status: RelaxStatus::Initializing,
            state: SolverState::initial(net, phase),
        }
    }

    pub fn status(&self) -> RelaxStatus {
        self.status
    }

    /// Iterate until converged.
    ///
    /// Returns the converged solution; the iteration limit and an unstable
    /// component are errors.
    pub fn run(mut self) -> Result<Solution> {
        self.status = RelaxStatus::Iterating;
        for iteration in 1..=self.max_iterations {
            let next = self.sweep()?;
            let converged = close(&self.state.v, &next.v, self.vtol)
                && close(&self.state.i, &next.i, self.itol);
            self.state = next;
            if converged {
                self.status = RelaxStatus::Converged;
                tracing::debug!(phase = self.phase, iterations = iteration, "converged");
                return Ok(Solution {
                    phase: self.phase.map(str::to_string),
                    iterations: iteration,
                    state: self.state,
                });
            }
        }
        self.status = RelaxStatus::Exhausted;
        tracing::error!(
            phase = self.phase,
            iterations = self.max_iterations,
            "steady state not reached"
        );
        Err(PowerTreeError::convergence_failure(self.max_iterations, self.phase))
    }

    /// One forward and one backward sweep.
    fn sweep(&self) -> Result<SolverState> {
        let net = self.net;
        let meta = net.metadata();
        let mut next = self.state.clone();

        // forward: parents are already updated, children still hold the
        // previous currents
        for &id in net.order() {
            let Some(node) = net.node(id) else { continue };
            let ctx = PhaseCtx::new(self.phase, meta.phase_config(id));
            let inputs = next.inputs(net, id);
            let i_out = next.attributed_current(net, id);
            let (v, state) = node
                .component
                .solve_output_voltage(&inputs, self.state.i[id.0], i_out, &ctx)
                .inspect_err(|e| {
                    tracing::error!(component = node.component.name(), error = %e, "relaxation aborted")
                })?;
            next.v[id.0] = v;
            next.states[id.0] = state;
        }

        // backward: children first, with the new voltages and selections
        for &id in net.order().iter().rev() {
            let Some(node) = net.node(id) else { continue };
            let ctx = PhaseCtx::new(self.phase, meta.phase_config(id));
            let inputs = next.inputs(net, id);
            let i_out = next.attributed_current(net, id);
            next.i[id.0] = node.component.solve_input_current(
                &inputs,
                &next.states[id.0],
                next.v[id.0],
                i_out,
                &ctx,
            );
        }

        Ok(next)
    }
}

/// `|new - old| <= ABS_TOL + rtol * |old|` element-wise.
fn close(old: &[f64], new: &[f64], rtol: f64) -> bool {
    old.iter()
        .zip(new)
        .all(|(a, b)| (b - a).abs() <= ABS_TOL + rtol * a.abs())
}
