use std::time::{Duration, Instant};

use crate::containers::{Graph, Values};
use crate::error::{Error, Result};
use crate::linalg::dtype;

/// Stopping criteria shared by every optimizer, mirroring the teacher's
/// `OptParams`, plus a wall-clock budget (§7's "solver non-convergence
/// is accepted; iterates are written back regardless, wall-bounded").
#[derive(Debug, Clone, Copy)]
pub struct OptParams {
    pub max_iterations: usize,
    pub error_tol: dtype,
    pub error_tol_relative: dtype,
    pub error_tol_absolute: dtype,
    /// Hard wall-clock budget for a whole [`Optimizer::optimize`] call.
    /// `None` means unbounded (iteration/tolerance criteria only).
    /// When set, running out of time returns `Ok(())` with whatever the
    /// last completed step produced rather than an error — a timed-out
    /// solve is not a failed one.
    pub max_solver_time: Option<Duration>,
}

impl Default for OptParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            error_tol: 0.0,
            error_tol_relative: 1e-6,
            error_tol_absolute: 1e-6,
            max_solver_time: None,
        }
    }
}

/// A nonlinear least-squares optimizer over a [`Graph`]/[`Values`] pair.
/// Implementors provide one linearize-and-solve [`Optimizer::step`]; the
/// default [`Optimizer::optimize`] loop (shared by every implementation,
/// exactly as the teacher's does) applies the stopping criteria and logs
/// progress at `info` level.
pub trait Optimizer {
    fn params(&self) -> &OptParams;

    fn init(&mut self, _graph: &Graph, _values: &Values) {}

    /// Performs one iteration, mutating `values` in place.
    fn step(&mut self, graph: &Graph, values: &mut Values) -> Result<()>;

    fn error(&self, graph: &Graph, values: &Values) -> dtype {
        graph.error(values)
    }

    fn optimize(&mut self, graph: &Graph, values: &mut Values) -> Result<()> {
        self.init(graph, values);
        let mut prev_error = self.error(graph, values);
        log::info!("optimize: start error {prev_error:.6}");
        let start = Instant::now();

        for i in 0..self.params().max_iterations {
            if let Some(budget) = self.params().max_solver_time {
                if start.elapsed() >= budget {
                    log::info!("optimize: wall budget exhausted after {i} iterations, accepting iterate");
                    return Ok(());
                }
            }

            self.step(graph, values)?;
            let error = self.error(graph, values);
            log::info!("optimize: iter {i} error {error:.6}");

            if error < self.params().error_tol {
                return Ok(());
            }
            let decrease = prev_error - error;
            if decrease.abs() < self.params().error_tol_absolute {
                return Ok(());
            }
            if prev_error.abs() > 0.0 && (decrease / prev_error).abs() < self.params().error_tol_relative {
                return Ok(());
            }
            prev_error = error;
        }
        if self.params().max_solver_time.is_some() {
            Ok(())
        } else {
            Err(Error::MaxIterations)
        }
    }
}
