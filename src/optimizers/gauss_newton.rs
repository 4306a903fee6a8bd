use crate::containers::{Graph, Order, Values};
use crate::error::Result;
use crate::linear::{CholeskySolver, LinearSolver};

use super::traits::{OptParams, Optimizer};

/// Plain Gauss-Newton: linearize, solve the normal equations, take the
/// full step.
#[derive(Debug)]
pub struct GaussNewton<S: LinearSolver = CholeskySolver> {
    solver: S,
    params: OptParams,
}

impl Default for GaussNewton {
    fn default() -> Self {
        Self {
            solver: CholeskySolver,
            params: OptParams::default(),
        }
    }
}

impl<S: LinearSolver> GaussNewton<S> {
    pub fn with_solver(solver: S) -> Self {
        Self {
            solver,
            params: OptParams::default(),
        }
    }

    pub fn with_params(mut self, params: OptParams) -> Self {
        self.params = params;
        self
    }
}

impl<S: LinearSolver> Optimizer for GaussNewton<S> {
    fn params(&self) -> &OptParams {
        &self.params
    }

    fn step(&mut self, graph: &Graph, values: &mut Values) -> Result<()> {
        let order = Order::from_values(values);
        let linear = graph.linearize(values, &order);
        let (b, a) = linear.residual_jacobian(&order);
        let dx = self.solver.solve(&a, &b)?;
        values.oplus_mut(&order, &dx);
        Ok(())
    }
}
