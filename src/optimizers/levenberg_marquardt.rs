use nalgebra::linalg::Cholesky;

use crate::containers::{Graph, Order, Values};
use crate::error::{Error, Result};
use crate::linalg::{dtype, MatrixX};

use super::traits::{OptParams, Optimizer};

#[derive(Debug, Clone, Copy)]
pub struct LevenParams {
    pub lambda_init: dtype,
    pub lambda_min: dtype,
    pub lambda_max: dtype,
    pub lambda_factor: dtype,
    pub diagonal_damping: bool,
}

impl Default for LevenParams {
    fn default() -> Self {
        Self {
            lambda_init: 1e-5,
            lambda_min: 0.0,
            lambda_max: 1e5,
            lambda_factor: 10.0,
            diagonal_damping: true,
        }
    }
}

/// Levenberg-Marquardt: Gauss-Newton with a growing diagonal damping term,
/// accepted only once it actually decreases the error.
#[derive(Debug)]
pub struct LevenMarquardt {
    lambda: dtype,
    leven_params: LevenParams,
    params: OptParams,
}

impl Default for LevenMarquardt {
    fn default() -> Self {
        let leven_params = LevenParams::default();
        Self {
            lambda: leven_params.lambda_init,
            leven_params,
            params: OptParams::default(),
        }
    }
}

impl LevenMarquardt {
    pub fn with_leven_params(leven_params: LevenParams) -> Self {
        Self {
            lambda: leven_params.lambda_init,
            leven_params,
            params: OptParams::default(),
        }
    }
}

impl Optimizer for LevenMarquardt {
    fn params(&self) -> &OptParams {
        &self.params
    }

    fn step(&mut self, graph: &Graph, values: &mut Values) -> Result<()> {
        let order = Order::from_values(values);
        let linear = graph.linearize(values, &order);
        let (b, a) = linear.residual_jacobian(&order);

        let ata = a.transpose() * &a;
        let atb = a.transpose() * &b;
        let current_error = self.error(graph, values);

        loop {
            if self.lambda > self.leven_params.lambda_max {
                return Err(Error::SolverDiverged);
            }

            let mut damped = ata.clone();
            for i in 0..damped.nrows() {
                let diag = if self.leven_params.diagonal_damping {
                    ata[(i, i)].max(1e-12)
                } else {
                    1.0
                };
                damped[(i, i)] += self.lambda * diag;
            }

            let Some(dx) = solve(&damped, &atb) else {
                self.lambda *= self.leven_params.lambda_factor;
                continue;
            };

            let mut trial = values.clone();
            trial.oplus_mut(&order, &dx);
            let trial_error = self.error(graph, &trial);

            if trial_error < current_error {
                *values = trial;
                self.lambda = (self.lambda / self.leven_params.lambda_factor)
                    .max(self.leven_params.lambda_min);
                return Ok(());
            }

            self.lambda *= self.leven_params.lambda_factor;
        }
    }
}

fn solve(a: &MatrixX, b: &crate::linalg::VectorX) -> Option<crate::linalg::VectorX> {
    Cholesky::new(a.clone()).map(|chol| chol.solve(b))
}
