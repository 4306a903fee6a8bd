use nalgebra::linalg::Cholesky;

use crate::containers::{Graph, Order, Values};
use crate::error::{Error, Result};
use crate::linalg::{dtype, VectorX};

use super::traits::{OptParams, Optimizer};

#[derive(Debug, Clone, Copy)]
pub struct DoglegParams {
    pub radius_init: dtype,
    pub radius_min: dtype,
    pub radius_max: dtype,
}

impl Default for DoglegParams {
    fn default() -> Self {
        Self {
            radius_init: 1.0,
            radius_min: 1e-9,
            radius_max: 1e3,
        }
    }
}

/// Powell's dogleg trust-region method over the dense normal equations
/// produced from a full (non-Schur-reduced) linearization of the graph.
/// Added because the sliding-window backend and the inertial initializer
/// both call for "dogleg on a reduced system" and the teacher ships only
/// Gauss-Newton and Levenberg-Marquardt; built the same way those two are,
/// as an [`Optimizer`] wrapping a linearize-and-solve step.
#[derive(Debug)]
pub struct Dogleg {
    radius: dtype,
    dogleg_params: DoglegParams,
    params: OptParams,
}

impl Default for Dogleg {
    fn default() -> Self {
        let dogleg_params = DoglegParams::default();
        Self {
            radius: dogleg_params.radius_init,
            dogleg_params,
            params: OptParams::default(),
        }
    }
}

impl Dogleg {
    pub fn with_dogleg_params(dogleg_params: DoglegParams) -> Self {
        Self {
            radius: dogleg_params.radius_init,
            dogleg_params,
            params: OptParams::default(),
        }
    }

    pub fn with_params(mut self, params: OptParams) -> Self {
        self.params = params;
        self
    }
}

impl Optimizer for Dogleg {
    fn params(&self) -> &OptParams {
        &self.params
    }

    fn step(&mut self, graph: &Graph, values: &mut Values) -> Result<()> {
        let order = Order::from_values(values);
        let linear = graph.linearize(values, &order);
        let (b, a) = linear.residual_jacobian(&order);

        let ata = a.transpose() * &a;
        let g = a.transpose() * &b; // gradient of 0.5||Ax-b||^2 at x=0 is -g; descent direction is g

        let dx_gn = Cholesky::new(ata.clone()).map(|chol| chol.solve(&g));
        let ag = &a * &g;
        let denom = ag.norm_squared();
        let dx_sd = if denom > 1e-15 {
            (g.norm_squared() / denom) * &g
        } else {
            VectorX::zeros(g.len())
        };

        let current_error = self.error(graph, values);

        loop {
            if self.radius < self.dogleg_params.radius_min {
                return Err(Error::SolverDiverged);
            }

            let step = dogleg_step(dx_gn.as_ref(), &dx_sd, self.radius);
            let predicted_reduction = predicted_reduction(&ata, &g, &step);

            let mut trial = values.clone();
            trial.oplus_mut(&order, &step);
            let trial_error = self.error(graph, &trial);
            let actual_reduction = current_error - trial_error;

            let rho = if predicted_reduction.abs() > 1e-15 {
                actual_reduction / predicted_reduction
            } else {
                -1.0
            };

            if rho > 0.0 {
                *values = trial;
                if rho > 0.75 && step.norm() > 0.9 * self.radius {
                    self.radius = (2.0 * self.radius).min(self.dogleg_params.radius_max);
                } else if rho < 0.25 {
                    self.radius *= 0.25;
                }
                return Ok(());
            }

            self.radius *= 0.25;
        }
    }
}

/// Combines the Gauss-Newton and steepest-descent directions per Powell's
/// dogleg construction, clipped to the current trust-region radius.
fn dogleg_step(dx_gn: Option<&VectorX>, dx_sd: &VectorX, radius: dtype) -> VectorX {
    if let Some(dx_gn) = dx_gn {
        if dx_gn.norm() <= radius {
            return dx_gn.clone();
        }
    }

    if dx_sd.norm() >= radius {
        return dx_sd * (radius / dx_sd.norm());
    }

    match dx_gn {
        Some(dx_gn) => {
            let diff = dx_gn - dx_sd;
            let a = diff.norm_squared();
            let b_coef = 2.0 * dx_sd.dot(&diff);
            let c = dx_sd.norm_squared() - radius * radius;
            let disc = (b_coef * b_coef - 4.0 * a * c).max(0.0).sqrt();
            let tau = if a > 1e-15 {
                (-b_coef + disc) / (2.0 * a)
            } else {
                0.0
            };
            dx_sd + tau * diff
        }
        None => dx_sd * (radius / dx_sd.norm().max(1e-12)),
    }
}

fn predicted_reduction(ata: &crate::linalg::MatrixX, g: &VectorX, step: &VectorX) -> dtype {
    g.dot(step) - 0.5 * step.dot(&(ata * step))
}
