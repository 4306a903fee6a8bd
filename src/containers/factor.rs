use crate::linalg::MatrixBlock;
use crate::linear::LinearFactor;
use crate::noise::{GaussianNoise, NoiseModel, UnitNoise};
use crate::residuals::Residual;
use crate::robust::{RobustCost, L2};
use crate::variables::VariableSafe;

use super::key::Key;
use super::order::Order;
use super::values::Values;

/// A single term in the factor graph: a residual tied to its noise model
/// and robust kernel. Type-erased so a [`Graph`](super::Graph) can hold
/// arbitrarily many distinct residual types. Mirrors the teacher's
/// `Factor`.
#[derive(Debug, Clone)]
pub struct Factor {
    keys: Vec<Key>,
    residual: Box<dyn Residual>,
    noise: Box<dyn NoiseModel>,
    robust: Box<dyn RobustCost>,
}

impl Factor {
    pub fn new_base(residual: Box<dyn Residual>) -> Self {
        let dim = residual.dim_out();
        Self {
            keys: residual.keys().to_vec(),
            residual,
            noise: Box::new(UnitNoise::new(dim)),
            robust: Box::new(L2),
        }
    }

    pub fn new_noise(residual: Box<dyn Residual>, noise: Box<dyn NoiseModel>) -> Self {
        Self {
            keys: residual.keys().to_vec(),
            residual,
            noise,
            robust: Box::new(L2),
        }
    }

    pub fn new_full(
        residual: Box<dyn Residual>,
        noise: Box<dyn NoiseModel>,
        robust: Box<dyn RobustCost>,
    ) -> Self {
        Self {
            keys: residual.keys().to_vec(),
            residual,
            noise,
            robust,
        }
    }

    pub fn gaussian(residual: Box<dyn Residual>, noise: GaussianNoise) -> Self {
        Self::new_noise(residual, Box::new(noise))
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn dim_out(&self) -> usize {
        self.residual.dim_out()
    }

    fn gather(&self, values: &Values) -> Vec<Box<dyn VariableSafe>> {
        self.keys
            .iter()
            .map(|k| {
                values
                    .get(k)
                    .unwrap_or_else(|| panic!("factor references missing key {k}"))
                    .clone_box()
            })
            .collect()
    }

    /// Whitened, robust-weighted cost contributed by this factor at the
    /// current linearization point.
    pub fn error(&self, values: &Values) -> crate::linalg::dtype {
        let vars = self.gather(values);
        let r = self.residual.residual(&vars);
        let wr = self.noise.whiten_vec(&r);
        let d2 = wr.norm_squared();
        self.robust.loss(d2)
    }

    /// Linearizes the factor about `values`, returning the (robust
    /// down-weighted) local linear system `A dx approx b`.
    pub fn linearize(&self, values: &Values, order: &Order) -> LinearFactor {
        let vars = self.gather(values);
        let (r0, jac) = crate::linalg::numerical_jacobian(
            |vars| self.residual.residual(vars),
            &vars,
        );

        let wr = self.noise.whiten_vec(&r0);
        let wj = self.noise.whiten_mat(&jac);

        let d2 = wr.norm_squared();
        let sqrt_w = self.robust.weight(d2).max(0.0).sqrt();

        let idx: Vec<usize> = self
            .keys
            .iter()
            .map(|k| order.get(k).expect("key missing from order").idx)
            .collect();

        let a = MatrixBlock::new(wj * sqrt_w, idx);
        let b = -(wr * sqrt_w);

        LinearFactor::new(self.keys.clone(), a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::key;
    use crate::residuals::PriorResidual;
    use crate::variables::{Variable, SE3};

    #[test]
    fn error_is_zero_at_prior_value() {
        let pose = SE3::identity();
        let mut values = Values::new();
        values.insert(key::pose(0), pose);

        let factor = Factor::new_base(Box::new(PriorResidual::new(key::pose(0), pose)));
        assert!(factor.error(&values) < 1e-20);
    }

    #[test]
    fn linearize_matches_numerical_gradient_direction() {
        let pose = SE3::identity();
        let perturbed = pose.oplus(&crate::linalg::VectorX::from_column_slice(&[
            0.1, 0.0, 0.0, 0.0, 0.0, 0.0,
        ]));
        let mut values = Values::new();
        values.insert(key::pose(0), perturbed);

        let factor = Factor::new_base(Box::new(PriorResidual::new(key::pose(0), pose)));
        let order = Order::from_values(&values);
        let lin = factor.linearize(&values, &order);
        assert_eq!(lin.a.mat().nrows(), 6);
    }
}
