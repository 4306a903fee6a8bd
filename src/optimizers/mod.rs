//! Iterative nonlinear least-squares solvers over a [`crate::containers::Graph`].
//!
//! All three share the [`Optimizer`] trait's default `optimize` loop
//! (linearize, solve, check stopping criteria, repeat) and differ only in
//! how they turn one linearization into a step: [`GaussNewton`] takes the
//! full Gauss-Newton step, [`LevenMarquardt`] damps it until it actually
//! reduces the error, and [`Dogleg`] blends it with steepest descent
//! inside a trust region. The backend and initializer both use `Dogleg`.

mod dogleg;
mod gauss_newton;
mod levenberg_marquardt;
mod traits;

pub use dogleg::{Dogleg, DoglegParams};
pub use gauss_newton::GaussNewton;
pub use levenberg_marquardt::{LevenMarquardt, LevenParams};
pub use traits::{OptParams, Optimizer};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{key, Factor, Graph, Values};
    use crate::noise::GaussianNoise;
    use crate::residuals::PriorResidual;
    use crate::variables::{Variable, VectorVar3};

    #[test]
    fn gauss_newton_converges_to_prior() {
        let target = VectorVar3::new(nalgebra::Vector3::new(1.0, 2.0, 3.0));
        let mut values = Values::new();
        values.insert(key::landmark(0), VectorVar3::identity());

        let mut graph = Graph::new();
        graph.add_factor(Factor::gaussian(
            Box::new(PriorResidual::new(key::landmark(0), target)),
            GaussianNoise::identity(3),
        ));

        let mut opt = GaussNewton::default();
        opt.optimize(&graph, &mut values).unwrap();

        let result = values.get_cast::<VectorVar3>(&key::landmark(0)).unwrap();
        assert!((result.0 - target.0).norm() < 1e-6);
    }

    #[test]
    fn dogleg_converges_to_prior() {
        let target = VectorVar3::new(nalgebra::Vector3::new(-1.0, 0.5, 2.0));
        let mut values = Values::new();
        values.insert(key::landmark(0), VectorVar3::identity());

        let mut graph = Graph::new();
        graph.add_factor(Factor::gaussian(
            Box::new(PriorResidual::new(key::landmark(0), target)),
            GaussianNoise::identity(3),
        ));

        let mut opt = Dogleg::default();
        opt.optimize(&graph, &mut values).unwrap();

        let result = values.get_cast::<VectorVar3>(&key::landmark(0)).unwrap();
        assert!((result.0 - target.0).norm() < 1e-5);
    }
}
