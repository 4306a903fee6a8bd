use nalgebra::Cholesky;

use crate::linalg::{dtype, MatrixX, VectorX};

use super::NoiseModel;

/// Gaussian noise model parameterized by its square-root information
/// matrix, so whitening is a single matrix-vector product rather than a
/// solve. Mirrors the teacher's `GaussianNoise`, generalized to dynamic
/// dimension since residual sizes here are only known at factor
/// construction time.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    sqrt_inf: MatrixX,
}

impl GaussianNoise {
    pub fn from_sqrt_inf(sqrt_inf: MatrixX) -> Self {
        Self { sqrt_inf }
    }

    pub fn identity(dim: usize) -> Self {
        Self {
            sqrt_inf: MatrixX::identity(dim, dim),
        }
    }

    pub fn from_scalar_sigma(dim: usize, sigma: dtype) -> Self {
        Self {
            sqrt_inf: MatrixX::identity(dim, dim) * (1.0 / sigma),
        }
    }

    pub fn from_diag_sigmas(sigmas: &[dtype]) -> Self {
        let dim = sigmas.len();
        let mut sqrt_inf = MatrixX::zeros(dim, dim);
        for (i, s) in sigmas.iter().enumerate() {
            sqrt_inf[(i, i)] = 1.0 / s;
        }
        Self { sqrt_inf }
    }

    /// Builds the model from a dense covariance matrix via Cholesky of its
    /// inverse, as the teacher's `from_matrix_cov` does.
    pub fn from_covariance(cov: &MatrixX) -> Self {
        let inf = cov
            .clone()
            .try_inverse()
            .expect("covariance matrix is not invertible");
        let chol = Cholesky::new(inf).expect("information matrix is not positive definite");
        Self {
            sqrt_inf: chol.l().transpose(),
        }
    }
}

impl NoiseModel for GaussianNoise {
    fn dim(&self) -> usize {
        self.sqrt_inf.nrows()
    }

    fn whiten_vec(&self, v: &VectorX) -> VectorX {
        &self.sqrt_inf * v
    }

    fn whiten_mat(&self, m: &MatrixX) -> MatrixX {
        &self.sqrt_inf * m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_whitening_is_noop() {
        let noise = GaussianNoise::identity(3);
        let v = VectorX::from_column_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(noise.whiten_vec(&v), v);
    }

    #[test]
    fn scalar_sigma_scales_uniformly() {
        let noise = GaussianNoise::from_scalar_sigma(2, 2.0);
        let v = VectorX::from_column_slice(&[2.0, 4.0]);
        let w = noise.whiten_vec(&v);
        assert!((w - VectorX::from_column_slice(&[1.0, 2.0])).norm() < 1e-12);
    }
}
