use crate::linalg::{MatrixX, VectorX};

use super::NoiseModel;

/// No-op noise model: residual passes through unwhitened. Used as the
/// default when a factor carries its own weighting (e.g. inside the
/// preintegration covariance) or genuinely has unit noise.
#[derive(Debug, Clone)]
pub struct UnitNoise {
    dim: usize,
}

impl UnitNoise {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl NoiseModel for UnitNoise {
    fn dim(&self) -> usize {
        self.dim
    }

    fn whiten_vec(&self, v: &VectorX) -> VectorX {
        v.clone()
    }

    fn whiten_mat(&self, m: &MatrixX) -> MatrixX {
        m.clone()
    }
}
