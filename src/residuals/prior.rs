use std::marker::PhantomData;

use crate::containers::Key;
use crate::linalg::VectorX;
use crate::variables::{Variable, VariableSafe};

use super::traits::Residual;

/// A diagonal Gaussian prior pulling one variable towards a fixed value.
/// Used directly for pose/rotation/translation priors (§4.3) and, when
/// weighted with a near-zero-information noise model, for the
/// loose gravity-rotation priors the inertial initializer attaches to
/// bias and velocity.
#[derive(Debug, Clone)]
pub struct PriorResidual<V: Variable + VariableSafe> {
    key: Key,
    prior: V,
    _marker: PhantomData<V>,
}

impl<V: Variable + VariableSafe> PriorResidual<V> {
    pub fn new(key: Key, prior: V) -> Self {
        Self {
            key,
            prior,
            _marker: PhantomData,
        }
    }
}

impl<V: Variable + VariableSafe> Residual for PriorResidual<V> {
    fn keys(&self) -> &[Key] {
        std::slice::from_ref(&self.key)
    }

    fn dim_out(&self) -> usize {
        V::DIM
    }

    fn residual(&self, vars: &[Box<dyn VariableSafe>]) -> VectorX {
        let v = vars[0]
            .downcast_ref::<V>()
            .expect("PriorResidual type mismatch");
        v.ominus(&self.prior)
    }
}
