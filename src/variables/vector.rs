use std::ops::{Deref, DerefMut};

use crate::impl_variable_safe;
use crate::linalg::{dtype, VectorX};

use super::traits::Variable;

/// A Euclidean variable of fixed dimension `N` (velocities, biases,
/// landmark positions). The group operation is vector addition, so
/// `exp`/`log` are the identity map and `oplus` reduces to addition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorVar<const N: usize>(pub nalgebra::SVector<dtype, N>);

impl<const N: usize> VectorVar<N> {
    pub fn new(v: nalgebra::SVector<dtype, N>) -> Self {
        Self(v)
    }
}

impl<const N: usize> Deref for VectorVar<N> {
    type Target = nalgebra::SVector<dtype, N>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize> DerefMut for VectorVar<N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<const N: usize> Variable for VectorVar<N> {
    const DIM: usize = N;

    fn identity() -> Self {
        Self(nalgebra::SVector::<dtype, N>::zeros())
    }

    fn inverse(&self) -> Self {
        Self(-self.0)
    }

    fn compose(&self, other: &Self) -> Self {
        Self(self.0 + other.0)
    }

    fn exp(xi: &VectorX) -> Self {
        debug_assert_eq!(xi.len(), N);
        Self(nalgebra::SVector::<dtype, N>::from_column_slice(
            xi.as_slice(),
        ))
    }

    fn log(&self) -> VectorX {
        VectorX::from_column_slice(self.0.as_slice())
    }

    fn oplus(&self, xi: &VectorX) -> Self {
        self.compose(&Self::exp(xi))
    }
}

pub type VectorVar1 = VectorVar<1>;
pub type VectorVar3 = VectorVar<3>;
pub type VectorVar6 = VectorVar<6>;

impl_variable_safe!(VectorVar<1>);
impl_variable_safe!(VectorVar<3>);
impl_variable_safe!(VectorVar<6>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_roundtrip() {
        let a = VectorVar3::new(nalgebra::Vector3::new(1.0, 2.0, 3.0));
        let xi = VectorX::from_column_slice(&[0.1, -0.2, 0.3]);
        let b = a.oplus(&xi);
        let back = b.ominus(&a);
        assert!((back - xi).norm() < 1e-12);
    }
}
