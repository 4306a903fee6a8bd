use crate::containers::Key;
use crate::linalg::VectorX;
use crate::variables::{Variable, VariableSafe};

use super::traits::Residual;

/// Relative-pose constraint between two variables of the same type,
/// e.g. a loop-closure edge handed in by the pose-graph collaborator.
#[derive(Debug, Clone)]
pub struct BetweenResidual<V: Variable + VariableSafe> {
    keys: [Key; 2],
    delta: V,
}

impl<V: Variable + VariableSafe> BetweenResidual<V> {
    pub fn new(key_a: Key, key_b: Key, delta: V) -> Self {
        Self {
            keys: [key_a, key_b],
            delta,
        }
    }
}

impl<V: Variable + VariableSafe> Residual for BetweenResidual<V> {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim_out(&self) -> usize {
        V::DIM
    }

    fn residual(&self, vars: &[Box<dyn VariableSafe>]) -> VectorX {
        let a = vars[0]
            .downcast_ref::<V>()
            .expect("BetweenResidual type mismatch");
        let b = vars[1]
            .downcast_ref::<V>()
            .expect("BetweenResidual type mismatch");
        let measured = a.inverse().compose(b);
        measured.ominus(&self.delta)
    }
}
