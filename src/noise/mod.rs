//! Noise models whiten a raw residual before it enters the robust kernel
//! and the normal equations.

mod gaussian;
mod unit;

pub use gaussian::GaussianNoise;
pub use unit::UnitNoise;

use dyn_clone::DynClone;

use crate::linalg::{MatrixX, VectorX};

pub trait NoiseModel: std::fmt::Debug + DynClone {
    fn dim(&self) -> usize;
    fn whiten_vec(&self, v: &VectorX) -> VectorX;
    fn whiten_mat(&self, m: &MatrixX) -> MatrixX;
}
dyn_clone::clone_trait_object!(NoiseModel);
