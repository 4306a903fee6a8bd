use dyn_clone::DynClone;

use crate::containers::Key;
use crate::linalg::VectorX;
use crate::variables::VariableSafe;

/// A residual function over a fixed, ordered set of variable keys. Every
/// concrete residual (reprojection, IMU preintegration, priors) implements
/// this directly against type-erased variables; the numerical Jacobian is
/// produced uniformly by [`crate::linalg::numerical_jacobian`], so there is
/// no per-arity code generation here.
pub trait Residual: std::fmt::Debug + DynClone {
    fn keys(&self) -> &[Key];
    fn dim_out(&self) -> usize;

    /// `vars` is supplied in the same order as [`Residual::keys`].
    fn residual(&self, vars: &[Box<dyn VariableSafe>]) -> VectorX;
}
dyn_clone::clone_trait_object!(Residual);
