use std::fmt::Debug;

use downcast_rs::{impl_downcast, Downcast};
use dyn_clone::DynClone;

use crate::linalg::{dtype, VectorX};

/// A manifold value that can be optimized over via a local tangent-space
/// parameterization. `DIM` is the tangent space dimension (which may be
/// smaller than the ambient representation, e.g. `SO3` stores a unit
/// quaternion but has `DIM = 3`).
pub trait Variable: Clone + Debug + 'static {
    const DIM: usize;

    fn dim(&self) -> usize {
        Self::DIM
    }

    fn identity() -> Self;
    fn inverse(&self) -> Self;
    fn compose(&self, other: &Self) -> Self;

    /// Exponential map from the tangent space at identity.
    fn exp(xi: &VectorX) -> Self;
    /// Inverse of [`Variable::exp`].
    fn log(&self) -> VectorX;

    /// Retraction: move `self` by a tangent vector expressed in its own
    /// local frame. Default is the standard right-update
    /// `self * exp(xi)`; the `left` feature flips the convention in the
    /// Lie-group variables that override it.
    fn oplus(&self, xi: &VectorX) -> Self {
        self.compose(&Self::exp(xi))
    }

    /// Inverse of [`Variable::oplus`]: the tangent vector that takes
    /// `other` to `self`.
    fn ominus(&self, other: &Self) -> VectorX {
        other.inverse().compose(self).log()
    }
}

/// A [`Variable`] with a well-defined matrix representation, used by the
/// Lie-group types (`SO3`, `SE3`).
pub trait MatrixLieGroup: Variable {
    type TangentDim: nalgebra::DimName;
    type MatrixDim: nalgebra::DimName;

    fn adjoint(&self) -> nalgebra::OMatrix<dtype, Self::TangentDim, Self::TangentDim>;
    fn hat(xi: &VectorX) -> nalgebra::OMatrix<dtype, Self::MatrixDim, Self::MatrixDim>;
    fn vee(mat: &nalgebra::OMatrix<dtype, Self::MatrixDim, Self::MatrixDim>) -> VectorX;
    fn to_matrix(&self) -> nalgebra::OMatrix<dtype, Self::MatrixDim, Self::MatrixDim>;
}

/// Type-erased counterpart of [`Variable`], stored inside [`crate::containers::Values`].
/// Mirrors the teacher's `VariableSafe`: every concrete `Variable` gets a
/// blanket impl via [`impl_variable_safe`].
pub trait VariableSafe: Debug + DynClone + Downcast {
    fn dim(&self) -> usize;
    fn identity_like(&self) -> Box<dyn VariableSafe>;
    fn oplus_boxed(&self, xi: &VectorX) -> Box<dyn VariableSafe>;
    fn ominus_boxed(&self, other: &dyn VariableSafe) -> VectorX;
}
dyn_clone::clone_trait_object!(VariableSafe);
impl_downcast!(VariableSafe);

/// Blanket-implements [`VariableSafe`] for any concrete [`Variable`].
/// Invoked once per variable type (see each `variables/*.rs` module).
#[macro_export]
macro_rules! impl_variable_safe {
    ($ty:ty) => {
        impl $crate::variables::VariableSafe for $ty {
            fn dim(&self) -> usize {
                $crate::variables::Variable::dim(self)
            }

            fn identity_like(&self) -> Box<dyn $crate::variables::VariableSafe> {
                Box::new(<$ty as $crate::variables::Variable>::identity())
            }

            fn oplus_boxed(
                &self,
                xi: &$crate::linalg::VectorX,
            ) -> Box<dyn $crate::variables::VariableSafe> {
                Box::new($crate::variables::Variable::oplus(self, xi))
            }

            fn ominus_boxed(&self, other: &dyn $crate::variables::VariableSafe) -> $crate::linalg::VectorX {
                let other = other
                    .downcast_ref::<$ty>()
                    .expect("ominus_boxed called with mismatched variable types");
                $crate::variables::Variable::ominus(self, other)
            }
        }
    };
}
