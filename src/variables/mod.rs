//! Manifold-valued optimization variables: poses, rotations, velocities,
//! biases. Every variable implements [`Variable`] for its typed API and
//! gets a blanket [`VariableSafe`] impl (via [`crate::impl_variable_safe`])
//! so it can live inside a type-erased [`crate::containers::Values`].

mod imu_bias;
mod se3;
mod so3;
mod traits;
mod vector;

pub use imu_bias::ImuBias;
pub use se3::SE3;
pub use so3::{left_jacobian, left_jacobian_inv, SO3};
pub use traits::{MatrixLieGroup, Variable, VariableSafe};
pub use vector::{VectorVar, VectorVar1, VectorVar3, VectorVar6};
