use nalgebra::{Const, UnitQuaternion};

use crate::impl_variable_safe;
use crate::linalg::{dtype, Matrix3, Vector3, VectorX};

use super::traits::{MatrixLieGroup, Variable};

/// Rotation in 3-space, stored as a unit quaternion. Tangent space is the
/// usual `so(3)` rotation vector (axis * angle).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO3 {
    q: UnitQuaternion<dtype>,
}

impl SO3 {
    pub fn from_quaternion(q: UnitQuaternion<dtype>) -> Self {
        Self { q }
    }

    pub fn quaternion(&self) -> &UnitQuaternion<dtype> {
        &self.q
    }

    pub fn apply(&self, v: &Vector3) -> Vector3 {
        self.q * v
    }
}

impl Variable for SO3 {
    const DIM: usize = 3;

    fn identity() -> Self {
        Self {
            q: UnitQuaternion::identity(),
        }
    }

    fn inverse(&self) -> Self {
        Self { q: self.q.inverse() }
    }

    fn compose(&self, other: &Self) -> Self {
        Self {
            q: self.q * other.q,
        }
    }

    fn exp(xi: &VectorX) -> Self {
        debug_assert_eq!(xi.len(), 3);
        Self {
            q: UnitQuaternion::new(Vector3::new(xi[0], xi[1], xi[2])),
        }
    }

    fn log(&self) -> VectorX {
        let w = self.q.scaled_axis();
        VectorX::from_column_slice(w.as_slice())
    }
}

impl MatrixLieGroup for SO3 {
    type TangentDim = Const<3>;
    type MatrixDim = Const<3>;

    fn adjoint(&self) -> Matrix3 {
        self.q.to_rotation_matrix().into_inner()
    }

    fn hat(xi: &VectorX) -> Matrix3 {
        debug_assert_eq!(xi.len(), 3);
        Matrix3::new(
            0.0, -xi[2], xi[1], //
            xi[2], 0.0, -xi[0], //
            -xi[1], xi[0], 0.0,
        )
    }

    fn vee(mat: &Matrix3) -> VectorX {
        VectorX::from_column_slice(&[mat[(2, 1)], mat[(0, 2)], mat[(1, 0)]])
    }

    fn to_matrix(&self) -> Matrix3 {
        self.q.to_rotation_matrix().into_inner()
    }
}

impl_variable_safe!(SO3);

/// `SO3::exp`'s left Jacobian, used by IMU preintegration to relate
/// rotation perturbations in the tangent space to the integrated delta.
pub fn left_jacobian(xi: &Vector3) -> Matrix3 {
    let theta = xi.norm();
    if theta < 1e-8 {
        return Matrix3::identity() + 0.5 * SO3::hat(&VectorX::from_column_slice(xi.as_slice()));
    }
    let hat = SO3::hat(&VectorX::from_column_slice(xi.as_slice()));
    let hat2 = hat * hat;
    Matrix3::identity()
        + ((1.0 - theta.cos()) / theta.powi(2)) * hat
        + ((theta - theta.sin()) / theta.powi(3)) * hat2
}

/// Inverse of the left Jacobian (`Hinv` in the teacher's preintegration code).
pub fn left_jacobian_inv(xi: &Vector3) -> Matrix3 {
    let theta = xi.norm();
    let hat = SO3::hat(&VectorX::from_column_slice(xi.as_slice()));
    if theta < 1e-8 {
        return Matrix3::identity() - 0.5 * hat;
    }
    let half = theta / 2.0;
    let hat2 = hat * hat;
    Matrix3::identity() - 0.5 * hat
        + (1.0 / theta.powi(2) - (1.0 + half.cos() / (2.0 * half.sin())) / theta) * hat2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_log_roundtrip() {
        let xi = VectorX::from_column_slice(&[0.1, -0.2, 0.3]);
        let r = SO3::exp(&xi);
        let back = r.log();
        assert!((xi - back).norm() < 1e-9);
    }

    #[test]
    fn identity_is_fixed_point() {
        let r = SO3::identity();
        assert!(r.log().norm() < 1e-12);
    }

    #[test]
    fn compose_inverse_is_identity() {
        let xi = VectorX::from_column_slice(&[0.4, 0.1, -0.2]);
        let r = SO3::exp(&xi);
        let id = r.compose(&r.inverse());
        assert!(id.log().norm() < 1e-9);
    }
}
