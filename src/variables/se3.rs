use nalgebra::Const;

use crate::impl_variable_safe;
use crate::linalg::{dtype, Matrix3, Matrix4, Vector3, VectorX};

use super::so3::SO3;
use super::traits::{MatrixLieGroup, Variable};

/// Rigid-body pose: rotation plus translation, stored separately (not as
/// a homogeneous matrix) so that `rot`/`xyz` access never needs slicing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rot: SO3,
    pub xyz: Vector3,
}

impl SE3 {
    pub fn new(rot: SO3, xyz: Vector3) -> Self {
        Self { rot, xyz }
    }

    pub fn apply(&self, p: &Vector3) -> Vector3 {
        self.rot.apply(p) + self.xyz
    }
}

impl Variable for SE3 {
    const DIM: usize = 6;

    fn identity() -> Self {
        Self {
            rot: SO3::identity(),
            xyz: Vector3::zeros(),
        }
    }

    fn inverse(&self) -> Self {
        let rot_inv = self.rot.inverse();
        Self {
            xyz: -rot_inv.apply(&self.xyz),
            rot: rot_inv,
        }
    }

    fn compose(&self, other: &Self) -> Self {
        Self {
            rot: self.rot.compose(&other.rot),
            xyz: self.xyz + self.rot.apply(&other.xyz),
        }
    }

    fn exp(xi: &VectorX) -> Self {
        debug_assert_eq!(xi.len(), 6);
        let xi_rho = Vector3::new(xi[0], xi[1], xi[2]);
        let xi_theta = Vector3::new(xi[3], xi[4], xi[5]);

        let rot = SO3::exp(&VectorX::from_column_slice(xi_theta.as_slice()));
        let v = super::so3::left_jacobian(&xi_theta);
        Self {
            rot,
            xyz: v * xi_rho,
        }
    }

    fn log(&self) -> VectorX {
        let xi_theta_vec = self.rot.log();
        let xi_theta = Vector3::new(xi_theta_vec[0], xi_theta_vec[1], xi_theta_vec[2]);
        let v_inv = super::so3::left_jacobian_inv(&xi_theta);
        let xi_rho = v_inv * self.xyz;

        let mut out = VectorX::zeros(6);
        out.fixed_rows_mut::<3>(0).copy_from(&xi_rho);
        out.fixed_rows_mut::<3>(3).copy_from(&xi_theta);
        out
    }
}

impl MatrixLieGroup for SE3 {
    type TangentDim = Const<6>;
    type MatrixDim = Const<4>;

    fn adjoint(&self) -> nalgebra::SMatrix<dtype, 6, 6> {
        let r = self.rot.to_matrix();
        let t_hat = SO3::hat(&VectorX::from_column_slice(self.xyz.as_slice()));
        let mut adj = nalgebra::SMatrix::<dtype, 6, 6>::zeros();
        adj.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        adj.fixed_view_mut::<3, 3>(0, 3).copy_from(&(t_hat * r));
        adj.fixed_view_mut::<3, 3>(3, 3).copy_from(&r);
        adj
    }

    fn hat(xi: &VectorX) -> Matrix4 {
        debug_assert_eq!(xi.len(), 6);
        let rho = Vector3::new(xi[0], xi[1], xi[2]);
        let theta = VectorX::from_column_slice(&[xi[3], xi[4], xi[5]]);
        let mut mat = Matrix4::zeros();
        mat.fixed_view_mut::<3, 3>(0, 0).copy_from(&SO3::hat(&theta));
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&rho);
        mat
    }

    fn vee(mat: &Matrix4) -> VectorX {
        let rho = mat.fixed_view::<3, 1>(0, 3).into_owned();
        let theta = SO3::vee(&mat.fixed_view::<3, 3>(0, 0).into_owned());
        let mut out = VectorX::zeros(6);
        out.fixed_rows_mut::<3>(0).copy_from(&rho);
        out[3] = theta[0];
        out[4] = theta[1];
        out[5] = theta[2];
        out
    }

    fn to_matrix(&self) -> Matrix4 {
        let mut mat = Matrix4::identity();
        mat.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.rot.to_matrix());
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.xyz);
        mat
    }
}

impl_variable_safe!(SE3);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SE3 {
        let xi = VectorX::from_column_slice(&[0.3, -0.1, 0.2, 0.05, -0.2, 0.1]);
        SE3::exp(&xi)
    }

    #[test]
    fn exp_log_roundtrip() {
        let xi = VectorX::from_column_slice(&[0.3, -0.1, 0.2, 0.05, -0.2, 0.1]);
        let pose = SE3::exp(&xi);
        let back = pose.log();
        assert!((xi - back).norm() < 1e-8);
    }

    #[test]
    fn compose_inverse_is_identity() {
        let pose = sample();
        let id = pose.compose(&pose.inverse());
        assert!(id.log().norm() < 1e-8);
    }

    #[test]
    fn apply_matches_matrix_form() {
        let pose = sample();
        let p = Vector3::new(1.0, 2.0, 3.0);
        let via_apply = pose.apply(&p);
        let mat = pose.to_matrix();
        let homog = mat * nalgebra::Vector4::new(p.x, p.y, p.z, 1.0);
        assert!((via_apply - homog.fixed_rows::<3>(0).into_owned()).norm() < 1e-9);
    }
}
