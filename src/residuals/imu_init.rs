use crate::containers::Key;
use crate::linalg::{dtype, Vector3, VectorX};
use crate::variables::{ImuBias, Variable, VariableSafe, VectorVar3, SE3, SO3};

use super::imu_preint::ImuDelta;
use super::traits::Residual;

/// Gravity-direction residual used only by the inertial initializer
/// (§4.5's `IMUErrorG`). Unlike [`super::imu::ImuError`], the two
/// keyframe poses are already fixed (taken from the frontend's visual
/// estimate) rather than free variables, so the only unknowns are the
/// velocities at each end of the edge, the single session-wide bias, and
/// a gravity-rotation `SO3` mapping the nominal `(0, 0, -g)` reference
/// direction into the frame the visual poses were estimated in. The
/// Gaussian priors spec.md attaches to this factor (`prior_a`, `prior_g`)
/// are realized as separate [`super::prior::PriorResidual`] factors the
/// initializer adds alongside it (see `initializer/mod.rs`), rather than
/// folded into this residual's own evaluation.
#[derive(Debug, Clone)]
pub struct ImuErrorG {
    keys: [Key; 5],
    pose_i: SE3,
    pose_j: SE3,
    delta: ImuDelta,
    gravity_mag: dtype,
}

impl ImuErrorG {
    /// `v_i`/`v_j` are the free velocity keys at each end, `bias_acc`/
    /// `bias_gyro` the single session-wide bias keys, `gravity_rot` the
    /// free `SO3` gravity-rotation key. `pose_i`/`pose_j` are the fixed
    /// visual poses of the two keyframes this preintegration spans.
    pub fn new(
        v_i: Key,
        bias_acc: Key,
        bias_gyro: Key,
        v_j: Key,
        gravity_rot: Key,
        pose_i: SE3,
        pose_j: SE3,
        delta: ImuDelta,
        gravity_mag: dtype,
    ) -> Self {
        Self {
            keys: [v_i, bias_acc, bias_gyro, v_j, gravity_rot],
            pose_i,
            pose_j,
            delta,
            gravity_mag,
        }
    }
}

/// The reference gravity direction before alignment: `(0, 0, -g)` in the
/// frame the first keyframe's pose was estimated in.
pub fn reference_gravity(gravity_mag: dtype) -> Vector3 {
    Vector3::new(0.0, 0.0, -gravity_mag)
}

impl Residual for ImuErrorG {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim_out(&self) -> usize {
        9
    }

    fn residual(&self, vars: &[Box<dyn VariableSafe>]) -> VectorX {
        let v_i = vars[0].downcast_ref::<VectorVar3>().expect("expected v_i");
        let ba = vars[1].downcast_ref::<VectorVar3>().expect("expected ba");
        let bg = vars[2].downcast_ref::<VectorVar3>().expect("expected bg");
        let v_j = vars[3].downcast_ref::<VectorVar3>().expect("expected v_j");
        let rwg = vars[4].downcast_ref::<SO3>().expect("expected gravity rotation");

        let bias = ImuBias::new(ba.0, bg.0);
        let (d_rot, d_vel, d_pos) = self.delta.bias_corrected(&bias);
        let dt = self.delta.sum_dt;
        let gravity = rwg.apply(&reference_gravity(self.gravity_mag));

        let rot_j_pred = self.pose_i.rot.compose(&d_rot);
        let vel_j_pred = v_i.0 + gravity * dt + self.pose_i.rot.apply(&d_vel);
        let pos_j_pred = self.pose_i.xyz
            + v_i.0 * dt
            + 0.5 * gravity * dt * dt
            + self.pose_i.rot.apply(&d_pos);

        let rot_residual = self.pose_j.rot.ominus(&rot_j_pred);
        let vel_residual = v_j.0 - vel_j_pred;
        let pos_residual = self.pose_j.xyz - pos_j_pred;

        let mut out = VectorX::zeros(9);
        out.rows_mut(0, 3).copy_from(&rot_residual);
        out.rows_mut(3, 3).copy_from(&vel_residual);
        out.rows_mut(6, 3).copy_from(&pos_residual);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::key;

    #[test]
    fn zero_residual_for_consistent_straight_line_prediction() {
        let g_mag = 9.81;
        let bias = ImuBias::zeros();
        let gravity = reference_gravity(g_mag);
        let mut delta = ImuDelta::new(gravity, bias);
        for _ in 0..50 {
            delta.integrate(0.01, -gravity, Vector3::zeros());
        }

        let pose_i = SE3::identity();
        let v_i = VectorVar3::new(Vector3::zeros());
        let (rot_j, vel_j, pos_j) = delta.predict(&pose_i.rot, &pose_i.xyz, &v_i.0, &bias);
        let pose_j = SE3::new(rot_j, pos_j);
        let v_j = VectorVar3::new(vel_j);

        let res = ImuErrorG::new(
            key::vel(0),
            key::bias_acc(0),
            key::bias_gyro(0),
            key::vel(1),
            key::gravity_rot(),
            pose_i,
            pose_j,
            delta,
            g_mag,
        );

        let ba = VectorVar3::new(Vector3::zeros());
        let bg = VectorVar3::new(Vector3::zeros());
        let rwg = SO3::identity();

        let vars: Vec<Box<dyn VariableSafe>> = vec![
            Box::new(v_i),
            Box::new(ba),
            Box::new(bg),
            Box::new(v_j),
            Box::new(rwg),
        ];

        assert!(res.residual(&vars).norm() < 1e-9);
    }
}
