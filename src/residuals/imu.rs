use crate::containers::Key;
use crate::linalg::VectorX;
use crate::variables::{ImuBias, Variable, VariableSafe, VectorVar3, SE3};

use super::imu_preint::ImuDelta;
use super::traits::Residual;

/// The 15-dimensional IMU preintegration residual (§4.3's `IMUError`),
/// connecting the eight parameter blocks of a consecutive keyframe pair:
/// `{pose_i, v_i, ba_i, bg_i, pose_j, v_j, ba_j, bg_j}`.
#[derive(Debug, Clone)]
pub struct ImuError {
    keys: [Key; 8],
    delta: ImuDelta,
}

impl ImuError {
    pub fn new(
        pose_i: Key,
        v_i: Key,
        ba_i: Key,
        bg_i: Key,
        pose_j: Key,
        v_j: Key,
        ba_j: Key,
        bg_j: Key,
        delta: ImuDelta,
    ) -> Self {
        Self {
            keys: [pose_i, v_i, ba_i, bg_i, pose_j, v_j, ba_j, bg_j],
            delta,
        }
    }
}

impl Residual for ImuError {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim_out(&self) -> usize {
        15
    }

    fn residual(&self, vars: &[Box<dyn VariableSafe>]) -> VectorX {
        let pose_i = vars[0].downcast_ref::<SE3>().expect("expected SE3 pose_i");
        let v_i = vars[1].downcast_ref::<VectorVar3>().expect("expected v_i");
        let ba_i = vars[2].downcast_ref::<VectorVar3>().expect("expected ba_i");
        let bg_i = vars[3].downcast_ref::<VectorVar3>().expect("expected bg_i");
        let pose_j = vars[4].downcast_ref::<SE3>().expect("expected SE3 pose_j");
        let v_j = vars[5].downcast_ref::<VectorVar3>().expect("expected v_j");
        let ba_j = vars[6].downcast_ref::<VectorVar3>().expect("expected ba_j");
        let bg_j = vars[7].downcast_ref::<VectorVar3>().expect("expected bg_j");

        let bias_i = ImuBias::new(ba_i.0, bg_i.0);
        let (rot_pred, vel_pred, pos_pred) =
            self.delta.predict(&pose_i.rot, &pose_i.xyz, &v_i.0, &bias_i);

        let rot_residual = pose_j.rot.ominus(&rot_pred);
        let vel_residual = v_j.0 - vel_pred;
        let pos_residual = pose_j.xyz - pos_pred;
        let ba_residual = ba_j.0 - ba_i.0;
        let bg_residual = bg_j.0 - bg_i.0;

        let mut out = VectorX::zeros(15);
        out.rows_mut(0, 3).copy_from(&rot_residual);
        out.rows_mut(3, 3).copy_from(&vel_residual);
        out.rows_mut(6, 3).copy_from(&pos_residual);
        out.rows_mut(9, 3).copy_from(&ba_residual);
        out.rows_mut(12, 3).copy_from(&bg_residual);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::key;
    use crate::linalg::Vector3;

    #[test]
    fn zero_residual_for_noiseless_straight_line_prediction() {
        let gravity = Vector3::new(0.0, 0.0, -9.81);
        let bias = ImuBias::zeros();
        let mut delta = ImuDelta::new(gravity, bias);
        let dt = 0.01;
        for _ in 0..50 {
            delta.integrate(dt, -gravity, Vector3::zeros());
        }

        let pose_i = SE3::identity();
        let v_i = VectorVar3::new(Vector3::zeros());
        let ba = VectorVar3::new(Vector3::zeros());
        let bg = VectorVar3::new(Vector3::zeros());

        let (rot_j, vel_j, pos_j) = delta.predict(&pose_i.rot, &pose_i.xyz, &v_i.0, &bias);
        let pose_j = SE3::new(rot_j, pos_j);
        let v_j = VectorVar3::new(vel_j);

        let res = ImuError::new(
            key::pose(0),
            key::vel(0),
            key::bias_acc(0),
            key::bias_gyro(0),
            key::pose(1),
            key::vel(1),
            key::bias_acc(1),
            key::bias_gyro(1),
            delta,
        );

        let vars: Vec<Box<dyn VariableSafe>> = vec![
            Box::new(pose_i),
            Box::new(v_i),
            Box::new(ba),
            Box::new(bg),
            Box::new(pose_j),
            Box::new(v_j),
            Box::new(ba),
            Box::new(bg),
        ];

        assert!(res.residual(&vars).norm() < 1e-9);
    }
}
