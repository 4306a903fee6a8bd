use crate::linalg::{dtype, Matrix3, Vector3, VectorX};
use crate::variables::{left_jacobian, ImuBias, Variable, SO3};

fn right_jacobian(xi: &Vector3) -> Matrix3 {
    left_jacobian(&(-xi))
}

/// The bias-linearized summary of IMU samples accumulated between two
/// times: rotation/velocity/position deltas plus the first-order
/// Jacobians relating them to the accelerometer/gyroscope bias used
/// during integration. Re-integrating from scratch is only needed when
/// the bias drifts past a threshold (§4.2); otherwise
/// [`ImuDelta::bias_corrected`] applies the linear correction directly.
#[derive(Debug, Clone, Copy)]
pub struct ImuDelta {
    pub sum_dt: dtype,
    pub rot: SO3,
    pub vel: Vector3,
    pub pos: Vector3,
    pub linearized_bias: ImuBias,

    pub d_rot_d_gyro: Matrix3,
    pub d_vel_d_acc: Matrix3,
    pub d_vel_d_gyro: Matrix3,
    pub d_pos_d_acc: Matrix3,
    pub d_pos_d_gyro: Matrix3,

    pub gravity: Vector3,
}

impl ImuDelta {
    pub fn new(gravity: Vector3, linearized_bias: ImuBias) -> Self {
        Self {
            sum_dt: 0.0,
            rot: SO3::identity(),
            vel: Vector3::zeros(),
            pos: Vector3::zeros(),
            linearized_bias,
            d_rot_d_gyro: Matrix3::zeros(),
            d_vel_d_acc: Matrix3::zeros(),
            d_vel_d_gyro: Matrix3::zeros(),
            d_pos_d_acc: Matrix3::zeros(),
            d_pos_d_gyro: Matrix3::zeros(),
            gravity,
        }
    }

    /// Folds in one IMU sample `(dt, a_raw, w_raw)`, updating the delta and
    /// its bias Jacobians in place (the "propagate, then integrate"
    /// recursion of discrete IMU preintegration).
    pub fn integrate(&mut self, dt: dtype, a_raw: Vector3, w_raw: Vector3) {
        let acc = a_raw - self.linearized_bias.acc;
        let gyro = w_raw - self.linearized_bias.gyro;

        let gyro_theta = gyro * dt;
        let exp_gyro = SO3::exp(&VectorX::from_column_slice(gyro_theta.as_slice()));
        let r_k = self.rot;
        let jr = right_jacobian(&gyro_theta);
        let acc_hat = SO3::hat(&VectorX::from_column_slice(acc.as_slice()));

        // Position and velocity use the rotation *before* this step's update.
        self.pos += self.vel * dt + 0.5 * r_k.apply(&acc) * dt * dt;
        self.vel += r_k.apply(&acc) * dt;
        self.rot = r_k.compose(&exp_gyro);

        let r_k_mat = r_k.to_matrix();

        self.d_pos_d_acc += self.d_vel_d_acc * dt - 0.5 * r_k_mat * dt * dt;
        self.d_pos_d_gyro += self.d_vel_d_gyro * dt - 0.5 * r_k_mat * acc_hat * self.d_rot_d_gyro * dt * dt;

        self.d_vel_d_acc -= r_k_mat * dt;
        self.d_vel_d_gyro -= r_k_mat * acc_hat * self.d_rot_d_gyro * dt;

        self.d_rot_d_gyro = exp_gyro.to_matrix().transpose() * self.d_rot_d_gyro - jr * dt;

        self.sum_dt += dt;
    }

    /// First-order bias correction: applies the linear Jacobian without
    /// re-integrating, valid as long as the new bias is close to
    /// [`ImuDelta::linearized_bias`].
    pub fn bias_corrected(&self, bias: &ImuBias) -> (SO3, Vector3, Vector3) {
        let d_ba = bias.acc - self.linearized_bias.acc;
        let d_bg = bias.gyro - self.linearized_bias.gyro;

        let rot_correction = self.d_rot_d_gyro * d_bg;
        let rot = self
            .rot
            .compose(&SO3::exp(&VectorX::from_column_slice(rot_correction.as_slice())));
        let vel = self.vel + self.d_vel_d_acc * d_ba + self.d_vel_d_gyro * d_bg;
        let pos = self.pos + self.d_pos_d_acc * d_ba + self.d_pos_d_gyro * d_bg;

        (rot, vel, pos)
    }

    /// Predicts body j's rotation/velocity/position from body i's state,
    /// given the (possibly bias-corrected) delta and gravity.
    pub fn predict(
        &self,
        pose_i_rot: &SO3,
        pose_i_xyz: &Vector3,
        vel_i: &Vector3,
        bias: &ImuBias,
    ) -> (SO3, Vector3, Vector3) {
        let (d_rot, d_vel, d_pos) = self.bias_corrected(bias);
        let dt = self.sum_dt;

        let rot_j = pose_i_rot.compose(&d_rot);
        let vel_j = vel_i + self.gravity * dt + pose_i_rot.apply(&d_vel);
        let pos_j = pose_i_xyz + vel_i * dt + 0.5 * self.gravity * dt * dt + pose_i_rot.apply(&d_pos);

        (rot_j, vel_j, pos_j)
    }
}
