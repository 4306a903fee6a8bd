use crate::error::{Error, Result};
use crate::linalg::{dtype, Matrix15, Matrix3, Vector3, VectorX};
use crate::noise::GaussianNoise;
use crate::variables::{left_jacobian, ImuBias, Variable, SO3};

use super::covariance::ImuCovariance;
use super::delta::ImuDelta;

fn right_jacobian(xi: &Vector3) -> Matrix3 {
    left_jacobian(&(-xi))
}

/// Default relative bias drift, per 3-vector, past which
/// [`ImuPreintegrator::set_new_bias`] re-integrates from the raw sample
/// buffer rather than applying the first-order correction (the
/// re-linearization threshold left as an open question in §9).
pub const DEFAULT_REINT_THRESHOLD: dtype = 1e-2;

#[derive(Clone, Copy)]
struct Sample {
    dt: dtype,
    acc: Vector3,
    gyro: Vector3,
}

/// Accumulates IMU samples into an [`ImuDelta`] plus its propagated
/// 15x15 covariance, keeping the raw sample buffer around so the bias
/// can be re-linearized later without losing precision.
#[derive(Clone)]
pub struct ImuPreintegrator {
    pub delta: ImuDelta,
    pub cov: Matrix15,
    params: ImuCovariance,
    samples: Vec<Sample>,
    reint_threshold: dtype,
    last_time: Option<dtype>,
}

impl ImuPreintegrator {
    pub fn new(gravity: Vector3, bias_init: ImuBias, params: ImuCovariance) -> Self {
        Self {
            delta: ImuDelta::new(gravity, bias_init),
            cov: Matrix15::zeros(),
            params,
            samples: Vec::new(),
            reint_threshold: DEFAULT_REINT_THRESHOLD,
            last_time: None,
        }
    }

    pub fn with_reint_threshold(mut self, threshold: dtype) -> Self {
        self.reint_threshold = threshold;
        self
    }

    /// Incorporates one raw IMU sample, validating monotonicity and
    /// finiteness per §4.2's error taxonomy.
    pub fn append(&mut self, t: dtype, dt: dtype, a_raw: Vector3, w_raw: Vector3) -> Result<()> {
        if !a_raw.iter().all(|v| v.is_finite()) || !w_raw.iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidImuSample { t: t as f64 });
        }
        if dt <= 0.0 {
            let prev = self.last_time.unwrap_or(t - dt);
            return Err(Error::NonMonotonicTime {
                prev: prev as f64,
                next: t as f64,
            });
        }

        self.propagate_covariance(dt, a_raw, w_raw);
        self.delta.integrate(dt, a_raw, w_raw);
        self.samples.push(Sample { dt, acc: a_raw, gyro: w_raw });
        self.last_time = Some(t);
        Ok(())
    }

    fn propagate_covariance(&mut self, dt: dtype, a_raw: Vector3, w_raw: Vector3) {
        let acc = a_raw - self.delta.linearized_bias.acc;
        let gyro = w_raw - self.delta.linearized_bias.gyro;
        let gyro_theta = gyro * dt;

        let r_k = self.delta.rot.to_matrix();
        let exp_gyro = SO3::exp(&VectorX::from_column_slice(gyro_theta.as_slice())).to_matrix();
        let jr = right_jacobian(&gyro_theta);
        let acc_hat = SO3::hat(&VectorX::from_column_slice(acc.as_slice()));

        let mut a = Matrix15::identity();
        a.fixed_view_mut::<3, 3>(0, 0).copy_from(&exp_gyro.transpose());
        a.fixed_view_mut::<3, 3>(0, 12).copy_from(&(-jr * dt));

        a.fixed_view_mut::<3, 3>(3, 0).copy_from(&(-r_k * acc_hat * dt));
        a.fixed_view_mut::<3, 3>(3, 9).copy_from(&(-r_k * dt));

        a.fixed_view_mut::<3, 3>(6, 0)
            .copy_from(&(-0.5 * r_k * acc_hat * dt * dt));
        a.fixed_view_mut::<3, 3>(6, 3).copy_from(&(Matrix3::identity() * dt));
        a.fixed_view_mut::<3, 3>(6, 9).copy_from(&(-0.5 * r_k * dt * dt));

        let mut b_q_bt = Matrix15::zeros();
        let accel_cov = Matrix3::identity() * self.params.cov_accel;
        let gyro_cov = Matrix3::identity() * self.params.cov_gyro;
        let ba_cov = Matrix3::identity() * self.params.cov_accel_bias;
        let bg_cov = Matrix3::identity() * self.params.cov_gyro_bias;
        let integration_cov = Matrix3::identity() * self.params.cov_integration;

        let b_rot = jr * dt;
        let b_vel = r_k * dt;
        let b_pos = 0.5 * r_k * dt * dt;

        b_q_bt
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(b_rot * gyro_cov * b_rot.transpose()));
        b_q_bt
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&(b_vel * accel_cov * b_vel.transpose()));
        b_q_bt
            .fixed_view_mut::<3, 3>(6, 6)
            .copy_from(&(b_pos * accel_cov * b_pos.transpose() + integration_cov * dt * dt));
        b_q_bt.fixed_view_mut::<3, 3>(9, 9).copy_from(&(ba_cov * dt));
        b_q_bt.fixed_view_mut::<3, 3>(12, 12).copy_from(&(bg_cov * dt));

        self.cov = a * self.cov * a.transpose() + b_q_bt;
    }

    /// Relinearizes about `bias`. Re-integrates the raw sample buffer if
    /// the drift from [`ImuDelta::linearized_bias`] exceeds the
    /// configured threshold; otherwise leaves the first-order Jacobians
    /// in place (they're applied lazily by [`ImuDelta::bias_corrected`]).
    pub fn set_new_bias(&mut self, bias: ImuBias) {
        let d_ba = (bias.acc - self.delta.linearized_bias.acc).norm();
        let d_bg = (bias.gyro - self.delta.linearized_bias.gyro).norm();
        if d_ba <= self.reint_threshold && d_bg <= self.reint_threshold {
            return;
        }

        let gravity = self.delta.gravity;
        let samples = std::mem::take(&mut self.samples);
        self.delta = ImuDelta::new(gravity, bias);
        self.cov = Matrix15::zeros();
        for sample in &samples {
            self.propagate_covariance(sample.dt, sample.acc, sample.gyro);
            self.delta.integrate(sample.dt, sample.acc, sample.gyro);
        }
        self.samples = samples;
    }

    pub fn get_delta_rotation(&self, bias: &ImuBias) -> SO3 {
        self.delta.bias_corrected(bias).0
    }

    pub fn get_delta_velocity(&self, bias: &ImuBias) -> Vector3 {
        self.delta.bias_corrected(bias).1
    }

    pub fn get_delta_position(&self, bias: &ImuBias) -> Vector3 {
        self.delta.bias_corrected(bias).2
    }

    /// Builds the Gaussian noise model this accumulated 15x15 covariance
    /// implies, for use by an [`super::super::ImuError`] factor (rot/vel/
    /// pos/ba/bg block order, matching [`ImuError`](super::super::ImuError)'s residual).
    pub fn noise_model(&self) -> GaussianNoise {
        let dense = nalgebra::DMatrix::from_fn(15, 15, |r, c| self.cov[(r, c)]);
        GaussianNoise::from_covariance(&dense)
    }

    /// Builds the Gaussian noise model for the top-left 9x9 rotation/
    /// velocity/position block of the covariance, for use by an
    /// [`super::super::ImuErrorG`] factor during inertial initialization
    /// (§4.5) — that residual has no bias output, so the `ba`/`bg` block
    /// of the full covariance doesn't apply.
    pub fn gravity_noise_model(&self) -> GaussianNoise {
        let dense = nalgebra::DMatrix::from_fn(9, 9, |r, c| self.cov[(r, c)]);
        GaussianNoise::from_covariance(&dense)
    }
}
