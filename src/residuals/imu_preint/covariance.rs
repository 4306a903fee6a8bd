use crate::linalg::dtype;

/// Tunable process-noise densities for the five blocks the teacher's
/// `ImuCovariance` exposes: raw accelerometer/gyroscope noise, their
/// random-walk bias drift, and an integration-uncertainty term. Every
/// field is public, so callers configure it with struct-update syntax
/// against [`ImuCovariance::default`] rather than through setters.
#[derive(Debug, Clone, Copy)]
pub struct ImuCovariance {
    pub cov_accel: dtype,
    pub cov_gyro: dtype,
    pub cov_accel_bias: dtype,
    pub cov_gyro_bias: dtype,
    pub cov_integration: dtype,
}

impl Default for ImuCovariance {
    fn default() -> Self {
        Self {
            cov_accel: 1e-5,
            cov_gyro: 1e-5,
            cov_accel_bias: 1e-6,
            cov_gyro_bias: 1e-6,
            cov_integration: 1e-7,
        }
    }
}
