use crate::impl_variable_safe;
use crate::linalg::{Vector3, VectorX};

use super::traits::Variable;

/// Accelerometer + gyroscope bias, treated as a 6-dimensional Euclidean
/// variable (the random-walk prior on bias drift operates directly in
/// this space).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuBias {
    pub acc: Vector3,
    pub gyro: Vector3,
}

impl ImuBias {
    pub fn new(acc: Vector3, gyro: Vector3) -> Self {
        Self { acc, gyro }
    }

    pub fn zeros() -> Self {
        Self {
            acc: Vector3::zeros(),
            gyro: Vector3::zeros(),
        }
    }
}

impl Variable for ImuBias {
    const DIM: usize = 6;

    fn identity() -> Self {
        Self::zeros()
    }

    fn inverse(&self) -> Self {
        Self {
            acc: -self.acc,
            gyro: -self.gyro,
        }
    }

    fn compose(&self, other: &Self) -> Self {
        Self {
            acc: self.acc + other.acc,
            gyro: self.gyro + other.gyro,
        }
    }

    fn exp(xi: &VectorX) -> Self {
        debug_assert_eq!(xi.len(), 6);
        Self {
            acc: Vector3::new(xi[0], xi[1], xi[2]),
            gyro: Vector3::new(xi[3], xi[4], xi[5]),
        }
    }

    fn log(&self) -> VectorX {
        VectorX::from_column_slice(&[
            self.acc.x, self.acc.y, self.acc.z, self.gyro.x, self.gyro.y, self.gyro.z,
        ])
    }
}

impl_variable_safe!(ImuBias);
