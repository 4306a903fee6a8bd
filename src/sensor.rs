//! Presence flags for the optional IMU/LiDAR/GNSS sensors, explicit
//! constructor state rather than global module state (§9's "global
//! sensor registry" redesign flag). [`crate::frontend::Frontend`] and
//! [`crate::backend::Backend`] both take a [`SensorRegistry`] at
//! construction instead of consulting ambient flags.
//!
//! The two sensor entry points spec.md §6 describes —
//! `add_frame(Frame)` and `add_imu(time, accel, gyro)` — are
//! [`crate::frontend::Frontend::add_frame`] and
//! [`crate::frontend::Frontend::add_imu`]: IMU samples accumulate into
//! the preintegration of whichever frame the frontend is currently
//! building, and are handed off to that frame once it arrives.

/// Which optional sensors/collaborators are present for this session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorRegistry {
    pub has_imu: bool,
    pub has_lidar: bool,
    pub has_navsat: bool,
}

impl SensorRegistry {
    pub fn new(has_imu: bool, has_lidar: bool, has_navsat: bool) -> Self {
        Self {
            has_imu,
            has_lidar,
            has_navsat,
        }
    }

    pub fn imu_only() -> Self {
        Self {
            has_imu: true,
            has_lidar: false,
            has_navsat: false,
        }
    }

    pub fn vision_only() -> Self {
        Self::default()
    }
}
