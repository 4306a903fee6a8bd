//! Pinhole stereo camera model: projection, triangulation, and the
//! collaborator trait the frontend and residual factory consume it
//! through. Calibration loading itself is out of scope (§1) — callers
//! construct a [`StereoCamera`] with already-known intrinsics/extrinsics.

use crate::linalg::{dtype, Matrix3, Vector2, Vector3};
use crate::variables::SE3;

/// Pinhole intrinsics shared by the left and right cameras of a rig.
#[derive(Debug, Clone, Copy)]
pub struct Intrinsics {
    pub fx: dtype,
    pub fy: dtype,
    pub cx: dtype,
    pub cy: dtype,
}

impl Intrinsics {
    pub fn matrix(&self) -> Matrix3 {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn project(&self, p: &Vector3) -> Vector2 {
        Vector2::new(
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        )
    }

    pub fn unproject(&self, pixel: &Vector2, depth: dtype) -> Vector3 {
        Vector3::new(
            (pixel.x - self.cx) * depth / self.fx,
            (pixel.y - self.cy) * depth / self.fy,
            depth,
        )
    }
}

/// A calibrated stereo rig: shared intrinsics, known baseline along the
/// left camera's x-axis, and the camera-to-IMU extrinsic used by
/// preintegration residuals.
#[derive(Debug, Clone, Copy)]
pub struct StereoCamera {
    pub left: Intrinsics,
    pub right: Intrinsics,
    pub baseline: dtype,
    /// Camera-to-IMU extrinsic (`calib.Tcb` in the data model).
    pub t_cam_imu: SE3,
}

impl StereoCamera {
    pub fn project_left(&self, p_cam: &Vector3) -> Vector2 {
        self.left.project(p_cam)
    }

    pub fn project_right(&self, p_cam: &Vector3) -> Vector2 {
        let shifted = Vector3::new(p_cam.x - self.baseline, p_cam.y, p_cam.z);
        self.right.project(&shifted)
    }

    /// Triangulates a point from matched left/right pixel coordinates via
    /// the standard stereo disparity relation. Returns `None` for
    /// non-positive disparity (parallel or divergent rays).
    pub fn triangulate(&self, left_px: Vector2, right_px: Vector2) -> Option<Vector3> {
        let disparity = left_px.x - right_px.x;
        if disparity <= 1e-6 {
            return None;
        }
        let depth = self.left.fx * self.baseline / disparity;
        if !depth.is_finite() || depth <= 0.0 {
            return None;
        }
        Some(self.left.unproject(&left_px, depth))
    }

    /// Reprojection error (px) of a camera-frame point in each image,
    /// used both by triangulation acceptance (§4.4 step 3, 0.5px bound)
    /// and by outlier cleanup (§4.6 step 7, 10px bound).
    pub fn reprojection_error(
        &self,
        p_cam: &Vector3,
        left_px: Vector2,
        right_px: Option<Vector2>,
    ) -> dtype {
        let mut err = (self.project_left(p_cam) - left_px).norm();
        if let Some(right_px) = right_px {
            err = err.max((self.project_right(p_cam) - right_px).norm());
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Variable;

    fn camera() -> StereoCamera {
        StereoCamera {
            left: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            right: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            baseline: 0.1,
            t_cam_imu: SE3::identity(),
        }
    }

    #[test]
    fn triangulate_then_reproject_is_low_error() {
        let cam = camera();
        let p = Vector3::new(0.2, -0.1, 3.0);
        let left = cam.project_left(&p);
        let right = cam.project_right(&p);

        let back = cam.triangulate(left, right).unwrap();
        let err = cam.reprojection_error(&back, left, Some(right));
        assert!(err < 0.5, "reprojection error {err} too high");
    }

    #[test]
    fn zero_disparity_fails_to_triangulate() {
        let cam = camera();
        let px = Vector2::new(100.0, 100.0);
        assert!(cam.triangulate(px, px).is_none());
    }
}
