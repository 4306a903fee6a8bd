use crate::camera::StereoCamera;
use crate::containers::Key;
use crate::linalg::{Vector2, Vector3, VectorX};
use crate::variables::{Variable, VariableSafe, SE3};

use super::traits::Residual;

/// Reprojection of a landmark whose world position is already fixed
/// (first-seen frame lies outside the optimization window). Only the
/// observing keyframe's pose is a free variable.
#[derive(Debug, Clone)]
pub struct PoseOnlyReprojection {
    pose_key: Key,
    observation: Vector2,
    world_point: Vector3,
    camera: StereoCamera,
}

impl PoseOnlyReprojection {
    pub fn new(pose_key: Key, observation: Vector2, world_point: Vector3, camera: StereoCamera) -> Self {
        Self {
            pose_key,
            observation,
            world_point,
            camera,
        }
    }
}

impl Residual for PoseOnlyReprojection {
    fn keys(&self) -> &[Key] {
        std::slice::from_ref(&self.pose_key)
    }

    fn dim_out(&self) -> usize {
        2
    }

    fn residual(&self, vars: &[Box<dyn VariableSafe>]) -> VectorX {
        let pose = vars[0].downcast_ref::<SE3>().expect("expected SE3 pose");
        let p_cam = pose.inverse().apply(&self.world_point);
        let predicted = self.camera.project_left(&p_cam);
        VectorX::from_column_slice((predicted - self.observation).as_slice())
    }
}

/// Reprojection of a landmark expressed in its reference keyframe's
/// camera coordinates, observed from a second keyframe. Both poses are
/// free variables.
#[derive(Debug, Clone)]
pub struct TwoFrameReprojection {
    keys: [Key; 2],
    point_in_ref: Vector3,
    observation: Vector2,
    camera: StereoCamera,
}

impl TwoFrameReprojection {
    pub fn new(
        ref_pose_key: Key,
        obs_pose_key: Key,
        point_in_ref: Vector3,
        observation: Vector2,
        camera: StereoCamera,
    ) -> Self {
        Self {
            keys: [ref_pose_key, obs_pose_key],
            point_in_ref,
            observation,
            camera,
        }
    }
}

impl Residual for TwoFrameReprojection {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim_out(&self) -> usize {
        2
    }

    fn residual(&self, vars: &[Box<dyn VariableSafe>]) -> VectorX {
        let ref_pose = vars[0].downcast_ref::<SE3>().expect("expected SE3 pose");
        let obs_pose = vars[1].downcast_ref::<SE3>().expect("expected SE3 pose");

        let world_point = ref_pose.apply(&self.point_in_ref);
        let p_cam = obs_pose.inverse().apply(&world_point);
        let predicted = self.camera.project_left(&p_cam);
        VectorX::from_column_slice((predicted - self.observation).as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::key;

    fn camera() -> StereoCamera {
        use crate::camera::Intrinsics;
        StereoCamera {
            left: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            right: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            baseline: 0.1,
            t_cam_imu: SE3::identity(),
        }
    }

    #[test]
    fn zero_residual_at_consistent_geometry() {
        let pose = SE3::identity();
        let p_cam = Vector3::new(0.1, -0.2, 2.0);
        let cam = camera();
        let obs = cam.project_left(&p_cam);

        let res = PoseOnlyReprojection::new(key::pose(0), obs, p_cam, cam);
        let vars: Vec<Box<dyn VariableSafe>> = vec![Box::new(pose)];
        assert!(res.residual(&vars).norm() < 1e-9);
    }
}
