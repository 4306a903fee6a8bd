use crate::camera::StereoCamera;
use crate::containers::{key, Factor, Graph, Values};
use crate::linalg::{dtype, Vector2, Vector3};
use crate::optimizers::{GaussNewton, Optimizer};
use crate::residuals::PoseOnlyReprojection;
use crate::variables::{Variable, SE3};

/// Parameters for [`solve`], mirroring spec.md §4.4 step 4's "EPnP,
/// 100 iterations, 8 px threshold, 0.98 confidence".
#[derive(Debug, Clone, Copy)]
pub struct PnpRansacParams {
    pub iterations: usize,
    pub threshold_px: dtype,
    pub confidence: dtype,
    pub min_sample: usize,
}

impl Default for PnpRansacParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            threshold_px: 8.0,
            confidence: 0.98,
            min_sample: 6,
        }
    }
}

/// Tiny xorshift64* PRNG so RANSAC sampling is deterministic and doesn't
/// pull in a dependency the rest of the stack has no other use for.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(1))
    }

    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn next_index(&mut self, bound: usize) -> usize {
        (self.next_u64() as usize) % bound
    }
}

/// Refines a single [`SE3`] pose against a fixed set of 3D-2D
/// correspondences by minimizing reprojection error with
/// [`GaussNewton`] — the RANSAC-minimal-solve and final-refine step of
/// spec.md §4.4's PnP-RANSAC, built on the crate's own factor-graph
/// machinery rather than a closed-form EPnP solve (see DESIGN.md).
fn solve_pose(
    correspondences: &[(Vector3, Vector2)],
    camera: &StereoCamera,
    initial: SE3,
) -> Option<SE3> {
    if correspondences.len() < 3 {
        return None;
    }

    let mut values = Values::new();
    values.insert(key::pose(0), initial);

    let mut graph = Graph::new();
    for &(world_point, obs) in correspondences {
        graph.add_factor(Factor::new_base(Box::new(PoseOnlyReprojection::new(
            key::pose(0),
            obs,
            world_point,
            *camera,
        ))));
    }

    let mut opt = GaussNewton::default();
    opt.optimize(&graph, &mut values).ok()?;
    values.get_cast::<SE3>(&key::pose(0)).copied()
}

fn reprojection_error(pose: &SE3, world_point: &Vector3, obs: &Vector2, camera: &StereoCamera) -> dtype {
    let p_cam = pose.inverse().apply(world_point);
    if p_cam.z <= 0.0 {
        return dtype::INFINITY;
    }
    (camera.project_left(&p_cam) - obs).norm()
}

/// PnP-RANSAC over `correspondences` (world-frame point, observed pixel)
/// pairs: repeatedly solves a minimal sample, scores it against the full
/// set, and returns the refined pose plus the indices of the inlier
/// correspondences it was fit from. Returns `None` if no sample ever
/// produces at least `params.min_sample` inliers.
pub fn solve(
    correspondences: &[(Vector3, Vector2)],
    camera: &StereoCamera,
    initial: SE3,
    params: &PnpRansacParams,
) -> Option<(SE3, Vec<usize>)> {
    if correspondences.len() < params.min_sample {
        return None;
    }

    let mut rng = Rng::new(correspondences.len() as u64);
    let mut best_inliers: Vec<usize> = Vec::new();

    for _ in 0..params.iterations {
        let mut sample = Vec::with_capacity(params.min_sample);
        let mut used = vec![false; correspondences.len()];
        while sample.len() < params.min_sample {
            let idx = rng.next_index(correspondences.len());
            if !used[idx] {
                used[idx] = true;
                sample.push(correspondences[idx]);
            }
        }

        let Some(candidate) = solve_pose(&sample, camera, initial) else {
            continue;
        };

        let inliers: Vec<usize> = correspondences
            .iter()
            .enumerate()
            .filter(|(_, (p, obs))| reprojection_error(&candidate, p, obs, camera) < params.threshold_px)
            .map(|(i, _)| i)
            .collect();

        if inliers.len() > best_inliers.len() {
            best_inliers = inliers;
        }

        let inlier_ratio = best_inliers.len() as dtype / correspondences.len() as dtype;
        if inlier_ratio >= params.confidence {
            break;
        }
    }

    if best_inliers.len() < params.min_sample {
        return None;
    }

    let inlier_set: Vec<_> = best_inliers.iter().map(|&i| correspondences[i]).collect();
    let refined = solve_pose(&inlier_set, camera, initial)?;
    Some((refined, best_inliers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Intrinsics;

    fn camera() -> StereoCamera {
        StereoCamera {
            left: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            right: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            baseline: 0.1,
            t_cam_imu: SE3::identity(),
        }
    }

    #[test]
    fn recovers_identity_pose_from_noiseless_correspondences() {
        let cam = camera();
        let pose = SE3::identity();
        let points: Vec<Vector3> = (0..20)
            .map(|i| Vector3::new((i as dtype - 10.0) * 0.1, 0.05 * i as dtype, 3.0 + 0.1 * i as dtype))
            .collect();
        let correspondences: Vec<(Vector3, Vector2)> = points
            .iter()
            .map(|p| (*p, cam.project_left(p)))
            .collect();

        let (solved, inliers) = solve(&correspondences, &cam, SE3::identity(), &PnpRansacParams::default())
            .expect("ransac should succeed on noiseless data");
        assert!(inliers.len() >= 15);
        assert!((solved.log() - pose.log()).norm() < 1e-2);
    }

    #[test]
    fn rejects_when_too_few_correspondences() {
        let cam = camera();
        let correspondences = vec![
            (Vector3::new(0.0, 0.0, 2.0), Vector2::new(320.0, 240.0)),
            (Vector3::new(0.1, 0.0, 2.0), Vector2::new(340.0, 240.0)),
        ];
        assert!(solve(&correspondences, &cam, SE3::identity(), &PnpRansacParams::default()).is_none());
    }
}
