//! Every tunable knob enumerated in spec.md §6, plus the handful the
//! frontend/backend/initializer reference internally (LK pyramid size,
//! RANSAC thresholds, staged-initialization timings, solver wall
//! budgets). Deserializable behind the optional `serde` feature exactly
//! as the teacher gates serde support on `Factor`/`NoiseModel`.

use crate::linalg::dtype;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Target feature count per keyframe.
    pub num_features: usize,
    /// Minimum feature count to bootstrap tracking.
    pub num_features_init: usize,
    /// Inlier count above which tracking is classified `TRACKING_GOOD`.
    pub num_features_tracking: usize,
    /// Inlier count above which tracking is classified `TRACKING_BAD`
    /// (below `num_features_tracking`, above this is the demoted state).
    pub num_features_tracking_bad: usize,
    /// Inlier count below which a new keyframe is created.
    pub num_features_needed_for_keyframe: usize,
    /// Consecutive `TRACKING_TRY` failures before declaring `LOST`.
    pub max_consecutive_try: u32,

    /// Length of the backend's sliding window, in seconds.
    pub window_size: dtype,
    /// Enables adaptive residual weighting; identity weights when
    /// false (§9 Open Question (c) — no weighting subsystem is defined
    /// in the core, so this only gates whether one *could* be plugged
    /// in, and defaults off).
    pub update_weights: bool,
    /// Solver parallelism requested from the optimizer; the in-process
    /// dense Cholesky solver here doesn't parallelize within a solve, so
    /// this is surfaced for a future sparse/multithreaded backend (see
    /// DESIGN.md) rather than consumed today.
    pub num_threads: usize,

    /// LK optical-flow pyramid window size, in pixels.
    pub lk_window: usize,
    /// LK optical-flow pyramid level count.
    pub lk_levels: usize,
    /// Exclusion radius (px) around existing keypoints when detecting
    /// new features at keyframe creation.
    pub feature_exclusion_radius: dtype,
    /// Max reprojection error (px) for a stereo triangulation to be
    /// accepted as a new landmark.
    pub triangulation_max_error: dtype,
    /// Max reprojection error (px) for an optimized feature to survive
    /// the backend's post-solve outlier cleanup.
    pub outlier_reprojection_threshold: dtype,

    /// PnP-RANSAC iteration count.
    pub pnp_ransac_iterations: usize,
    /// PnP-RANSAC inlier threshold, in pixels.
    pub pnp_ransac_threshold_px: dtype,
    /// PnP-RANSAC confidence.
    pub pnp_ransac_confidence: dtype,
    /// Sanity bound (§8) on per-frame pose motion; track results that
    /// exceed this are rejected as spurious.
    pub max_motion_per_frame: dtype,

    /// Gravity magnitude, m/s^2.
    pub gravity_mag: dtype,
    /// Minimum keyframes with preintegration required before the
    /// initializer may run.
    pub initializer_num_frames: usize,
    /// Relative bias drift past which preintegration re-integrates from
    /// raw samples rather than applying its first-order correction.
    pub imu_bias_reint_threshold: dtype,

    /// Wall-clock budget for the initializer's Dogleg solve, seconds.
    pub initializer_solver_time: dtype,
    /// Fraction of `window_size` allotted to the backend's Dogleg solve.
    pub backend_solver_time_fraction: dtype,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_features: 150,
            num_features_init: 100,
            num_features_tracking: 50,
            num_features_tracking_bad: 20,
            num_features_needed_for_keyframe: 80,
            max_consecutive_try: 4,

            window_size: 10.0,
            update_weights: false,
            num_threads: 4,

            lk_window: 11,
            lk_levels: 3,
            feature_exclusion_radius: 20.0,
            triangulation_max_error: 0.5,
            outlier_reprojection_threshold: 10.0,

            pnp_ransac_iterations: 100,
            pnp_ransac_threshold_px: 8.0,
            pnp_ransac_confidence: 0.98,
            max_motion_per_frame: 5.0,

            gravity_mag: 9.81,
            initializer_num_frames: 10,
            imu_bias_reint_threshold: crate::residuals::imu_preint::DEFAULT_REINT_THRESHOLD,

            initializer_solver_time: 0.1,
            backend_solver_time_fraction: 0.6,
        }
    }
}
