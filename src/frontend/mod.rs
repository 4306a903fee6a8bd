//! Per-frame tracking state machine (§4.4): bootstraps a stereo map,
//! tracks subsequent frames against it via the frontend's [`FeatureTracker`]
//! collaborator plus this crate's own PnP-RANSAC ([`pnp`]), and promotes
//! frames to keyframes in [`crate::map::Map`] when tracking quality drops.

mod pnp;
mod tracker;

pub use pnp::PnpRansacParams;
pub use tracker::{FeatureTracker, StubTracker};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::camera::StereoCamera;
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::linalg::{dtype, Vector2, Vector3};
use crate::map::{Frame, Image, Landmark, Map};
use crate::residuals::{ImuCovariance, ImuPreintegrator};
use crate::sensor::SensorRegistry;
use crate::variables::{ImuBias, Variable, SE3};

/// The map, shared with the backend worker thread; every access goes
/// through [`Map`]'s own short critical sections (§5).
pub type SharedMap = Arc<Mutex<Map>>;

/// A [`Frontend`] shared with the backend, which takes this lock only
/// during `forward_propagate` (§5's "Frontend.mutex serializes frontend
/// mutation and backend-initiated forward propagation").
pub type SharedFrontend<T> = Arc<Mutex<Frontend<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendState {
    Building,
    Initializing,
    TrackingGood,
    TrackingBad,
    TrackingTry,
    Lost,
}

/// Per-frame tracking state machine plus the bookkeeping (`position_cache_`,
/// running IMU accumulation, live bias estimate) it needs between calls.
/// Generic over the pixel-level [`FeatureTracker`] collaborator so the
/// core never links against an actual vision library (§1).
pub struct Frontend<T: FeatureTracker> {
    config: Config,
    camera: StereoCamera,
    tracker: T,
    sensors: SensorRegistry,
    map: SharedMap,
    coordinator: Coordinator,

    state: FrontendState,
    try_count: u32,

    next_frame_id: u64,
    next_landmark_id: u64,
    last_keyframe_id: Option<u64>,

    last_frame: Option<Frame>,
    relative_motion: SE3,
    /// landmark id -> last-known world-frame position, refreshed by
    /// [`Frontend::update_cache`] at the end of each backend cycle so
    /// the next `track` call's PnP uses refined positions.
    position_cache: HashMap<u64, Vector3>,

    live_bias: ImuBias,
    imu_accum: Option<ImuPreintegrator>,
    last_imu_time: Option<dtype>,
}

impl<T: FeatureTracker> Frontend<T> {
    pub fn new(
        config: Config,
        camera: StereoCamera,
        tracker: T,
        sensors: SensorRegistry,
        map: SharedMap,
        coordinator: Coordinator,
    ) -> Self {
        Self {
            config,
            camera,
            tracker,
            sensors,
            map,
            coordinator,
            state: FrontendState::Building,
            try_count: 0,
            next_frame_id: 0,
            next_landmark_id: 0,
            last_keyframe_id: None,
            last_frame: None,
            relative_motion: SE3::identity(),
            position_cache: HashMap::new(),
            live_bias: ImuBias::zeros(),
            imu_accum: None,
            last_imu_time: None,
        }
    }

    pub fn state(&self) -> FrontendState {
        self.state
    }

    /// Accumulates one IMU sample into the running preintegration since
    /// the last keyframe (§6's `add_imu` entry point).
    pub fn add_imu(&mut self, time: dtype, accel: Vector3, gyro: Vector3) -> Result<()> {
        if !self.sensors.has_imu {
            return Ok(());
        }
        if let Some(prev) = self.last_imu_time {
            let dt = time - prev;
            if dt <= 0.0 {
                return Err(Error::NonMonotonicTime {
                    prev: prev as f64,
                    next: time as f64,
                });
            }
            let gravity = Vector3::new(0.0, 0.0, -self.config.gravity_mag);
            let bias = self.live_bias;
            let reint = self.config.imu_bias_reint_threshold;
            let accum = self.imu_accum.get_or_insert_with(|| {
                ImuPreintegrator::new(gravity, bias, ImuCovariance::default()).with_reint_threshold(reint)
            });
            accum.append(time, dt, accel, gyro)?;
        }
        self.last_imu_time = Some(time);
        Ok(())
    }

    /// Feeds one stereo pair through the state machine (§4.4). Returns
    /// the resulting state.
    pub fn add_frame(&mut self, image_left: Image, image_right: Image, time: dtype) -> Result<FrontendState> {
        let id = self.next_frame_id;
        self.next_frame_id += 1;

        let predicted_pose = match &self.last_frame {
            Some(last) => self.relative_motion.compose(&last.pose),
            None => SE3::identity(),
        };
        let mut frame = Frame::new(id, time, predicted_pose).with_images(image_left, image_right);
        frame.last_keyframe = self.last_keyframe_id;

        match self.state {
            FrontendState::Building | FrontendState::Initializing => {
                if self.stereo_init(&mut frame) {
                    self.state = FrontendState::TrackingGood;
                } else {
                    self.state = FrontendState::Initializing;
                }
            }
            FrontendState::Lost => {
                self.reset();
                self.state = FrontendState::Initializing;
            }
            FrontendState::TrackingGood | FrontendState::TrackingBad | FrontendState::TrackingTry => {
                let n = self.track(&mut frame)?;
                self.classify(n);
            }
        }

        Ok(self.state)
    }

    fn classify(&mut self, inliers: usize) {
        if inliers > self.config.num_features_tracking {
            self.state = FrontendState::TrackingGood;
            self.try_count = 0;
        } else if inliers > self.config.num_features_tracking_bad {
            self.state = FrontendState::TrackingBad;
            self.try_count = 0;
        } else {
            self.try_count += 1;
            self.state = if self.try_count >= self.config.max_consecutive_try {
                FrontendState::Lost
            } else {
                FrontendState::TrackingTry
            };
        }
    }

    /// Bootstraps the map from one stereo pair: detects features,
    /// matches them into the right image, triangulates, and (if enough
    /// survive) inserts the first keyframe (§4.4's `stereo_init`).
    fn stereo_init(&mut self, frame: &mut Frame) -> bool {
        let image_left = frame.image_left.as_ref().expect("frame built with_images");
        let image_right = frame.image_right.as_ref().expect("frame built with_images");

        let left_points = self.tracker.detect(image_left, &[], self.config.feature_exclusion_radius, self.config.num_features);
        let right_matches = self.tracker.match_stereo(image_left, image_right, &left_points);

        let mut new_landmarks = Vec::new();
        for (left_px, right_px) in left_points.iter().zip(right_matches.iter()) {
            let Some(right_px) = right_px else { continue };
            let Some(p_cam) = self.camera.triangulate(*left_px, *right_px) else { continue };
            if self.camera.reprojection_error(&p_cam, *left_px, Some(*right_px)) > self.config.triangulation_max_error {
                continue;
            }

            let lm_id = self.next_landmark_id;
            self.next_landmark_id += 1;
            let mut lm = Landmark::new(lm_id, p_cam, frame.id);
            lm.add_observation(frame.id, frame.time, true);
            lm.add_observation(frame.id, frame.time, false);
            frame.attach_feature_left(lm_id, *left_px);
            frame.attach_feature_right(lm_id, *right_px);
            new_landmarks.push(lm);
        }

        if new_landmarks.len() < self.config.num_features_init {
            return false;
        }

        frame.pose = SE3::identity();
        self.imu_accum = None;
        frame.preintegration = None;
        frame.b_imu = false;

        let finished_frame = frame.clone();
        self.map.lock().insert_keyframe(finished_frame.clone(), new_landmarks);
        self.coordinator.update_map();

        self.last_keyframe_id = Some(frame.id);
        self.last_frame = Some(finished_frame);
        self.relative_motion = SE3::identity();
        self.update_cache();
        true
    }

    /// Tracks `frame` against the previous frame's features (§4.4 steps
    /// 1-7), returning the PnP-RANSAC inlier count.
    fn track(&mut self, frame: &mut Frame) -> Result<usize> {
        let last = self.last_frame.as_ref().expect("tracking state requires a previous frame").clone();
        let prev_image = last.image_left.as_ref().expect("previous frame retained its image");
        let cur_image = frame.image_left.as_ref().expect("frame built with_images").clone();

        let prev_points: Vec<(u64, Vector2)> = last
            .features_left
            .iter()
            .map(|(&lm_id, f)| (lm_id, f.keypoint))
            .collect();

        let tracked = self.tracker.track(prev_image, &prev_points, &cur_image, self.config.lk_levels, self.config.lk_window);

        let mut correspondences = Vec::with_capacity(tracked.len());
        for (lm_id, px) in &tracked {
            if let Some(world_point) = self.position_cache.get(lm_id) {
                correspondences.push((*world_point, *px));
            }
        }

        let params = PnpRansacParams {
            iterations: self.config.pnp_ransac_iterations,
            threshold_px: self.config.pnp_ransac_threshold_px,
            confidence: self.config.pnp_ransac_confidence,
            min_sample: 6,
        };

        let (refined_pose, inliers) = match pnp::solve(&correspondences, &self.camera, frame.pose, &params) {
            Some(result) => result,
            None => (frame.pose, Vec::new()),
        };
        frame.pose = refined_pose;

        for &idx in &inliers {
            let (lm_id, px) = tracked[idx];
            frame.attach_feature_left(lm_id, px);
        }

        let motion = frame.pose.ominus(&last.pose).norm();
        if motion > self.config.max_motion_per_frame {
            frame.pose = last.pose;
        }

        self.relative_motion = frame.pose.compose(&last.pose.inverse());

        let n = inliers.len();
        if n < self.config.num_features_needed_for_keyframe {
            self.create_keyframe(frame.clone());
        } else {
            // Not promoted: the frontend's own copy of this frame keeps its
            // images only until the next frame replaces it as `last_frame`
            // (needed as the LK reference); Map never sees it at all.
            self.last_frame = Some(frame.clone());
        }

        Ok(n)
    }

    /// Promotes `frame` to a keyframe (§4.4's `create_keyframe`): records
    /// observations on its existing features' landmarks, detects and
    /// triangulates new ones, and inserts into the map.
    fn create_keyframe(&mut self, mut frame: Frame) {
        {
            let mut map = self.map.lock();
            for &lm_id in frame.features_left.keys() {
                if let Some(lm) = map.get_landmark_mut(lm_id) {
                    lm.add_observation(frame.id, frame.time, true);
                }
            }
        }

        let image_left = frame.image_left.clone().expect("keyframe retains its images until insertion");
        let image_right = frame.image_right.clone().expect("keyframe retains its images until insertion");

        let exclude: Vec<Vector2> = frame.features_left.values().map(|f| f.keypoint).collect();
        let max_new = self.config.num_features.saturating_sub(frame.feature_count());
        let new_points = self.tracker.detect(&image_left, &exclude, self.config.feature_exclusion_radius, max_new);
        let right_matches = self.tracker.match_stereo(&image_left, &image_right, &new_points);

        let mut new_landmarks = Vec::new();
        for (left_px, right_px) in new_points.iter().zip(right_matches.iter()) {
            let Some(right_px) = right_px else { continue };
            let Some(p_cam) = self.camera.triangulate(*left_px, *right_px) else { continue };
            if self.camera.reprojection_error(&p_cam, *left_px, Some(*right_px)) > self.config.triangulation_max_error {
                continue;
            }

            let lm_id = self.next_landmark_id;
            self.next_landmark_id += 1;
            let mut lm = Landmark::new(lm_id, p_cam, frame.id);
            lm.add_observation(frame.id, frame.time, true);
            lm.add_observation(frame.id, frame.time, false);
            frame.attach_feature_left(lm_id, *left_px);
            frame.attach_feature_right(lm_id, *right_px);
            new_landmarks.push(lm);
        }

        frame.preintegration = self.imu_accum.take();
        frame.b_imu = self.sensors.has_imu && frame.preintegration.is_some();
        frame.last_keyframe = self.last_keyframe_id;

        let finished_frame = frame.clone();
        self.map.lock().insert_keyframe(finished_frame.clone(), new_landmarks);
        self.coordinator.update_map();

        self.last_keyframe_id = Some(frame.id);
        self.last_frame = Some(finished_frame);
        self.update_cache();
    }

    /// Recomputes `position_cache_` from `last_frame`'s left features
    /// against the map's current landmark positions, expressed in world
    /// coordinates via each landmark's reference frame pose.
    pub fn update_cache(&mut self) {
        let Some(last) = &self.last_frame else { return };
        let map = self.map.lock();
        let mut cache = HashMap::with_capacity(last.features_left.len());
        for &lm_id in last.features_left.keys() {
            let Some(lm) = map.get_landmark(lm_id) else { continue };
            let Some(reference) = map.get_frame(lm.reference_frame) else { continue };
            cache.insert(lm_id, reference.pose.apply(&lm.position));
        }
        drop(map);
        self.position_cache = cache;
    }

    /// Hard reset after `LOST` (§4.4): pauses the backend, clears the
    /// map, and resumes it.
    pub fn reset(&mut self) {
        self.coordinator.pause();
        self.map.lock().reset();
        self.coordinator.resume();

        self.try_count = 0;
        self.last_keyframe_id = None;
        self.last_frame = None;
        self.relative_motion = SE3::identity();
        self.position_cache.clear();
        self.imu_accum = None;
        self.last_imu_time = None;
    }

    pub fn live_bias(&self) -> ImuBias {
        self.live_bias
    }

    pub fn set_live_bias(&mut self, bias: ImuBias) {
        self.live_bias = bias;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::camera::Intrinsics;

    fn camera() -> StereoCamera {
        StereoCamera {
            left: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            right: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            baseline: 0.1,
            t_cam_imu: SE3::identity(),
        }
    }

    fn blank_image() -> Image {
        Image::new(640, 480, Arc::from(vec![0u8; 640 * 480]))
    }

    struct FixedTracker {
        left: Vec<Vector2>,
        right: Vec<Option<Vector2>>,
    }

    impl std::fmt::Debug for FixedTracker {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FixedTracker").finish()
        }
    }

    impl FeatureTracker for FixedTracker {
        fn track(
            &self,
            _prev_image: &Image,
            prev: &[(u64, Vector2)],
            _cur_image: &Image,
            _pyramid_levels: usize,
            _window: usize,
        ) -> Vec<(u64, Vector2)> {
            prev.to_vec()
        }

        fn detect(&self, _image: &Image, _exclude: &[Vector2], _exclusion_radius: dtype, max_count: usize) -> Vec<Vector2> {
            self.left.iter().take(max_count).cloned().collect()
        }

        fn match_stereo(&self, _left: &Image, _right: &Image, left_points: &[Vector2]) -> Vec<Option<Vector2>> {
            self.right.iter().take(left_points.len()).cloned().collect()
        }
    }

    fn synthetic_tracker(cam: &StereoCamera, n: usize) -> FixedTracker {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for i in 0..n {
            let p = Vector3::new((i as dtype - n as dtype / 2.0) * 0.05, 0.02 * i as dtype, 3.0 + 0.02 * i as dtype);
            left.push(cam.project_left(&p));
            right.push(Some(cam.project_right(&p)));
        }
        FixedTracker { left, right }
    }

    #[test]
    fn first_frame_with_enough_matches_boots_to_tracking_good() {
        let cam = camera();
        let tracker = synthetic_tracker(&cam, 120);
        let mut config = Config::default();
        config.num_features_init = 100;

        let map: SharedMap = Arc::new(Mutex::new(Map::new()));
        let mut frontend = Frontend::new(config, cam, tracker, SensorRegistry::vision_only(), map.clone(), Coordinator::new());

        let state = frontend.add_frame(blank_image(), blank_image(), 0.0).unwrap();
        assert_eq!(state, FrontendState::TrackingGood);
        assert_eq!(map.lock().keyframe_count(), 1);
        assert!(map.lock().landmark_count() >= 100);
    }

    #[test]
    fn too_few_matches_stays_initializing() {
        let cam = camera();
        let tracker = synthetic_tracker(&cam, 10);
        let config = Config::default();

        let map: SharedMap = Arc::new(Mutex::new(Map::new()));
        let mut frontend = Frontend::new(config, cam, tracker, SensorRegistry::vision_only(), map.clone(), Coordinator::new());

        let state = frontend.add_frame(blank_image(), blank_image(), 0.0).unwrap();
        assert_eq!(state, FrontendState::Initializing);
        assert_eq!(map.lock().keyframe_count(), 0);
    }
}
