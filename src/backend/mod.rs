//! The sliding-window backend worker (§4.6): a dedicated thread that
//! repeatedly takes the oldest unfinished slice of the map, bundle-adjusts
//! it (reprojection plus, once initialized, IMU factors), re-anchors the
//! result to remove the solve's gauge freedom, prunes outliers, hands the
//! window to any external collaborators, and forward-propagates the
//! correction into everything tracked since.

use std::collections::HashSet;
use std::time::Duration;

use crate::camera::StereoCamera;
use crate::collaborators::{DefaultPoseGraph, LidarMapping, Navsat, NullLidar, NullNavsat, PoseGraph};
use crate::config::Config;
use crate::containers::{key, Factor, Graph, Values};
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::frontend::{FeatureTracker, SharedFrontend, SharedMap};
use crate::initializer::{self, InitializerResult, InitializerState};
use crate::linalg::{dtype, VectorX};
use crate::map::{Frame, Map};
use crate::noise::UnitNoise;
use crate::optimizers::{Dogleg, OptParams, Optimizer};
use crate::residuals::{ImuError, PoseOnlyReprojection, TwoFrameReprojection};
use crate::robust::Huber;
use crate::sensor::SensorRegistry;
use crate::variables::{ImuBias, Variable, VectorVar3, SO3, SE3};

/// Slack added past a window's end time when forward-propagating, so the
/// half-open `[time, ...)` map query picks up the frame the window ended
/// on rather than stopping just short of it.
const EPS: dtype = 1e-6;

/// `|R[2,0]|` above which the first active keyframe's pitch is within
/// about 2.5 degrees of gimbal lock and a yaw-only gauge correction would
/// be ill-conditioned (§4.6 step 6's "near +-90 degrees pitch" exception).
const GIMBAL_LOCK_THRESHOLD: dtype = 0.999;

/// Owns the sliding-window optimizer and everything it needs to run as a
/// dedicated worker: the shared map and frontend, the pause/resume
/// handshake, the collaborator slots, and the session-wide inertial
/// state the staged initializer fills in once.
pub struct Backend<T: FeatureTracker> {
    config: Config,
    camera: StereoCamera,
    sensors: SensorRegistry,

    map: SharedMap,
    frontend: SharedFrontend<T>,
    coordinator: Coordinator,

    lidar: Box<dyn LidarMapping>,
    navsat: Box<dyn Navsat>,
    pose_graph: Box<dyn PoseGraph>,

    init_state: InitializerState,
    gravity_rot: SO3,

    /// Start of the next window to optimize; everything before this has
    /// already been folded into a previous cycle.
    finished: dtype,
    /// Earliest time eligible for the staged initializer, reset whenever
    /// the frontend declares `LOST` and resets the map.
    valid_time: dtype,
}

impl<T: FeatureTracker> Backend<T> {
    pub fn new(
        config: Config,
        camera: StereoCamera,
        sensors: SensorRegistry,
        map: SharedMap,
        frontend: SharedFrontend<T>,
        coordinator: Coordinator,
    ) -> Self {
        Self {
            config,
            camera,
            sensors,
            map,
            frontend,
            coordinator,
            lidar: Box::new(NullLidar),
            navsat: Box::new(NullNavsat),
            pose_graph: Box::new(DefaultPoseGraph),
            init_state: InitializerState::default(),
            gravity_rot: SO3::identity(),
            finished: 0.0,
            valid_time: 0.0,
        }
    }

    pub fn with_lidar(mut self, lidar: Box<dyn LidarMapping>) -> Self {
        self.lidar = lidar;
        self
    }

    pub fn with_navsat(mut self, navsat: Box<dyn Navsat>) -> Self {
        self.navsat = navsat;
        self
    }

    pub fn with_pose_graph(mut self, pose_graph: Box<dyn PoseGraph>) -> Self {
        self.pose_graph = pose_graph;
        self
    }

    pub fn init_state(&self) -> InitializerState {
        self.init_state
    }

    /// Re-arms the staged initializer and clears `finished`/`valid_time`
    /// after a driver-observed `LOST` reset (§4.4), so a later call to
    /// [`Backend::step`] doesn't try to bundle-adjust frames from a
    /// session the map no longer has.
    pub fn on_map_reset(&mut self, t: dtype) {
        self.init_state = InitializerState::default();
        self.gravity_rot = SO3::identity();
        self.finished = t;
        self.valid_time = t;
    }

    /// Runs the worker loop: wakes on a map update (polling on a timeout
    /// so a pending pause request is still serviced promptly), honors the
    /// pause request, and runs one optimize cycle.
    pub fn run(mut self) {
        loop {
            self.coordinator.wait_for_map_update(Duration::from_millis(100));
            self.coordinator.honor_pause_request();
            if let Err(e) = self.step() {
                log::warn!("backend cycle failed: {e}");
            }
        }
    }

    /// One full cycle of §4.6: snapshot the window, bundle-adjust it,
    /// re-anchor, prune outliers, hand off to collaborators, then
    /// propagate the correction forward and advance the window.
    pub fn step(&mut self) -> Result<()> {
        self.coordinator.honor_pause_request();

        let active_kfs = {
            let map = self.map.lock();
            map.get_keyframes(self.finished, None, None)
        };
        if active_kfs.is_empty() {
            return Ok(());
        }

        let old_pose = active_kfs.last().expect("checked non-empty").pose;
        let old_pose_imu = active_kfs.first().expect("checked non-empty").pose;
        let end_time = active_kfs.last().expect("checked non-empty").time;

        let mut values = Values::new();
        let mut graph = Graph::new();
        {
            let map = self.map.lock();
            self.build_problem(&active_kfs, &map, &mut values, &mut graph, true);
        }

        let mut opt = Dogleg::default().with_params(OptParams {
            max_solver_time: Some(Duration::from_secs_f64(
                self.config.window_size * self.config.backend_solver_time_fraction,
            )),
            ..OptParams::default()
        });
        if let Err(e) = opt.optimize(&graph, &mut values) {
            log::warn!("backend solve did not converge: {e}");
        }

        let mut refined = self.write_back(&active_kfs, &values);

        if self.init_state.initialized {
            self.recover_data(&mut refined, old_pose_imu);
        }

        {
            let mut map = self.map.lock();
            self.outlier_cleanup(&mut map, &refined);
        }

        self.lidar.optimize(&mut refined);

        if self.navsat.is_initialized() {
            if let Some(start_time) = self.navsat.optimize(end_time) {
                log::info!("navsat requests mapping keyframes re-expressed from t={start_time:.3}");
            }
        }

        {
            let mut map = self.map.lock();
            for frame in &refined {
                if let Some(stored) = map.get_frame_mut(frame.id) {
                    *stored = frame.clone();
                }
            }
        }

        let new_last_pose = refined.last().map(|f| f.pose).unwrap_or(old_pose);
        let transform = new_last_pose.compose(&old_pose.inverse());

        self.forward_propagate(transform, end_time + EPS);

        self.finished = end_time - self.config.window_size;
        log::info!(
            "backend cycle: window=[{:.3},{:.3}] kfs={} finished={:.3}",
            active_kfs.first().expect("checked non-empty").time,
            end_time,
            active_kfs.len(),
            self.finished
        );
        Ok(())
    }

    /// Builds the bundle-adjustment problem over `active_kfs` (§4.6's
    /// `build_problem`): every pose in the window is free, each left-image
    /// feature contributes a [`PoseOnlyReprojection`] (its landmark's
    /// first-seen frame lies before the window) or [`TwoFrameReprojection`]
    /// (first-seen frame is itself in the window), robustified with
    /// [`Huber`]; consecutive keyframe pairs get an [`ImuError`] weighted by
    /// that pair's [`ImuPreintegrator::noise_model`](crate::residuals::imu_preint::ImuPreintegrator::noise_model)
    /// once the initializer has run and `use_imu` is set.
    fn build_problem(
        &self,
        active_kfs: &[Frame],
        map: &Map,
        values: &mut Values,
        graph: &mut Graph,
        use_imu: bool,
    ) {
        let window_start = active_kfs.first().map(|f| f.time).unwrap_or(0.0);

        for kf in active_kfs {
            values.insert(key::pose(kf.id), kf.pose);
        }

        for kf in active_kfs {
            for (&lm_id, feature) in &kf.features_left {
                let Some(lm) = map.get_landmark(lm_id) else { continue };
                let Some(first_id) = lm.first_frame() else { continue };
                if first_id == kf.id {
                    continue;
                }
                let Some(first_frame) = map.get_frame(first_id) else { continue };

                if first_frame.time < window_start {
                    let world_point = first_frame.pose.apply(&lm.position);
                    graph.add_factor(Factor::new_full(
                        Box::new(PoseOnlyReprojection::new(key::pose(kf.id), feature.keypoint, world_point, self.camera)),
                        Box::new(UnitNoise::new(2)),
                        Box::new(Huber::new(1.0)),
                    ));
                } else {
                    graph.add_factor(Factor::new_full(
                        Box::new(TwoFrameReprojection::new(
                            key::pose(first_id),
                            key::pose(kf.id),
                            lm.position,
                            feature.keypoint,
                            self.camera,
                        )),
                        Box::new(UnitNoise::new(2)),
                        Box::new(Huber::new(1.0)),
                    ));
                }
            }
        }

        if !use_imu || !self.init_state.initialized {
            return;
        }

        for pair in active_kfs.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            if !prev.b_imu || !cur.b_imu {
                continue;
            }
            let Some(preint) = &cur.preintegration else { continue };

            for kf in [prev, cur] {
                if !values.contains(&key::vel(kf.id)) {
                    values.insert(key::vel(kf.id), VectorVar3::new(kf.velocity));
                }
                if !values.contains(&key::bias_acc(kf.id)) {
                    values.insert(key::bias_acc(kf.id), VectorVar3::new(kf.imu_bias.acc));
                }
                if !values.contains(&key::bias_gyro(kf.id)) {
                    values.insert(key::bias_gyro(kf.id), VectorVar3::new(kf.imu_bias.gyro));
                }
            }

            graph.add_factor(Factor::gaussian(
                Box::new(ImuError::new(
                    key::pose(prev.id),
                    key::vel(prev.id),
                    key::bias_acc(prev.id),
                    key::bias_gyro(prev.id),
                    key::pose(cur.id),
                    key::vel(cur.id),
                    key::bias_acc(cur.id),
                    key::bias_gyro(cur.id),
                    preint.delta.clone(),
                )),
                preint.noise_model(),
            ));
        }
    }

    /// Copies the solved values back into cloned [`Frame`]s, leaving
    /// anything a factor never touched (no IMU factor reached it, say) at
    /// its pre-solve value.
    fn write_back(&self, active_kfs: &[Frame], values: &Values) -> Vec<Frame> {
        active_kfs
            .iter()
            .cloned()
            .map(|mut kf| {
                if let Some(pose) = values.get_cast::<SE3>(&key::pose(kf.id)) {
                    kf.pose = *pose;
                }
                if let Some(vel) = values.get_cast::<VectorVar3>(&key::vel(kf.id)) {
                    kf.velocity = vel.0;
                }
                let ba = values.get_cast::<VectorVar3>(&key::bias_acc(kf.id));
                let bg = values.get_cast::<VectorVar3>(&key::bias_gyro(kf.id));
                if let (Some(ba), Some(bg)) = (ba, bg) {
                    kf.imu_bias = ImuBias::new(ba.0, bg.0);
                    if let Some(preint) = &mut kf.preintegration {
                        preint.set_new_bias(kf.imu_bias);
                    }
                }
                kf
            })
            .collect()
    }

    /// Undoes the solve's gauge freedom (§4.6 step 6): the window's first
    /// keyframe should come back out exactly where it went in, so the
    /// rest of the window is corrected by the rotation/translation that
    /// would take the solver's new estimate of that frame back to
    /// `old_pose_imu`. Ordinarily only the yaw component of that rotation
    /// is applied, since pitch/roll are meant to stay IMU-observable; but
    /// when the frame's pitch is near +-90 degrees, yaw alone is nearly
    /// degenerate about the frame's own up-axis, so the full rotation
    /// delta is used instead.
    fn recover_data(&self, active_kfs: &mut [Frame], old_pose_imu: SE3) {
        let Some(new_pose_imu) = active_kfs.first().map(|f| f.pose) else { return };

        let rot_delta = old_pose_imu.rot.compose(&new_pose_imu.rot.inverse());
        let r = rot_delta.to_matrix();

        let gauge_rot = if r[(2, 0)].abs() > GIMBAL_LOCK_THRESHOLD {
            rot_delta
        } else {
            let yaw = r[(1, 0)].atan2(r[(0, 0)]);
            SO3::exp(&VectorX::from_column_slice(&[0.0, 0.0, yaw]))
        };
        let gauge_pos = old_pose_imu.xyz - gauge_rot.apply(&new_pose_imu.xyz);
        let gauge = SE3::new(gauge_rot, gauge_pos);

        for frame in active_kfs.iter_mut() {
            if frame.b_imu {
                frame.pose = gauge.compose(&frame.pose);
            }
        }
    }

    /// Post-solve cleanup (§4.6 step 7): detaches any left-image feature
    /// whose reprojection error against the refined geometry exceeds
    /// [`Config::outlier_reprojection_threshold`], then removes any
    /// landmark [`crate::map::Landmark::should_cull`] now calls dead
    /// weight (down to at most one observation, and that one isn't the
    /// window's last/live keyframe).
    fn outlier_cleanup(&self, map: &mut Map, active_kfs: &[Frame]) {
        let Some(live_frame) = active_kfs.last().map(|f| f.id) else { return };

        let mut to_detach: Vec<(u64, u64)> = Vec::new();
        for kf in active_kfs {
            for (&lm_id, feature) in &kf.features_left {
                let Some(lm) = map.get_landmark(lm_id) else { continue };
                if lm.reference_frame == kf.id {
                    continue;
                }
                let Some(reference) = map.get_frame(lm.reference_frame) else { continue };
                let world_point = reference.pose.apply(&lm.position);
                let p_cam = kf.pose.inverse().apply(&world_point);
                let err = self.camera.reprojection_error(&p_cam, feature.keypoint, None);
                if err > self.config.outlier_reprojection_threshold {
                    to_detach.push((kf.id, lm_id));
                }
            }
        }

        let mut touched: HashSet<u64> = HashSet::new();
        for (frame_id, lm_id) in to_detach {
            if let Some(frame) = map.get_frame_mut(frame_id) {
                frame.detach_feature(lm_id);
            }
            if let Some(lm) = map.get_landmark_mut(lm_id) {
                lm.remove_observation(frame_id);
            }
            touched.insert(lm_id);
        }

        for lm_id in touched {
            let should_remove = map.get_landmark(lm_id).map(|lm| lm.should_cull(live_frame)).unwrap_or(false);
            if should_remove {
                map.remove_landmark(lm_id);
            }
        }
    }

    /// Applies the window correction to every keyframe recorded since the
    /// window closed (§4.6 step 10): re-attempts the staged initializer if
    /// it hasn't succeeded yet, otherwise applies the pose-graph's
    /// `propagate`; stabilizes the result with a single visual-only solver
    /// step; once initialized, re-predicts each keyframe from its
    /// preintegration and refines IMU state with the first propagated
    /// frame held fixed; then hands the live bias estimate back to the
    /// frontend.
    fn forward_propagate(&mut self, transform: SE3, time: dtype) {
        let mut frontend = self.frontend.lock();

        let mut active_kfs = {
            let map = self.map.lock();
            map.get_keyframes(time, None, None)
        };
        if active_kfs.is_empty() {
            frontend.update_cache();
            return;
        }

        let ran_initializer = match self.try_initializer(&active_kfs) {
            Some(result) => {
                self.apply_initializer_result(&mut active_kfs, &result);
                true
            }
            None => false,
        };

        if !ran_initializer {
            self.pose_graph.propagate(transform, &mut active_kfs);
        }

        {
            let map = self.map.lock();
            let mut values = Values::new();
            let mut graph = Graph::new();
            self.build_problem(&active_kfs, &map, &mut values, &mut graph, false);
            drop(map);

            if !graph.is_empty() {
                let mut opt = Dogleg::default();
                let _ = opt.step(&graph, &mut values);
                for kf in active_kfs.iter_mut() {
                    if let Some(pose) = values.get_cast::<SE3>(&key::pose(kf.id)) {
                        kf.pose = *pose;
                    }
                }
            }
        }

        if self.init_state.initialized {
            let prev = {
                let map = self.map.lock();
                let before = active_kfs.first().expect("checked non-empty").time;
                map.get_keyframes(dtype::NEG_INFINITY, Some(before), None).into_iter().last()
            };
            self.repredict_with_imu(prev, &mut active_kfs);
            self.imu_only_refine(&mut active_kfs);
        }

        {
            let mut map = self.map.lock();
            for frame in &active_kfs {
                if let Some(stored) = map.get_frame_mut(frame.id) {
                    *stored = frame.clone();
                }
            }
        }

        if let Some(last) = active_kfs.last() {
            frontend.set_live_bias(last.imu_bias);
        }
        frontend.update_cache();
    }

    /// One-shot attempt at the staged inertial initializer (§4.5) over
    /// the earliest [`Config::initializer_num_frames`] of `active_kfs`,
    /// gated by [`InitializerState::stage`]. A no-op once initialized.
    fn try_initializer(&mut self, active_kfs: &[Frame]) -> Option<InitializerResult> {
        if !self.sensors.has_imu || self.init_state.initialized {
            return None;
        }
        if active_kfs.len() < self.config.initializer_num_frames {
            return None;
        }

        let now = active_kfs.last().expect("checked non-empty").time;
        let priors = self.init_state.stage(now, self.valid_time)?;

        let window = &active_kfs[..self.config.initializer_num_frames];
        let result = initializer::try_initialize(window, priors, self.config.gravity_mag, self.config.initializer_solver_time)?;

        self.gravity_rot = result.gravity_rot;
        self.init_state.initialized = true;
        self.init_state.t_init = Some(window.last().expect("non-empty window").time);
        Some(result)
    }

    fn apply_initializer_result(&self, active_kfs: &mut [Frame], result: &InitializerResult) {
        for kf in active_kfs.iter_mut() {
            kf.imu_bias = result.bias;
            if let Some(preint) = &mut kf.preintegration {
                preint.set_new_bias(kf.imu_bias);
                kf.b_imu = true;
            }
            if let Some(&v) = result.velocities.get(&kf.id) {
                kf.velocity = v;
            }
        }
    }

    /// Re-derives each keyframe's pose/velocity by chaining the previous
    /// keyframe's (possibly just-refined) state through its
    /// [`ImuPreintegrator`](crate::residuals::ImuPreintegrator)'s
    /// bias-corrected delta accessors, using that previous frame's bias
    /// rather than the current live estimate.
    fn repredict_with_imu(&self, prev: Option<Frame>, active_kfs: &mut [Frame]) {
        let mut prev = prev;
        for kf in active_kfs.iter_mut() {
            if let (Some(prev_frame), Some(preint)) = (&prev, &kf.preintegration) {
                let bias = prev_frame.imu_bias;
                let d_rot = preint.get_delta_rotation(&bias);
                let d_vel = preint.get_delta_velocity(&bias);
                let d_pos = preint.get_delta_position(&bias);
                let dt = preint.delta.sum_dt;
                let gravity = preint.delta.gravity;

                let rot = prev_frame.pose.rot.compose(&d_rot);
                let vel = prev_frame.velocity + gravity * dt + prev_frame.pose.rot.apply(&d_vel);
                let pos = prev_frame.pose.xyz
                    + prev_frame.velocity * dt
                    + 0.5 * gravity * dt * dt
                    + prev_frame.pose.rot.apply(&d_pos);

                kf.pose = SE3::new(rot, pos);
                kf.velocity = vel;
            }
            prev = Some(kf.clone());
        }
    }

    /// Fixed-anchor IMU-only refinement (§4.6 step 7 of
    /// `forward_propagate`): the first propagated keyframe is held fixed
    /// via a tight prior so the whole forward set doesn't drift, and the
    /// rest are refined against [`ImuError`] factors alone.
    fn imu_only_refine(&self, active_kfs: &mut [Frame]) {
        if active_kfs.len() < 2 {
            return;
        }

        let anchor = &active_kfs[0];
        let mut values = Values::new();
        let mut graph = Graph::new();

        values.insert(key::pose(anchor.id), anchor.pose);
        values.insert(key::vel(anchor.id), VectorVar3::new(anchor.velocity));
        values.insert(key::bias_acc(anchor.id), VectorVar3::new(anchor.imu_bias.acc));
        values.insert(key::bias_gyro(anchor.id), VectorVar3::new(anchor.imu_bias.gyro));
        graph.add_factor(Factor::gaussian(
            Box::new(crate::residuals::PriorResidual::new(key::pose(anchor.id), anchor.pose)),
            crate::noise::GaussianNoise::from_scalar_sigma(6, 1e-6),
        ));
        graph.add_factor(Factor::gaussian(
            Box::new(crate::residuals::PriorResidual::new(key::vel(anchor.id), VectorVar3::new(anchor.velocity))),
            crate::noise::GaussianNoise::from_scalar_sigma(3, 1e-6),
        ));

        for kf in &active_kfs[1..] {
            values.insert(key::pose(kf.id), kf.pose);
            values.insert(key::vel(kf.id), VectorVar3::new(kf.velocity));
            values.insert(key::bias_acc(kf.id), VectorVar3::new(kf.imu_bias.acc));
            values.insert(key::bias_gyro(kf.id), VectorVar3::new(kf.imu_bias.gyro));
        }

        for pair in active_kfs.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let Some(preint) = &cur.preintegration else { continue };
            graph.add_factor(Factor::gaussian(
                Box::new(ImuError::new(
                    key::pose(prev.id),
                    key::vel(prev.id),
                    key::bias_acc(prev.id),
                    key::bias_gyro(prev.id),
                    key::pose(cur.id),
                    key::vel(cur.id),
                    key::bias_acc(cur.id),
                    key::bias_gyro(cur.id),
                    preint.delta.clone(),
                )),
                preint.noise_model(),
            ));
        }

        if graph.is_empty() {
            return;
        }

        let mut opt = Dogleg::default();
        if opt.optimize(&graph, &mut values).is_err() {
            return;
        }

        for kf in active_kfs.iter_mut() {
            if let Some(pose) = values.get_cast::<SE3>(&key::pose(kf.id)) {
                kf.pose = *pose;
            }
            if let Some(vel) = values.get_cast::<VectorVar3>(&key::vel(kf.id)) {
                kf.velocity = vel.0;
            }
            let ba = values.get_cast::<VectorVar3>(&key::bias_acc(kf.id));
            let bg = values.get_cast::<VectorVar3>(&key::bias_gyro(kf.id));
            if let (Some(ba), Some(bg)) = (ba, bg) {
                kf.imu_bias = ImuBias::new(ba.0, bg.0);
                if let Some(preint) = &mut kf.preintegration {
                    preint.set_new_bias(kf.imu_bias);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Intrinsics;
    use crate::frontend::{Frontend, StubTracker};
    use crate::map::Landmark;
    use std::sync::Arc;

    use parking_lot::Mutex;

    fn camera() -> StereoCamera {
        StereoCamera {
            left: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            right: Intrinsics { fx: 400.0, fy: 400.0, cx: 320.0, cy: 240.0 },
            baseline: 0.1,
            t_cam_imu: SE3::identity(),
        }
    }

    fn backend_over(map: SharedMap, camera: StereoCamera) -> Backend<StubTracker> {
        let config = Config::default();
        let frontend = Arc::new(Mutex::new(Frontend::new(
            config,
            camera,
            StubTracker::default(),
            SensorRegistry::vision_only(),
            map.clone(),
            Coordinator::new(),
        )));
        Backend::new(config, camera, SensorRegistry::vision_only(), map, frontend, Coordinator::new())
    }

    fn seed_two_keyframe_window(map: &SharedMap, cam: &StereoCamera) {
        let p = crate::linalg::Vector3::new(0.1, -0.05, 3.0);
        let obs0 = cam.project_left(&p);
        let pose1 = SE3::new(SO3::identity(), crate::linalg::Vector3::new(0.2, 0.0, 0.0));
        let obs1 = cam.project_left(&pose1.inverse().apply(&p));

        let mut f0 = Frame::new(0, 0.0, SE3::identity());
        f0.attach_feature_left(0, obs0);
        let mut lm = Landmark::new(0, p, 0);
        lm.add_observation(0, 0.0, true);
        lm.add_observation(1, 1.0, true);

        let mut f1 = Frame::new(1, 1.0, pose1);
        f1.attach_feature_left(0, obs1);

        let mut map = map.lock();
        map.insert_keyframe(f0, vec![lm]);
        map.insert_keyframe(f1, vec![]);
    }

    #[test]
    fn step_is_a_no_op_on_an_empty_map() {
        let map: SharedMap = Arc::new(Mutex::new(Map::new()));
        let cam = camera();
        let mut backend = backend_over(map, cam);
        assert!(backend.step().is_ok());
    }

    #[test]
    fn step_refines_a_two_keyframe_window_without_panicking() {
        let map: SharedMap = Arc::new(Mutex::new(Map::new()));
        let cam = camera();
        seed_two_keyframe_window(&map, &cam);
        let mut backend = backend_over(map.clone(), cam);

        assert!(backend.step().is_ok());
        assert_eq!(map.lock().keyframe_count(), 2);
    }

    #[test]
    fn outlier_cleanup_detaches_far_off_reprojections() {
        let map_arc: SharedMap = Arc::new(Mutex::new(Map::new()));
        let cam = camera();
        let backend = backend_over(map_arc.clone(), cam);

        let mut f0 = Frame::new(0, 0.0, SE3::identity());
        let mut f1 = Frame::new(1, 1.0, SE3::identity());
        f1.attach_feature_left(0, crate::linalg::Vector2::new(0.0, 0.0)); // nowhere near the true projection
        let mut lm = Landmark::new(0, crate::linalg::Vector3::new(0.0, 0.0, 3.0), 0);
        lm.add_observation(0, 0.0, true);
        lm.add_observation(1, 1.0, true);

        {
            let mut map = map_arc.lock();
            map.insert_keyframe(f0.clone(), vec![lm]);
            map.insert_keyframe(f1.clone(), vec![]);
        }
        f0.attach_feature_left(0, cam.project_left(&crate::linalg::Vector3::new(0.0, 0.0, 3.0)));

        {
            let mut map = map_arc.lock();
            backend.outlier_cleanup(&mut map, &[f0, f1]);
            assert!(!map.get_frame(1).unwrap().features_left.contains_key(&0));
        }
    }

    #[test]
    fn recover_data_preserves_the_anchor_frames_position() {
        let map_arc: SharedMap = Arc::new(Mutex::new(Map::new()));
        let cam = camera();
        let backend = backend_over(map_arc, cam);

        let old_pose_imu = SE3::new(SO3::identity(), crate::linalg::Vector3::new(1.0, 2.0, 3.0));
        let drifted_first = SE3::new(
            SO3::exp(&VectorX::from_column_slice(&[0.0, 0.0, 0.3])),
            crate::linalg::Vector3::new(1.1, 2.1, 3.0),
        );
        let mut frames = vec![Frame::new(0, 0.0, drifted_first)];
        frames[0].b_imu = true;

        backend.recover_data(&mut frames, old_pose_imu);
        assert!((frames[0].pose.xyz - old_pose_imu.xyz).norm() < 1e-9);
    }
}
