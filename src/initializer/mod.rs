//! The staged inertial initializer (§4.5): aligns gravity and solves for
//! a single session-wide IMU bias and per-keyframe velocity from a
//! window of already-estimated visual poses plus their preintegrations.
//! Poses are taken as fixed; only velocities, bias, and the
//! gravity-to-visual-frame rotation are free.

use std::time::Duration;

use crate::containers::{key, Factor, Graph, Values};
use crate::linalg::{dtype, Vector3};
use crate::map::Frame;
use crate::noise::GaussianNoise;
use crate::optimizers::{Dogleg, OptParams, Optimizer};
use crate::residuals::{ImuErrorG, PriorResidual};
use crate::variables::{ImuBias, Variable, VectorVar3, SO3};

/// The staged time-gated schedule flags owned by the backend
/// (`initialized`/`reinit`/`init_a`/`init_b`/`Tinit` in the spec's
/// window-and-cursors data model).
#[derive(Debug, Clone, Copy)]
pub struct InitializerState {
    pub initialized: bool,
    pub reinit: bool,
    pub init_a: bool,
    pub init_b: bool,
    /// `None` before the first successful run (the spec's `Tinit = -1`).
    pub t_init: Option<dtype>,
}

impl Default for InitializerState {
    fn default() -> Self {
        Self {
            initialized: false,
            reinit: false,
            init_a: false,
            init_b: false,
            t_init: None,
        }
    }
}

/// Gaussian sigma attached to the bias-magnitude priors this run. A
/// sigma of zero means "no prior" (infinite uncertainty), not a
/// zero-uncertainty pin, so [`try_initialize`] skips adding that factor
/// entirely rather than dividing by it.
#[derive(Debug, Clone, Copy)]
pub struct BiasPriors {
    pub sigma_accel: dtype,
    pub sigma_gyro: dtype,
}

impl InitializerState {
    /// Decides whether the staged schedule wants an attempt at `now`,
    /// measuring elapsed time from `window_start` (the earliest frame in
    /// the current sliding window). `t < 5s`: no attempt. `5s <= t <
    /// 15s`: one attempt with loose bias priors (stage A). `t >= 15s`:
    /// one attempt with no bias prior (stage B). Each stage fires at
    /// most once per session.
    pub fn stage(&mut self, now: dtype, window_start: dtype) -> Option<BiasPriors> {
        let elapsed = now - window_start;
        if elapsed < 5.0 {
            return None;
        }
        if elapsed < 15.0 {
            if self.init_a {
                return None;
            }
            self.init_a = true;
            self.reinit = true;
            return Some(BiasPriors { sigma_accel: 1e4, sigma_gyro: 1e1 });
        }
        if self.init_b {
            return None;
        }
        self.init_b = true;
        self.reinit = true;
        Some(BiasPriors { sigma_accel: 0.0, sigma_gyro: 0.0 })
    }
}

/// The outcome of a successful [`try_initialize`] run: the recovered
/// bias (shared across every keyframe in the window), the
/// gravity-to-visual-frame rotation, and the per-keyframe velocities
/// resolved by keyframe id.
#[derive(Debug, Clone)]
pub struct InitializerResult {
    pub bias: ImuBias,
    pub gravity_rot: SO3,
    pub velocities: std::collections::HashMap<u64, Vector3>,
}

/// Attempts one initializer solve over `keyframes` (ordered oldest to
/// newest, each carrying its preintegration to the *next* entry).
/// Requires at least two keyframes with a preintegration between them;
/// returns `None` without touching anything if the window is too thin
/// to form a single `ImuErrorG` factor.
pub fn try_initialize(
    keyframes: &[Frame],
    priors: BiasPriors,
    gravity_mag: dtype,
    solver_time: dtype,
) -> Option<InitializerResult> {
    if keyframes.len() < 2 {
        return None;
    }

    let first = &keyframes[0];

    let mut values = Values::new();
    values.insert(key::bias_acc(0), VectorVar3::new(first.imu_bias.acc));
    values.insert(key::bias_gyro(0), VectorVar3::new(first.imu_bias.gyro));
    values.insert(key::gravity_rot(), SO3::identity());
    for kf in keyframes {
        values.insert(key::vel(kf.id), VectorVar3::new(kf.velocity));
    }

    let mut graph = Graph::new();
    for pair in keyframes.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let Some(preint) = &cur.preintegration else {
            continue;
        };
        graph.add_factor(Factor::gaussian(
            Box::new(ImuErrorG::new(
                key::vel(prev.id),
                key::bias_acc(0),
                key::bias_gyro(0),
                key::vel(cur.id),
                key::gravity_rot(),
                prev.pose,
                cur.pose,
                preint.delta.clone(),
                gravity_mag,
            )),
            preint.gravity_noise_model(),
        ));
    }

    if graph.is_empty() {
        return None;
    }

    if priors.sigma_accel > 0.0 {
        graph.add_factor(Factor::gaussian(
            Box::new(PriorResidual::new(
                key::bias_acc(0),
                VectorVar3::new(Vector3::zeros()),
            )),
            GaussianNoise::from_scalar_sigma(3, priors.sigma_accel),
        ));
    }
    if priors.sigma_gyro > 0.0 {
        graph.add_factor(Factor::gaussian(
            Box::new(PriorResidual::new(
                key::bias_gyro(0),
                VectorVar3::new(Vector3::zeros()),
            )),
            GaussianNoise::from_scalar_sigma(3, priors.sigma_gyro),
        ));
    }

    // First keyframe's velocity is the window's anchor (its pose already
    // is, being taken as fixed input rather than a free variable); a
    // tight prior holds it still instead of excising it from the order.
    graph.add_factor(Factor::gaussian(
        Box::new(PriorResidual::new(
            key::vel(first.id),
            VectorVar3::new(first.velocity),
        )),
        GaussianNoise::from_scalar_sigma(3, 1e-6),
    ));

    let mut opt = Dogleg::default().with_params(OptParams {
        max_solver_time: Some(Duration::from_secs_f64(solver_time)),
        ..OptParams::default()
    });
    opt.optimize(&graph, &mut values).ok()?;

    let bias = ImuBias::new(
        values.get_cast::<VectorVar3>(&key::bias_acc(0))?.0,
        values.get_cast::<VectorVar3>(&key::bias_gyro(0))?.0,
    );
    let gravity_rot = *values.get_cast::<SO3>(&key::gravity_rot())?;

    let mut velocities = std::collections::HashMap::new();
    for kf in keyframes {
        let v = values.get_cast::<VectorVar3>(&key::vel(kf.id))?.0;
        velocities.insert(kf.id, v);
    }

    Some(InitializerResult { bias, gravity_rot, velocities })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::residuals::{ImuCovariance, ImuPreintegrator};
    use crate::variables::SE3;

    fn straight_line_keyframes(n: usize, dt: dtype, gravity_mag: dtype) -> Vec<Frame> {
        let gravity = Vector3::new(0.0, 0.0, -gravity_mag);
        let bias = ImuBias::zeros();
        let mut frames = Vec::with_capacity(n);
        let mut pos = Vector3::zeros();
        let vel = Vector3::new(1.0, 0.0, 0.0);

        for i in 0..n {
            let mut frame = Frame::new(i as u64, i as dtype * dt, SE3::new(SO3::identity(), pos));
            frame.velocity = vel;
            if i > 0 {
                let mut preint =
                    ImuPreintegrator::new(gravity, bias, ImuCovariance::default());
                let accel = -gravity; // stationary-frame accel needed to counter gravity while flying level
                for _ in 0..10 {
                    preint.append(0.0, dt / 10.0, accel, Vector3::zeros()).unwrap();
                }
                frame.preintegration = Some(preint);
                frame.b_imu = true;
            }
            pos += vel * dt;
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn recovers_zero_bias_on_noiseless_straight_line_flight() {
        let gravity_mag = 9.81;
        let keyframes = straight_line_keyframes(6, 0.1, gravity_mag);
        let result = try_initialize(
            &keyframes,
            BiasPriors { sigma_accel: 0.0, sigma_gyro: 0.0 },
            gravity_mag,
            0.5,
        )
        .expect("initializer should converge on noiseless data");

        assert!(result.bias.acc.norm() < 1e-2);
        assert!(result.bias.gyro.norm() < 1e-2);
        let v_last = result.velocities.get(&5).expect("missing velocity for last keyframe");
        assert!((v_last - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-1);
    }

    #[test]
    fn rejects_window_with_no_preintegrated_edges() {
        let frame = Frame::new(0, 0.0, SE3::identity());
        assert!(try_initialize(&[frame], BiasPriors { sigma_accel: 0.0, sigma_gyro: 0.0 }, 9.81, 0.1).is_none());
    }

    #[test]
    fn stage_schedule_fires_each_band_once() {
        let mut state = InitializerState::default();
        assert!(state.stage(2.0, 0.0).is_none());
        let a = state.stage(7.0, 0.0).expect("stage A should fire");
        assert_eq!(a.sigma_accel, 1e4);
        assert!(state.stage(8.0, 0.0).is_none());
        let b = state.stage(16.0, 0.0).expect("stage B should fire");
        assert_eq!(b.sigma_accel, 0.0);
        assert!(state.stage(17.0, 0.0).is_none());
    }
}
