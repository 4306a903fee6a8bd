//! Narrow traits the core calls out through (§6) rather than depending
//! on directly: LiDAR mapping, GNSS fusion, and pose-graph/loop-closure
//! propagation. Each ships a default, working implementation so the
//! backend compiles and runs end-to-end with nothing external wired in —
//! the same pattern the teacher uses for `NoiseModel`/`RobustCost`
//! (`UnitNoise`, `L2` are always available; richer ones are opt-in).

use crate::linalg::dtype;
use crate::map::Frame;
use crate::variables::SE3;

/// Hands the backend's active window to an external LiDAR mapping
/// subsystem for additional optimization; it may adjust keyframe poses
/// in place. Out of scope for the core itself (§1).
pub trait LidarMapping: std::fmt::Debug {
    fn optimize(&mut self, active_kfs: &mut [Frame]);
}

/// No-op default: no LiDAR collaborator present.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLidar;

impl LidarMapping for NullLidar {
    fn optimize(&mut self, _active_kfs: &mut [Frame]) {}
}

/// GNSS alignment: optimizes against the latest known time and, if it
/// decides the mapping trajectory should be re-expressed in the world
/// frame, returns the prefix start time over which to do so.
pub trait Navsat: std::fmt::Debug {
    fn is_initialized(&self) -> bool {
        false
    }
    fn optimize(&mut self, latest_time: dtype) -> Option<dtype>;
}

/// No-op default: no GNSS collaborator present.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNavsat;

impl Navsat for NullNavsat {
    fn optimize(&mut self, _latest_time: dtype) -> Option<dtype> {
        None
    }
}

/// Applies a rigid transform to a set of keyframes (forward propagation,
/// §4.6 step 10) and exposes the loop-closure hooks (`forward_propagate`
/// section handling, submap registration) that live in the pose-graph
/// subsystem outside the core.
pub trait PoseGraph: std::fmt::Debug {
    /// Left-multiplies every frame's pose by `transform`, in place.
    fn propagate(&mut self, transform: SE3, frames: &mut [Frame]);

    /// Loop-closure hook: not exercised by the core itself (§1, §6).
    fn forward_propagate_section(&mut self, _start_time: dtype, _end_time: dtype) {}

    /// Loop-closure hook: not exercised by the core itself (§1, §6).
    fn add_submap(&mut self, _frames: &[Frame]) {}
}

/// The default pose-graph collaborator: applies `propagate` directly and
/// treats the loop-closure hooks as no-ops, since loop closure /
/// relocalization is out of scope for the core (§1).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPoseGraph;

impl PoseGraph for DefaultPoseGraph {
    fn propagate(&mut self, transform: SE3, frames: &mut [Frame]) {
        for frame in frames {
            frame.pose = transform.compose(&frame.pose);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Variable;

    #[test]
    fn identity_transform_is_a_no_op() {
        let mut pg = DefaultPoseGraph;
        let mut frames = vec![Frame::new(0, 0.0, SE3::identity())];
        let before = frames[0].pose;
        pg.propagate(SE3::identity(), &mut frames);
        assert!((frames[0].pose.log() - before.log()).norm() < 1e-12);
    }
}
