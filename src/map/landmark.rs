use crate::linalg::{dtype, Vector3};

/// One entry in a [`Landmark`]'s observation list: which frame observed
/// it, at what time (kept alongside the id purely to maintain ordering
/// without a round-trip through [`super::Map`]), and which image side.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub frame: u64,
    pub time: dtype,
    pub is_left: bool,
}

/// A triangulated 3D point (MapPoint), expressed in the camera
/// coordinate system of the frame that first saw it.
///
/// Invariant: `observations` non-empty <=> the landmark is reachable
/// from [`super::Map::landmarks`]; when its observation count drops to
/// at most one and the remaining observer is not the current live
/// frame, [`super::Map`] removes it.
#[derive(Debug, Clone)]
pub struct Landmark {
    pub id: u64,
    /// Position in `reference_frame`'s camera coordinates.
    pub position: Vector3,
    /// Non-owning back-reference to the frame that defines `position`'s
    /// coordinate system.
    pub reference_frame: u64,
    /// Ordered by observation time.
    pub observations: Vec<Observation>,
    pub label: Option<String>,
}

impl Landmark {
    pub fn new(id: u64, position: Vector3, reference_frame: u64) -> Self {
        Self {
            id,
            position,
            reference_frame,
            observations: Vec::new(),
            label: None,
        }
    }

    /// Inserts an observation, keeping [`Landmark::observations`] sorted
    /// by time. Frontend processing is strictly time-ordered, so this is
    /// almost always an append; the binary search only matters for
    /// out-of-order collaborator-driven insertions.
    pub fn add_observation(&mut self, frame: u64, time: dtype, is_left: bool) {
        let pos = self
            .observations
            .partition_point(|o| o.time <= time);
        self.observations.insert(pos, Observation { frame, time, is_left });
    }

    pub fn remove_observation(&mut self, frame: u64) {
        self.observations.retain(|o| o.frame != frame);
    }

    /// The frame that defined this landmark's coordinate system, i.e.
    /// its earliest observation's frame — by construction always equal
    /// to `reference_frame` unless that frame's observation has been
    /// detached by outlier cleanup while later ones survive.
    pub fn first_frame(&self) -> Option<u64> {
        self.observations.first().map(|o| o.frame)
    }

    /// True when this landmark should be culled: at most one
    /// observation remains and it isn't the currently live frame (§3,
    /// §4.6 step 7).
    pub fn should_cull(&self, live_frame: u64) -> bool {
        self.observations.len() <= 1 && self.first_frame() != Some(live_frame)
    }
}
