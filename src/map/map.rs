use std::collections::{BTreeMap, HashMap};

use crate::linalg::dtype;

use super::frame::Frame;
use super::landmark::Landmark;

/// Total-ordering wrapper over `dtype` so keyframe times (always finite,
/// monotonically increasing sensor timestamps) can key a [`BTreeMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TimeKey(u64);

impl TimeKey {
    fn new(t: dtype) -> Self {
        debug_assert!(t.is_finite());
        #[cfg(not(feature = "f32"))]
        {
            Self(t.to_bits())
        }
        #[cfg(feature = "f32")]
        {
            Self(t.to_bits() as u64)
        }
    }
}

/// The entity graph (§4.1): owns every keyframe and landmark for the
/// duration of a session. Frames are created by the frontend and
/// transferred here at keyframe promotion; they are never deleted
/// (only landmarks are culled). Features live inline inside their
/// owning `Frame`; all cross-references between frames and landmarks
/// are plain `u64` ids resolved against this struct (§9's
/// arena-plus-index design), so there is never a dangling pointer.
#[derive(Debug, Default)]
pub struct Map {
    keyframes: HashMap<u64, Frame>,
    order: BTreeMap<TimeKey, u64>,
    landmarks: HashMap<u64, Landmark>,
    last_id: Option<u64>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Promotes `frame` to keyframe and registers the landmarks it
    /// first observed (`new_landmarks`, already triangulated by the
    /// frontend). Ids must strictly increase and times must be
    /// strictly increasing, matching §4.1's invariant; violating either
    /// indicates a bug in the caller, not a runtime condition, so this
    /// asserts rather than returning an error.
    pub fn insert_keyframe(&mut self, frame: Frame, new_landmarks: Vec<Landmark>) {
        if let Some(last_id) = self.last_id {
            assert!(
                frame.id > last_id,
                "keyframe ids must strictly increase: {} after {}",
                frame.id,
                last_id
            );
        }
        if let Some((&last_time, _)) = self.order.iter().next_back() {
            assert!(
                TimeKey::new(frame.time) > last_time,
                "keyframe times must strictly increase"
            );
        }

        for lm in new_landmarks {
            self.landmarks.insert(lm.id, lm);
        }
        self.last_id = Some(frame.id);
        self.order.insert(TimeKey::new(frame.time), frame.id);
        self.keyframes.insert(frame.id, frame);
    }

    pub fn insert_landmark(&mut self, lm: Landmark) {
        self.landmarks.insert(lm.id, lm);
    }

    /// Removes a landmark and detaches its feature from every frame that
    /// still observes it, so no dangling back-reference survives.
    pub fn remove_landmark(&mut self, id: u64) {
        let Some(lm) = self.landmarks.remove(&id) else {
            return;
        };
        for obs in &lm.observations {
            if let Some(frame) = self.keyframes.get_mut(&obs.frame) {
                frame.detach_feature(id);
            }
        }
    }

    pub fn get_landmark(&self, id: u64) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }

    pub fn get_landmark_mut(&mut self, id: u64) -> Option<&mut Landmark> {
        self.landmarks.get_mut(&id)
    }

    pub fn get_frame(&self, id: u64) -> Option<&Frame> {
        self.keyframes.get(&id)
    }

    pub fn get_frame_mut(&mut self, id: u64) -> Option<&mut Frame> {
        self.keyframes.get_mut(&id)
    }

    pub fn landmark_count(&self) -> usize {
        self.landmarks.len()
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    pub fn landmarks(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.values()
    }

    /// Ordered snapshot of keyframes in `[start, end)` (or `[start, inf)`
    /// when `end` is `None`); `max_count` truncates to the earliest
    /// that many entries in range. Returns owned copies so the caller
    /// (the backend, across threads) never holds this struct's lock
    /// longer than the copy itself.
    pub fn get_keyframes(
        &self,
        start: dtype,
        end: Option<dtype>,
        max_count: Option<usize>,
    ) -> Vec<Frame> {
        let start_key = TimeKey::new(start);
        let range: Box<dyn Iterator<Item = (&TimeKey, &u64)>> = match end {
            Some(end) => Box::new(self.order.range(start_key..TimeKey::new(end))),
            None => Box::new(self.order.range(start_key..)),
        };

        let ids = range.map(|(_, &id)| id);
        let ids: Vec<u64> = match max_count {
            Some(n) => ids.take(n).collect(),
            None => ids.collect(),
        };

        ids.into_iter()
            .filter_map(|id| self.keyframes.get(&id).cloned())
            .collect()
    }

    /// Drops all state; used after `LOST` (§4.4).
    pub fn reset(&mut self) {
        self.keyframes.clear();
        self.order.clear();
        self.landmarks.clear();
        self.last_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::Vector3;
    use crate::variables::SE3;

    fn frame(id: u64, time: dtype) -> Frame {
        Frame::new(id, time, SE3::identity())
    }

    #[test]
    fn keyframes_come_back_ordered_by_time() {
        let mut map = Map::new();
        map.insert_keyframe(frame(0, 0.0), vec![]);
        map.insert_keyframe(frame(1, 1.0), vec![]);
        map.insert_keyframe(frame(2, 2.0), vec![]);

        let kfs = map.get_keyframes(0.0, None, None);
        let times: Vec<dtype> = kfs.iter().map(|f| f.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn half_open_range_and_max_count() {
        let mut map = Map::new();
        for i in 0..5 {
            map.insert_keyframe(frame(i, i as dtype), vec![]);
        }
        let kfs = map.get_keyframes(1.0, Some(4.0), None);
        assert_eq!(kfs.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1, 2, 3]);

        let kfs = map.get_keyframes(0.0, None, Some(2));
        assert_eq!(kfs.iter().map(|f| f.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    #[should_panic]
    fn non_monotonic_time_panics() {
        let mut map = Map::new();
        map.insert_keyframe(frame(0, 1.0), vec![]);
        map.insert_keyframe(frame(1, 0.5), vec![]);
    }

    #[test]
    fn remove_landmark_detaches_every_observing_feature() {
        let mut map = Map::new();
        let mut f0 = frame(0, 0.0);
        f0.attach_feature_left(42, crate::linalg::Vector2::new(1.0, 2.0));
        let mut lm = Landmark::new(42, Vector3::new(0.0, 0.0, 1.0), 0);
        lm.add_observation(0, 0.0, true);
        map.insert_keyframe(f0, vec![lm]);

        map.remove_landmark(42);
        assert!(map.get_landmark(42).is_none());
        assert!(!map.get_frame(0).unwrap().features_left.contains_key(&42));
    }

    #[test]
    fn reset_drops_everything() {
        let mut map = Map::new();
        map.insert_keyframe(frame(0, 0.0), vec![Landmark::new(0, Vector3::zeros(), 0)]);
        map.reset();
        assert_eq!(map.keyframe_count(), 0);
        assert_eq!(map.landmark_count(), 0);
    }
}
