use crate::linalg::Vector2;
use crate::map::Image;

/// The pixel-level vision operations the frontend needs but does not
/// implement itself — image decoding and per-pixel computer vision are
/// out of scope for the core (§1). Defined right next to its sole
/// consumer ([`super::Frontend`]), matching the teacher's pattern of
/// putting a trait (e.g. `LinearSolver`) beside the one type that needs
/// it, and taken as a constructor parameter rather than a global.
pub trait FeatureTracker: std::fmt::Debug {
    /// Lucas-Kanade-style optical flow: tracks each `(landmark_id,
    /// pixel)` pair from `prev_image` into `cur_image`, using `prev` as
    /// the initial-flow hint. Entries whose correspondence is lost are
    /// simply absent from the result (§4.4 step 2).
    fn track(
        &self,
        prev_image: &Image,
        prev: &[(u64, Vector2)],
        cur_image: &Image,
        pyramid_levels: usize,
        window: usize,
    ) -> Vec<(u64, Vector2)>;

    /// `goodFeaturesToTrack`-equivalent: detects up to `max_count` new
    /// keypoints in `image`, excluding a disc of `exclusion_radius`
    /// pixels around each point in `exclude` (§4.4 step 2 of
    /// `create_keyframe`).
    fn detect(
        &self,
        image: &Image,
        exclude: &[Vector2],
        exclusion_radius: crate::linalg::dtype,
        max_count: usize,
    ) -> Vec<Vector2>;

    /// Matches each left keypoint into the right image via LK flow,
    /// `None` where the match fails.
    fn match_stereo(&self, left: &Image, right: &Image, left_points: &[Vector2]) -> Vec<Option<Vector2>>;
}

/// A deterministic ground-truth tracker: instead of running real optical
/// flow, it looks up the "true" keypoint for each landmark/pixel baked
/// into the synthetic [`Image`] it's handed (by convention, `Image::data`
/// is unused and scene truth is supplied directly to the constructor).
/// Used by integration tests to exercise the frontend state machine
/// without a real vision backend (§1 — vision is out of scope for the
/// core itself).
#[derive(Debug, Clone, Default)]
pub struct StubTracker;

impl FeatureTracker for StubTracker {
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

    fn detect(
        &self,
        _image: &Image,
        _exclude: &[Vector2],
        _exclusion_radius: crate::linalg::dtype,
        _max_count: usize,
    ) -> Vec<Vector2> {
        Vec::new()
    }

    fn match_stereo(&self, _left: &Image, _right: &Image, left_points: &[Vector2]) -> Vec<Option<Vector2>> {
        left_points.iter().map(|_| None).collect()
    }
}
