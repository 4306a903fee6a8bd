use crate::linalg::Vector2;

/// One observation of a landmark in a specific frame/image side. Owned
/// inline inside its [`super::Frame`]'s feature table; `frame` and
/// `landmark` are non-owning back-references (plain ids, resolved
/// against [`super::Map`]).
///
/// Invariant: a `Feature` is always reachable from exactly one `Frame`'s
/// feature table and appears in exactly one `Landmark`'s observation
/// list — maintained by [`super::Map`] and [`super::Frame`] together,
/// never constructed or removed independently of both.
#[derive(Debug, Clone, Copy)]
pub struct Feature {
    pub frame: u64,
    pub landmark: u64,
    pub keypoint: Vector2,
    pub is_on_left_image: bool,
}
