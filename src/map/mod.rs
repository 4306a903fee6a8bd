//! The entity graph (§3, §4.1): frames, features, and landmarks, plus
//! the [`Map`] that owns them for the life of a session.

mod feature;
mod frame;
mod landmark;
#[allow(clippy::module_inception)]
mod map;

pub use feature::Feature;
pub use frame::{BoundingBox, Frame, Image};
pub use landmark::{Landmark, Observation};
pub use map::Map;
