//! The factor graph container layer: typed keys, type-erased variable
//! storage, column ordering, and the [`Factor`]/[`Graph`] pair that ties
//! residuals to their noise model and robust kernel.

mod factor;
mod graph;
pub mod key;
mod order;
mod values;

pub use factor::Factor;
pub use graph::Graph;
pub use key::Key;
pub use order::{Idx, Order};
pub use values::Values;
