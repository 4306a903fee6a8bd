use crate::containers::Key;
use crate::linalg::{dtype, MatrixBlock, VectorX};

/// A linearized factor: `A dx ~= b` restricted to the columns of the
/// variables it touches (tracked via `A`'s own index list).
#[derive(Debug, Clone)]
pub struct LinearFactor {
    pub keys: Vec<Key>,
    pub a: MatrixBlock,
    pub b: VectorX,
}

impl LinearFactor {
    pub fn new(keys: Vec<Key>, a: MatrixBlock, b: VectorX) -> Self {
        assert_eq!(a.mat().nrows(), b.len());
        Self { keys, a, b }
    }

    pub fn dim(&self) -> usize {
        self.b.len()
    }

    /// `0.5 * ||A dx - b||^2` at `dx = 0`, i.e. the residual this linear
    /// factor contributes before any step is taken.
    pub fn error(&self) -> dtype {
        0.5 * self.b.norm_squared()
    }
}
