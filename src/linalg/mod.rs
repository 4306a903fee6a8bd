//! Numerical primitives shared by every layer above: the scalar type,
//! small fixed-size matrix/vector aliases, a dense block descriptor used
//! when assembling the sparse Jacobian, and the central-difference
//! differentiator used by the residual layer.

mod numerical_diff;

pub use numerical_diff::{numerical_gradient, numerical_jacobian};

#[cfg(not(feature = "f32"))]
pub type dtype = f64;
#[cfg(feature = "f32")]
pub type dtype = f32;

pub type VectorX = nalgebra::DVector<dtype>;
pub type MatrixX = nalgebra::DMatrix<dtype>;

pub type Vector1 = nalgebra::Vector1<dtype>;
pub type Vector2 = nalgebra::Vector2<dtype>;
pub type Vector3 = nalgebra::Vector3<dtype>;
pub type Vector4 = nalgebra::Vector4<dtype>;
pub type Vector6 = nalgebra::SVector<dtype, 6>;
pub type Vector9 = nalgebra::SVector<dtype, 9>;
pub type Vector15 = nalgebra::SVector<dtype, 15>;

pub type Matrix2 = nalgebra::Matrix2<dtype>;
pub type Matrix3 = nalgebra::Matrix3<dtype>;
pub type Matrix4 = nalgebra::Matrix4<dtype>;
pub type Matrix6 = nalgebra::SMatrix<dtype, 6, 6>;
pub type Matrix15 = nalgebra::SMatrix<dtype, 15, 15>;

/// A dense Jacobian block for a single factor, tagged with the column
/// offsets (one per connected variable, in key order) it lands at inside
/// the full sparse system. Mirrors the teacher's `MatrixBlock`.
#[derive(Debug, Clone)]
pub struct MatrixBlock {
    mat: MatrixX,
    idx: Vec<usize>,
}

impl MatrixBlock {
    pub fn new(mat: MatrixX, idx: Vec<usize>) -> Self {
        Self { mat, idx }
    }

    pub fn mat(&self) -> &MatrixX {
        &self.mat
    }

    pub fn idx(&self) -> &[usize] {
        &self.idx
    }

    /// Columns belonging to the `i`-th connected variable, addressed by
    /// its position *within this block* (not its global column offset —
    /// use [`MatrixBlock::idx`] to place the result in the full system).
    /// `dims` gives the local width of each of this block's variables, in
    /// the same order as `idx`.
    pub fn get_block(&self, i: usize, dims: &[usize]) -> nalgebra::DMatrixView<dtype> {
        let start: usize = dims[..i].iter().sum();
        self.mat.columns(start, dims[i])
    }
}

/// Result of a finite-difference evaluation: the value at the linearization
/// point, plus its derivative.
#[derive(Debug, Clone)]
pub struct DiffResult<V, D> {
    pub value: V,
    pub diff: D,
}
