use nalgebra::linalg::Cholesky;

use crate::error::{Error, Result};
use crate::linalg::{MatrixX, VectorX};

/// Solves the dense linear least-squares system `A dx ~= b` produced by
/// one optimizer iteration for `dx`.
pub trait LinearSolver: std::fmt::Debug {
    fn solve(&self, a: &MatrixX, b: &VectorX) -> Result<VectorX>;
}

/// Solves via the normal equations `A^T A dx = A^T b`, using a dense
/// Cholesky factorization of `A^T A`. Appropriate for the window sizes
/// this backend targets; see DESIGN.md.
#[derive(Debug, Clone, Copy, Default)]
pub struct CholeskySolver;

impl LinearSolver for CholeskySolver {
    fn solve(&self, a: &MatrixX, b: &VectorX) -> Result<VectorX> {
        let ata = a.transpose() * a;
        let atb = a.transpose() * b;
        Cholesky::new(ata)
            .map(|chol| chol.solve(&atb))
            .ok_or(Error::SolverDiverged)
    }
}

/// Solves via a dense QR factorization of the (rectangular) `A` directly,
/// avoiding the conditioning loss of forming `A^T A`. Used by the dogleg
/// optimizer's Gauss-Newton step, where the extra cost is worthwhile.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrSolver;

impl LinearSolver for QrSolver {
    fn solve(&self, a: &MatrixX, b: &VectorX) -> Result<VectorX> {
        let qr = a.clone().qr();
        qr.solve(b).ok_or(Error::SolverDiverged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cholesky_solves_overdetermined_system() {
        // y = 2x + 1, noiseless, solved in least squares form.
        let a = MatrixX::from_row_slice(3, 2, &[0.0, 1.0, 1.0, 1.0, 2.0, 1.0]);
        let b = VectorX::from_column_slice(&[1.0, 3.0, 5.0]);
        let x = CholeskySolver.solve(&a, &b).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-9);
        assert!((x[1] - 1.0).abs() < 1e-9);
    }
}
