use crate::containers::Order;
use crate::linalg::{dtype, MatrixX, VectorX};

use super::factor::LinearFactor;

/// A collection of linearized factors, stacked into one dense system when
/// [`LinearGraph::residual_jacobian`] is called. Sliding-window backends
/// of the size this crate targets (tens of keyframes, hundreds of
/// landmarks) keep the dense system small enough that a dense assembly is
/// both simpler and fast enough; see DESIGN.md for the tradeoff against
/// a sparse assembly.
#[derive(Debug, Clone, Default)]
pub struct LinearGraph {
    factors: Vec<LinearFactor>,
}

impl LinearGraph {
    pub fn new() -> Self {
        Self { factors: Vec::new() }
    }

    pub fn from_vec(factors: Vec<LinearFactor>) -> Self {
        Self { factors }
    }

    pub fn add_factor(&mut self, factor: LinearFactor) {
        self.factors.push(factor);
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn error(&self) -> dtype {
        self.factors.iter().map(|f| f.error()).sum()
    }

    /// Stacks every factor's local block into one dense `(b, A)` pair over
    /// the full problem dimension described by `order`.
    pub fn residual_jacobian(&self, order: &Order) -> (VectorX, MatrixX) {
        let dim_out: usize = self.factors.iter().map(|f| f.dim()).sum();
        let dim_in = order.dim();

        let mut b = VectorX::zeros(dim_out);
        let mut a = MatrixX::zeros(dim_out, dim_in);

        let mut row = 0;
        for factor in &self.factors {
            let rows = factor.dim();
            b.rows_mut(row, rows).copy_from(&factor.b);

            let local_dims: Vec<usize> = factor
                .keys
                .iter()
                .map(|k| order.get(k).expect("key missing from order").dim)
                .collect();
            for (i, key) in factor.keys.iter().enumerate() {
                let idx = order.get(key).expect("key missing from order");
                let block = factor.a.get_block(i, &local_dims);
                a.view_mut((row, idx.idx), (rows, local_dims[i]))
                    .copy_from(&block);
            }
            row += rows;
        }

        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{key, Values};
    use crate::linalg::MatrixBlock;
    use crate::variables::{Variable, SE3};

    #[test]
    fn single_factor_lands_at_its_column_offset() {
        let mut values = Values::new();
        values.insert(key::pose(0), SE3::identity());
        values.insert(key::pose(1), SE3::identity());
        let order = Order::from_values(&values);

        let idx1 = order.get(&key::pose(1)).unwrap().idx;
        let a = MatrixBlock::new(MatrixX::identity(6, 6), vec![idx1]);
        let b = VectorX::from_element(6, 1.0);
        let factor = LinearFactor::new(vec![key::pose(1)], a, b);

        let graph = LinearGraph::from_vec(vec![factor]);
        let (_, a_full) = graph.residual_jacobian(&order);
        assert_eq!(a_full.ncols(), order.dim());
        assert!(a_full.view((0, 0), (6, 6)).norm() < 1e-12);
        assert!((a_full.view((0, idx1), (6, 6)) - MatrixX::identity(6, 6)).norm() < 1e-12);
    }
}
