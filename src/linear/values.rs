use crate::containers::{Key, Order};
use crate::linalg::VectorX;

/// A tangent-space update vector, addressable by key through an [`Order`].
/// The result of solving one linearized system.
#[derive(Debug, Clone)]
pub struct LinearValues {
    values: VectorX,
    order: Order,
}

impl LinearValues {
    pub fn new(order: Order, values: VectorX) -> Self {
        assert_eq!(order.dim(), values.len());
        Self { values, order }
    }

    pub fn zero(order: Order) -> Self {
        let dim = order.dim();
        Self {
            values: VectorX::zeros(dim),
            order,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, key: &Key) -> Option<nalgebra::DVectorView<crate::linalg::dtype>> {
        self.order.get(key).map(|idx| self.values.rows(idx.idx, idx.dim))
    }

    pub fn vector(&self) -> &VectorX {
        &self.values
    }

    pub fn order(&self) -> &Order {
        &self.order
    }
}
