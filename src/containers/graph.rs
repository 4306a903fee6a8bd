use crate::linalg::dtype;
use crate::linear::LinearGraph;

use super::factor::Factor;
use super::order::Order;
use super::values::Values;

/// The full nonlinear factor graph: an unordered bag of [`Factor`]s.
/// Mirrors the teacher's type-erased `Graph`.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    factors: Vec<Factor>,
}

impl Graph {
    pub fn new() -> Self {
        Self { factors: Vec::new() }
    }

    pub fn add_factor(&mut self, factor: Factor) {
        self.factors.push(factor);
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Factor> {
        self.factors.iter()
    }

    pub fn error(&self, values: &Values) -> dtype {
        self.factors.iter().map(|f| f.error(values)).sum()
    }

    pub fn linearize(&self, values: &Values, order: &Order) -> LinearGraph {
        let linear: Vec<_> = self
            .factors
            .iter()
            .map(|f| f.linearize(values, order))
            .collect();
        LinearGraph::from_vec(linear)
    }
}
