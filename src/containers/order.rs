use std::collections::HashMap;

use super::key::Key;
use super::values::Values;

/// Column offset and width of a single variable inside the stacked
/// linear system.
#[derive(Debug, Clone, Copy)]
pub struct Idx {
    pub idx: usize,
    pub dim: usize,
}

/// Maps every key in a problem to its column range in the dense/sparse
/// linear system built during one optimizer iteration.
#[derive(Debug, Clone, Default)]
pub struct Order {
    map: HashMap<Key, Idx>,
    dim: usize,
}

impl Order {
    pub fn from_values(values: &Values) -> Self {
        let mut map = HashMap::new();
        let mut offset = 0;
        let mut keys: Vec<Key> = values.iter().map(|(k, _)| *k).collect();
        keys.sort();
        for key in keys {
            let dim = values.get(&key).expect("key just listed").dim();
            map.insert(key, Idx { idx: offset, dim });
            offset += dim;
        }
        Self { map, dim: offset }
    }

    pub fn get(&self, key: &Key) -> Option<&Idx> {
        self.map.get(key)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Idx)> {
        self.map.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::key;
    use crate::variables::{Variable, SE3};

    #[test]
    fn offsets_are_contiguous_and_sum_to_total_dim() {
        let mut values = Values::new();
        values.insert(key::pose(0), SE3::identity());
        values.insert(key::pose(1), SE3::identity());
        let order = Order::from_values(&values);
        assert_eq!(order.dim(), 12);
        assert_eq!(order.len(), 2);
    }
}
