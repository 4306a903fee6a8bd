use std::collections::HashMap;
use std::fmt;

use foldhash::fast::RandomState;

use crate::linalg::VectorX;
use crate::variables::{Variable, VariableSafe};

use super::key::Key;
use super::order::Order;

/// Type-erased storage for every optimization variable in a problem,
/// keyed by [`Key`]. Mirrors the teacher's `Values`.
#[derive(Default, Clone)]
pub struct Values {
    values: HashMap<Key, Box<dyn VariableSafe>, RandomState>,
}

impl Values {
    pub fn new() -> Self {
        Self {
            values: HashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn insert<V: Variable + VariableSafe>(&mut self, key: Key, value: V) {
        self.values.insert(key, Box::new(value));
    }

    pub fn insert_boxed(&mut self, key: Key, value: Box<dyn VariableSafe>) {
        self.values.insert(key, value);
    }

    pub fn remove(&mut self, key: &Key) -> Option<Box<dyn VariableSafe>> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &Key) -> Option<&dyn VariableSafe> {
        self.values.get(key).map(|v| v.as_ref())
    }

    pub fn get_cast<V: Variable + VariableSafe>(&self, key: &Key) -> Option<&V> {
        self.values.get(key).and_then(|v| v.as_ref().downcast_ref::<V>())
    }

    pub fn get_cast_mut<V: Variable + VariableSafe>(&mut self, key: &Key) -> Option<&mut V> {
        self.values
            .get_mut(key)
            .and_then(|v| v.as_mut().downcast_mut::<V>())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &dyn VariableSafe)> {
        self.values.iter().map(|(k, v)| (k, v.as_ref()))
    }

    /// Apply a tangent-space update computed by the linear solver
    /// (`order` gives the column offset of each key) in place.
    pub fn oplus_mut(&mut self, order: &Order, delta: &VectorX) {
        for (key, idx) in order.iter() {
            let var = self.values.get_mut(key).expect("key missing from values");
            let xi = delta.rows(idx.idx, idx.dim).clone_owned();
            *var = var.oplus_boxed(&xi);
        }
    }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_list().entries(keys).finish()
    }
}
