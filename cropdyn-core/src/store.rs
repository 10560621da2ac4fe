//! Named scalar quantities for a single simulated instant.
//!
//! The store is an arena: every quantity gets a stable [`QuantityId`] when it is defined,
//! and modules are bound to those indices once when a system is built.
//! Values are never moved after definition, so indices stay valid for the life of the store.

use crate::errors::{CropError, CropResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub type FloatValue = f64;
pub type Time = f64;

/// Index of a quantity within a [`QuantityStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuantityId(pub(crate) usize);

impl QuantityId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Names of the quantities held by a store, in definition order.
///
/// Shared between a store and the snapshots taken from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreLayout {
    names: Vec<String>,
    index: HashMap<String, QuantityId>,
}

impl StoreLayout {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn id(&self, name: &str) -> Option<QuantityId> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A mapping from quantity name to value.
#[derive(Debug, Clone, Default)]
pub struct QuantityStore {
    layout: Arc<StoreLayout>,
    values: Vec<FloatValue>,
}

impl QuantityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new quantity to the store.
    ///
    /// Returns `None` if a quantity with the same name has already been defined.
    pub fn define(&mut self, name: &str, value: FloatValue) -> Option<QuantityId> {
        if self.layout.index.contains_key(name) {
            return None;
        }
        let id = QuantityId(self.values.len());
        let layout = Arc::make_mut(&mut self.layout);
        layout.names.push(name.to_string());
        layout.index.insert(name.to_string(), id);
        self.values.push(value);
        Some(id)
    }

    pub fn id(&self, name: &str) -> CropResult<QuantityId> {
        self.layout
            .id(name)
            .ok_or_else(|| CropError::UnknownQuantity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layout.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> CropResult<FloatValue> {
        self.id(name).map(|id| self.values[id.0])
    }

    /// Overwrite an existing quantity.
    ///
    /// Quantities can only be added through [`QuantityStore::define`].
    pub fn set(&mut self, name: &str, value: FloatValue) -> CropResult<()> {
        let id = self.id(name)?;
        self.values[id.0] = value;
        Ok(())
    }

    pub fn value(&self, id: QuantityId) -> FloatValue {
        self.values[id.0]
    }

    pub fn set_value(&mut self, id: QuantityId, value: FloatValue) {
        self.values[id.0] = value;
    }

    pub fn names(&self) -> &[String] {
        self.layout.names()
    }

    pub fn layout(&self) -> Arc<StoreLayout> {
        self.layout.clone()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take an immutable copy of every value in the store.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            layout: self.layout.clone(),
            values: self.values.clone(),
        }
    }
}

/// An immutable copy of a [`QuantityStore`] at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    layout: Arc<StoreLayout>,
    values: Vec<FloatValue>,
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<FloatValue> {
        self.layout.id(name).map(|id| self.values[id.0])
    }

    pub fn names(&self) -> &[String] {
        self.layout.names()
    }

    pub fn values(&self) -> &[FloatValue] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FloatValue)> {
        self.layout
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub(crate) fn into_values(self) -> Vec<FloatValue> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_get_and_set() {
        let mut store = QuantityStore::new();
        let a = store.define("a", 1.0).unwrap();
        let b = store.define("b", 2.0).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.get("a").unwrap(), 1.0);

        store.set("b", 5.0).unwrap();
        assert_eq!(store.value(b), 5.0);
        assert_eq!(store.names(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn redefining_a_quantity_is_rejected() {
        let mut store = QuantityStore::new();
        store.define("a", 1.0).unwrap();
        assert!(store.define("a", 2.0).is_none());
        assert_eq!(store.get("a").unwrap(), 1.0);
    }

    #[test]
    fn unknown_quantity() {
        let mut store = QuantityStore::new();
        match store.get("missing") {
            Err(CropError::UnknownQuantity(name)) => assert_eq!(name, "missing"),
            other => panic!("Expected UnknownQuantity, got {:?}", other),
        }
        assert!(store.set("missing", 1.0).is_err());
    }

    #[test]
    fn snapshot_is_not_affected_by_later_writes() {
        let mut store = QuantityStore::new();
        let a = store.define("a", 1.0).unwrap();
        let snapshot = store.snapshot();
        store.set_value(a, 10.0);

        assert_eq!(snapshot.get("a"), Some(1.0));
        assert_eq!(store.get("a").unwrap(), 10.0);
        assert_eq!(snapshot.iter().collect::<Vec<_>>(), vec![("a", 1.0)]);
    }

    #[test]
    fn snapshot_shares_layout_until_store_grows() {
        let mut store = QuantityStore::new();
        store.define("a", 1.0).unwrap();
        let snapshot = store.snapshot();
        store.define("b", 2.0).unwrap();

        assert_eq!(snapshot.names().len(), 1);
        assert_eq!(store.names().len(), 2);
        assert_eq!(snapshot.get("b"), None);
    }
}
