//! Cluster: the leaf node of the cluster tree.
//!
//! A cluster stores three parallel arrays of equal length: slot ids (the
//! tree's keys, kept sorted), typed user keys, and mixed values. The i-th
//! element of all three arrays belongs to one entry.

use cairn_error::{Result, StoreError};
use cairn_types::{DataType, Value};

use crate::slot::SlotId;

/// Maximum entries per cluster; overflow splits the cluster.
pub(crate) const MAX_CLUSTER_SIZE: usize = 256;

/// The typed user-key array of a cluster.
///
/// The variant is fixed by the dictionary's declared key type; `Mixed`
/// columns hold both integer and string keys side by side.
#[derive(Debug)]
pub(crate) enum KeyArray {
    Int(Vec<i64>),
    String(Vec<String>),
    Mixed(Vec<Value>),
}

impl KeyArray {
    fn new(key_type: DataType) -> Result<Self> {
        match key_type {
            DataType::Int => Ok(Self::Int(Vec::new())),
            DataType::String => Ok(Self::String(Vec::new())),
            DataType::Mixed => Ok(Self::Mixed(Vec::new())),
            other => Err(StoreError::not_implemented(format!(
                "dictionary key type {other}"
            ))),
        }
    }

    fn insert(&mut self, index: usize, key: Value) -> Result<()> {
        match (self, key) {
            (Self::Int(keys), Value::Int(i)) => keys.insert(index, i),
            (Self::String(keys), Value::String(s)) => keys.insert(index, s),
            (Self::Mixed(keys), key @ (Value::Int(_) | Value::String(_))) => {
                keys.insert(index, key);
            }
            (_, key) => {
                return Err(StoreError::collection_mismatch(format!(
                    "key of type {} does not fit the declared key type",
                    key.type_name()
                )))
            }
        }
        Ok(())
    }

    fn remove(&mut self, index: usize) {
        match self {
            Self::Int(keys) => {
                keys.remove(index);
            }
            Self::String(keys) => {
                keys.remove(index);
            }
            Self::Mixed(keys) => {
                keys.remove(index);
            }
        }
    }

    fn get(&self, index: usize) -> Value {
        match self {
            Self::Int(keys) => Value::Int(keys[index]),
            Self::String(keys) => Value::String(keys[index].clone()),
            Self::Mixed(keys) => keys[index].clone(),
        }
    }

    fn split_off(&mut self, at: usize) -> Self {
        match self {
            Self::Int(keys) => Self::Int(keys.split_off(at)),
            Self::String(keys) => Self::String(keys.split_off(at)),
            Self::Mixed(keys) => Self::Mixed(keys.split_off(at)),
        }
    }
}

/// A leaf of the cluster tree.
#[derive(Debug)]
pub(crate) struct Cluster {
    slots: Vec<SlotId>,
    keys: KeyArray,
    values: Vec<Value>,
}

impl Cluster {
    /// Create an empty cluster for the given declared key type.
    pub(crate) fn new(key_type: DataType) -> Result<Self> {
        Ok(Self {
            slots: Vec::new(),
            keys: KeyArray::new(key_type)?,
            values: Vec::new(),
        })
    }

    /// Number of entries.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Binary search for a slot id: `Ok(index)` if present, `Err(index)`
    /// with the insertion point otherwise.
    pub(crate) fn find(&self, slot: SlotId) -> std::result::Result<usize, usize> {
        self.slots.binary_search(&slot)
    }

    /// The slot id of the first entry. Used as the split pivot; only valid
    /// on non-empty clusters.
    pub(crate) fn first_slot(&self) -> SlotId {
        self.slots[0]
    }

    /// Insert an entry at `index`, keeping the arrays parallel.
    pub(crate) fn insert_at(
        &mut self,
        index: usize,
        slot: SlotId,
        key: Value,
        value: Value,
    ) -> Result<()> {
        self.keys.insert(index, key)?;
        self.slots.insert(index, slot);
        self.values.insert(index, value);
        Ok(())
    }

    /// Remove the entry at `index`, returning its value.
    pub(crate) fn remove_at(&mut self, index: usize) -> Value {
        self.slots.remove(index);
        self.keys.remove(index);
        self.values.remove(index)
    }

    /// The slot id at `index`.
    pub(crate) fn slot_at(&self, index: usize) -> SlotId {
        self.slots[index]
    }

    /// The user key at `index`.
    pub(crate) fn key_at(&self, index: usize) -> Value {
        self.keys.get(index)
    }

    /// The stored (unfiltered) value at `index`.
    pub(crate) fn value_at(&self, index: usize) -> &Value {
        &self.values[index]
    }

    /// Overwrite the value at `index` in place.
    pub(crate) fn set_value(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    /// All stored values, in slot order.
    pub(crate) fn values(&self) -> &[Value] {
        &self.values
    }

    /// Whether the cluster exceeds the node size and must split.
    pub(crate) fn needs_split(&self) -> bool {
        self.len() > MAX_CLUSTER_SIZE
    }

    /// Split off the upper half into a new cluster.
    pub(crate) fn split(&mut self) -> Self {
        let mid = self.len() / 2;
        Self {
            slots: self.slots.split_off(mid),
            keys: self.keys.split_off(mid),
            values: self.values.split_off(mid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: i64) -> (SlotId, Value, Value) {
        (SlotId::from_raw(i), Value::Int(i), Value::Int(i * 10))
    }

    #[test]
    fn parallel_arrays_stay_aligned() {
        let mut cluster = Cluster::new(DataType::Int).unwrap();
        for i in [5, 1, 3] {
            let (slot, key, value) = entry(i);
            let at = cluster.find(slot).unwrap_err();
            cluster.insert_at(at, slot, key, value).unwrap();
        }
        assert_eq!(cluster.len(), 3);
        for (i, expect) in [1, 3, 5].into_iter().enumerate() {
            assert_eq!(cluster.key_at(i), Value::Int(expect));
            assert_eq!(*cluster.value_at(i), Value::Int(expect * 10));
        }

        cluster.remove_at(1);
        assert_eq!(cluster.len(), 2);
        assert_eq!(cluster.key_at(1), Value::Int(5));
        assert_eq!(*cluster.value_at(1), Value::Int(50));
    }

    #[test]
    fn find_reports_insertion_point() {
        let mut cluster = Cluster::new(DataType::Int).unwrap();
        let (slot, key, value) = entry(10);
        cluster.insert_at(0, slot, key, value).unwrap();
        assert_eq!(cluster.find(SlotId::from_raw(10)), Ok(0));
        assert_eq!(cluster.find(SlotId::from_raw(4)), Err(0));
        assert_eq!(cluster.find(SlotId::from_raw(11)), Err(1));
    }

    #[test]
    fn split_keeps_order_and_alignment() {
        let mut cluster = Cluster::new(DataType::String).unwrap();
        for i in 0..10 {
            cluster
                .insert_at(
                    i,
                    SlotId::from_raw(i as i64),
                    Value::String(format!("k{i}")),
                    Value::Int(i as i64),
                )
                .unwrap();
        }
        let right = cluster.split();
        assert_eq!(cluster.len(), 5);
        assert_eq!(right.len(), 5);
        assert_eq!(right.first_slot(), SlotId::from_raw(5));
        assert_eq!(right.key_at(0), Value::from("k5"));
        assert_eq!(*right.value_at(0), Value::Int(5));
    }

    #[test]
    fn key_type_is_enforced() {
        let mut cluster = Cluster::new(DataType::Int).unwrap();
        let err = cluster
            .insert_at(0, SlotId::from_raw(1), Value::from("x"), Value::Null)
            .unwrap_err();
        assert!(matches!(err, StoreError::CollectionTypeMismatch { .. }));
        // The failed insert must not desync the arrays.
        assert_eq!(cluster.len(), 0);
    }

    #[test]
    fn mixed_key_array_holds_both() {
        let mut cluster = Cluster::new(DataType::Mixed).unwrap();
        cluster
            .insert_at(0, SlotId::from_raw(1), Value::Int(1), Value::Null)
            .unwrap();
        cluster
            .insert_at(1, SlotId::from_raw(2), Value::from("two"), Value::Null)
            .unwrap();
        assert_eq!(cluster.key_at(0), Value::Int(1));
        assert_eq!(cluster.key_at(1), Value::from("two"));
    }

    #[test]
    fn unsupported_key_types_rejected() {
        assert!(matches!(
            Cluster::new(DataType::Bool).unwrap_err(),
            StoreError::NotImplemented(_)
        ));
    }
}
