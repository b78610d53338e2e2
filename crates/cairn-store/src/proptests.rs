//! Model-based tests: random operation interleavings against a reference
//! map, checking the tree invariants the rest of the crate leans on.

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use cairn_error::StoreError;
use cairn_types::{DataType, Value};
use proptest::prelude::*;

use crate::arena::Arena;
use crate::slot::SlotId;
use crate::store::Store;
use crate::tree::ClusterTree;

#[derive(Debug, Clone)]
enum Op {
    Insert(i64, i64),
    Erase(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..512i64, any::<i64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        1 => (0..512i64).prop_map(Op::Erase),
    ]
}

proptest! {
    /// The tree agrees with a reference map under arbitrary interleavings
    /// of inserts (including overwrites) and erases, and traversal visits
    /// strictly increasing slot ids covering exactly the live entries.
    #[test]
    fn tree_matches_reference_map(ops in prop::collection::vec(op_strategy(), 1..300)) {
        let mut arena = Arena::new();
        let mut tree = ClusterTree::create(&mut arena, DataType::Int).unwrap();
        let mut model: BTreeMap<i64, i64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let slot = SlotId::from_raw(k);
                    match tree.insert(&mut arena, slot, Value::Int(k), Value::Int(v)) {
                        Ok(_) => prop_assert!(!model.contains_key(&k)),
                        Err(StoreError::SlotAlreadyUsed) => {
                            prop_assert!(model.contains_key(&k));
                            let pos = tree.get(&arena, slot).unwrap();
                            tree.set_value_at(&mut arena, pos, Value::Int(v));
                        }
                        Err(err) => prop_assert!(false, "unexpected error: {err}"),
                    }
                    model.insert(k, v);
                }
                Op::Erase(k) => {
                    let slot = SlotId::from_raw(k);
                    match tree.erase(&mut arena, slot) {
                        Ok(_) => prop_assert!(model.remove(&k).is_some()),
                        Err(StoreError::SlotNotFound) => {
                            prop_assert!(!model.contains_key(&k));
                        }
                        Err(err) => prop_assert!(false, "unexpected error: {err}"),
                    }
                }
            }
            prop_assert_eq!(tree.size(&arena), model.len());
        }

        // Point lookups agree with the model.
        for (k, v) in &model {
            let pos = tree.get(&arena, SlotId::from_raw(*k)).unwrap();
            prop_assert_eq!(tree.value_at(&arena, pos), &Value::Int(*v));
        }

        // Traversal is slot-ordered and complete; the size invariant holds
        // cluster by cluster.
        let mut visited = Vec::new();
        let mut starts_consistent = true;
        let mut cluster_total = 0;
        tree.traverse(&arena, |cluster, start| {
            starts_consistent &= start == visited.len();
            cluster_total += cluster.len();
            for i in 0..cluster.len() {
                visited.push(cluster.slot_at(i).value());
            }
            ControlFlow::Continue(())
        });
        prop_assert!(starts_consistent, "cluster start offsets must be cumulative");
        prop_assert_eq!(cluster_total, model.len());
        let expected: Vec<i64> = model.keys().copied().collect();
        prop_assert_eq!(visited, expected);
    }

    /// The dictionary façade agrees with a reference map over string keys
    /// going through real slot derivation.
    #[test]
    fn dictionary_matches_reference_map(
        ops in prop::collection::vec(
            prop_oneof![
                3 => (0..100i64, any::<i32>()).prop_map(|(k, v)| Op::Insert(k, i64::from(v))),
                1 => (0..100i64).prop_map(Op::Erase),
            ],
            1..120,
        )
    ) {
        let store = Store::new();
        let table = store.create_table("t");
        let col = store
            .add_dictionary_column(table, DataType::String, DataType::Mixed, true, None)
            .unwrap();
        let obj = store.create_object(table).unwrap();
        let dict = store.dictionary(table, obj, col).unwrap();
        let mut model: BTreeMap<String, i64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let key = format!("k{k}");
                    let (_, inserted) = dict.insert(Value::from(key.as_str()), Value::Int(v)).unwrap();
                    prop_assert_eq!(inserted, !model.contains_key(&key));
                    model.insert(key, v);
                }
                Op::Erase(k) => {
                    let key = format!("k{k}");
                    match dict.erase(&Value::from(key.as_str())) {
                        Ok(()) => {
                            // Erasing from an empty dictionary is a no-op.
                            prop_assert!(model.remove(&key).is_some() || model.is_empty());
                        }
                        Err(StoreError::KeyNotFound) => prop_assert!(!model.contains_key(&key)),
                        Err(err) => prop_assert!(false, "unexpected error: {err}"),
                    }
                }
            }
            prop_assert_eq!(dict.size(), model.len());
        }

        for (k, v) in &model {
            prop_assert_eq!(dict.get(&Value::from(k.as_str())).unwrap(), Value::Int(*v));
        }

        // Iteration yields exactly size() pairs with unique keys.
        let mut seen = Vec::new();
        for (key, _) in dict.iter() {
            prop_assert!(!seen.contains(&key));
            seen.push(key);
        }
        prop_assert_eq!(seen.len(), model.len());
    }
}
