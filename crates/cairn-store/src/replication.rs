//! Replication hooks.
//!
//! Every dictionary mutation is reported to the store's replication sink,
//! in the same order the mutations take effect. The sink sees absolute
//! entry positions so a replica applying the log positionally stays
//! aligned with the source.

use cairn_types::{ColKey, ObjKey, TableKey, Value};

/// Identifies one dictionary instance: parent table, parent object, column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionId {
    pub table: TableKey,
    pub obj: ObjKey,
    pub col: ColKey,
}

/// Consumer of dictionary change events.
pub trait ReplicationSink {
    /// A new entry appeared at `ndx`.
    fn dictionary_insert(&mut self, dict: &CollectionId, ndx: usize, key: &Value, value: &Value);

    /// The entry at `ndx` had its value overwritten.
    fn dictionary_set(&mut self, dict: &CollectionId, ndx: usize, key: &Value, value: &Value);

    /// The entry at `ndx` was removed.
    fn dictionary_erase(&mut self, dict: &CollectionId, ndx: usize, key: &Value);
}

/// One recorded replication event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationEvent {
    Insert {
        dict: CollectionId,
        ndx: usize,
        key: Value,
        value: Value,
    },
    Set {
        dict: CollectionId,
        ndx: usize,
        key: Value,
        value: Value,
    },
    Erase {
        dict: CollectionId,
        ndx: usize,
        key: Value,
    },
}

/// A sink that records every event in order. Useful for tests and for
/// embedders that batch the log themselves.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<ReplicationEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplicationSink for RecordingSink {
    fn dictionary_insert(&mut self, dict: &CollectionId, ndx: usize, key: &Value, value: &Value) {
        self.events.push(ReplicationEvent::Insert {
            dict: *dict,
            ndx,
            key: key.clone(),
            value: value.clone(),
        });
    }

    fn dictionary_set(&mut self, dict: &CollectionId, ndx: usize, key: &Value, value: &Value) {
        self.events.push(ReplicationEvent::Set {
            dict: *dict,
            ndx,
            key: key.clone(),
            value: value.clone(),
        });
    }

    fn dictionary_erase(&mut self, dict: &CollectionId, ndx: usize, key: &Value) {
        self.events.push(ReplicationEvent::Erase {
            dict: *dict,
            ndx,
            key: key.clone(),
        });
    }
}
