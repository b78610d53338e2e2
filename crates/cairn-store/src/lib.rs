//! cairn-store: the dictionary collection core of the cairn embedded
//! object store.
//!
//! The pieces, leaves first:
//!
//! - [`slot`]: derives the tree's 63-bit internal key from a user key.
//! - A cluster tree (internal): a B-tree keyed by slot id whose leaves
//!   hold parallel arrays of slot ids, typed user keys, and mixed values,
//!   backed by a slab arena shared across the store.
//! - [`Store`]: the enclosing object store — tables, objects, backlinks
//!   with strong-cascade removal, and the replication sink.
//! - [`Dictionary`]: the user-facing collection bound to one
//!   (table, object, column) triple.
//!
//! Writers are serialized externally (one transaction at a time); the
//! store does no locking of its own.

pub mod replication;
pub mod slot;

mod arena;
mod cluster;
mod dictionary;
mod normalize;
mod store;
mod tree;

#[cfg(test)]
mod proptests;

pub use dictionary::{Dictionary, DictionaryIter, DictionaryLinkValues};
pub use replication::{CollectionId, RecordingSink, ReplicationEvent, ReplicationSink};
pub use slot::SlotId;
pub use store::Store;
