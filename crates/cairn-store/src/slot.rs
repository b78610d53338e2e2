//! Slot derivation: mapping a user key to the tree's internal key.
//!
//! The slot id is a 63-bit non-negative integer derived from a stable hash
//! of the key's canonical byte form. Distinct keys can collide; the tree
//! does not resolve collisions (the second key is treated as an update of
//! the first occupant). See the dictionary layer for where that surfaces.

use std::fmt;

use cairn_error::{Result, StoreError};
use cairn_types::Value;
use xxhash_rust::xxh3::xxh3_64;

/// The internal primary key of the cluster tree: a non-negative 63-bit id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SlotId(i64);

impl SlotId {
    /// Create a slot id from a raw non-negative value.
    #[cfg(test)]
    pub(crate) const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot({})", self.0)
    }
}

/// Derive the slot id for a user key.
///
/// Canonical bytes: little-endian two's-complement for integers, raw UTF-8
/// for strings. The hash is xxh3-64 with the top bit cleared, so the result
/// always fits the tree's signed 63-bit key space. Any other runtime key
/// type is unsupported.
pub fn derive(key: &Value) -> Result<SlotId> {
    let hash = match key {
        Value::Int(i) => xxh3_64(&i.to_le_bytes()),
        Value::String(s) => xxh3_64(s.as_bytes()),
        other => {
            return Err(StoreError::not_implemented(format!(
                "dictionary keys of type {}",
                other.type_name()
            )))
        }
    };
    #[allow(clippy::cast_possible_wrap)]
    let slot = (hash & 0x7FFF_FFFF_FFFF_FFFF) as i64;
    Ok(SlotId(slot))
}
