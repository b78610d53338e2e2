//! Key and link newtypes shared across the store.
//!
//! Object keys carry an *unresolved* encoding in the sign bit: when a link
//! target is tombstoned, links to it are rewritten in place to the
//! unresolved form, which reads back as null at the collection boundary.

use std::fmt;

use crate::DataType;

/// Identifies a table within a store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct TableKey(u32);

impl TableKey {
    /// Create a table key from its raw value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table({})", self.0)
    }
}

/// Identifies an object within a table.
///
/// Live keys are non-negative. Setting the sign bit produces the
/// *unresolved* counterpart of a live key: the tombstone form a link takes
/// when its target has been invalidated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct ObjKey(i64);

impl ObjKey {
    /// Create an object key from its raw value.
    #[inline]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Whether this key is the unresolved (tombstone) form.
    #[inline]
    pub const fn is_unresolved(self) -> bool {
        self.0 < 0
    }

    /// The unresolved counterpart of this key.
    #[inline]
    pub const fn unresolved_of(self) -> Self {
        Self(self.0 | i64::MIN)
    }

    /// The live counterpart of this key (strips the unresolved bit).
    #[inline]
    pub const fn resolved_of(self) -> Self {
        Self(self.0 & i64::MAX)
    }
}

impl fmt::Display for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unresolved() {
            write!(f, "obj(~{})", self.resolved_of().0)
        } else {
            write!(f, "obj({})", self.0)
        }
    }
}

/// A fully qualified reference to an object: table plus object key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ObjLink {
    /// The target table.
    pub table: TableKey,
    /// The target object.
    pub obj: ObjKey,
}

impl ObjLink {
    /// Create a link from table and object keys.
    #[inline]
    pub const fn new(table: TableKey, obj: ObjKey) -> Self {
        Self { table, obj }
    }

    /// Whether the target object key is the unresolved form.
    #[inline]
    pub const fn is_unresolved(self) -> bool {
        self.obj.is_unresolved()
    }
}

impl fmt::Display for ObjLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.obj)
    }
}

/// What kind of storage a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ColumnKind {
    /// A single scalar slot.
    Scalar,
    /// A persistent dictionary.
    Dictionary,
}

/// Identifies a column and carries its declared shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ColKey {
    idx: u32,
    data_type: DataType,
    nullable: bool,
    kind: ColumnKind,
}

impl ColKey {
    /// Create a column key.
    pub const fn new(idx: u32, data_type: DataType, nullable: bool, kind: ColumnKind) -> Self {
        Self {
            idx,
            data_type,
            nullable,
            kind,
        }
    }

    /// Column position within its table.
    #[inline]
    pub const fn idx(self) -> u32 {
        self.idx
    }

    /// Declared value type.
    #[inline]
    pub const fn data_type(self) -> DataType {
        self.data_type
    }

    /// Whether null values are accepted.
    #[inline]
    pub const fn is_nullable(self) -> bool {
        self.nullable
    }

    /// Whether this column holds a dictionary.
    #[inline]
    pub const fn is_dictionary(self) -> bool {
        matches!(self.kind, ColumnKind::Dictionary)
    }
}
