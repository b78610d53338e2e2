use thiserror::Error;

/// Primary error type for cairn store operations.
///
/// Structured variants for the conditions a caller can act on, plus the
/// internal signals (`SlotAlreadyUsed`, `SlotNotFound`) that the collection
/// layer catches before they ever reach an application.
#[derive(Error, Debug)]
pub enum StoreError {
    // === Schema / accessor errors ===
    /// Accessor constructed on a column that is not the requested collection
    /// kind, or a key whose runtime type does not match the declared key type.
    #[error("collection type mismatch: {detail}")]
    CollectionTypeMismatch { detail: String },

    /// Value type incompatible with the declared column type, or null
    /// inserted into a non-nullable column.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Dictionary key is syntactically reserved.
    #[error("invalid key: {reason}")]
    InvalidKey { reason: String },

    /// A typed link targets a table other than the column's opposite table.
    #[error("wrong object type: expected table {expected}, got table {actual}")]
    WrongObjectType { expected: u32, actual: u32 },

    /// A link target is neither a tombstone nor a live object.
    #[error("target object is out of range")]
    TargetOutOfRange,

    /// Operation invoked on a handle whose parent object is no longer live.
    #[error("accessor is detached")]
    DetachedAccessor,

    // === Lookup errors ===
    /// Point lookup on a missing dictionary key.
    #[error("key not found")]
    KeyNotFound,

    /// Positional access beyond the current size.
    #[error("index {index} out of range (size {size})")]
    IndexOutOfRange { index: usize, size: usize },

    // === Internal tree signals ===
    /// Insert hit an occupied slot id. Always caught by the dictionary
    /// layer and converted to an update.
    #[error("slot already used")]
    SlotAlreadyUsed,

    /// Tree lookup on a missing slot id. Translated to `KeyNotFound` or a
    /// not-found sentinel before reaching the application.
    #[error("slot not found")]
    SlotNotFound,

    // === Resource / feature errors ===
    /// Arena allocation failure.
    #[error("out of memory")]
    OutOfMemory,

    /// Feature not supported (e.g. a key type other than Int or String).
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Stable numeric codes for embedders that ship errors across an FFI or
/// logging boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Successful result.
    Ok = 0,
    /// Collection/accessor misuse.
    Misuse = 1,
    /// Data type mismatch.
    Mismatch = 2,
    /// Reserved key syntax.
    BadKey = 3,
    /// Link constraint violation.
    Constraint = 4,
    /// Lookup miss.
    NotFound = 5,
    /// Positional range error.
    Range = 6,
    /// Detached accessor.
    Detached = 7,
    /// Out of memory.
    NoMem = 8,
    /// Internal tree signal leaked (indicates a bug in the caller layer).
    Internal = 9,
    /// Unsupported feature.
    Unsupported = 10,
}

impl StoreError {
    /// Map this error to its stable numeric code.
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::CollectionTypeMismatch { .. } => ErrorCode::Misuse,
            Self::TypeMismatch { .. } => ErrorCode::Mismatch,
            Self::InvalidKey { .. } => ErrorCode::BadKey,
            Self::WrongObjectType { .. } | Self::TargetOutOfRange => ErrorCode::Constraint,
            Self::KeyNotFound => ErrorCode::NotFound,
            Self::IndexOutOfRange { .. } => ErrorCode::Range,
            Self::DetachedAccessor => ErrorCode::Detached,
            Self::OutOfMemory => ErrorCode::NoMem,
            Self::SlotAlreadyUsed | Self::SlotNotFound => ErrorCode::Internal,
            Self::NotImplemented(_) => ErrorCode::Unsupported,
        }
    }

    /// Whether the caller can likely fix this without code changes
    /// (bad input rather than a broken invariant).
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. }
                | Self::InvalidKey { .. }
                | Self::WrongObjectType { .. }
                | Self::TargetOutOfRange
                | Self::KeyNotFound
                | Self::IndexOutOfRange { .. }
        )
    }

    /// Whether this is an internal signal that must never cross the
    /// collection boundary.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::SlotAlreadyUsed | Self::SlotNotFound)
    }

    /// Create a `CollectionTypeMismatch` error.
    pub fn collection_mismatch(detail: impl Into<String>) -> Self {
        Self::CollectionTypeMismatch {
            detail: detail.into(),
        }
    }

    /// Create a `TypeMismatch` error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an `InvalidKey` error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Create a `NotImplemented` error.
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented(feature.into())
    }
}

/// Result type alias using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;
