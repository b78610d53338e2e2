//! Value and key normalization at the dictionary boundary.
//!
//! Write path: nullability and type checks, link-type coercion (untyped
//! links are rewritten to their typed form), and target validation against
//! the object resolver. Read path: unresolved links filter to null, and
//! `Link` columns project typed links down to the bare object key.

use cairn_error::{Result, StoreError};
use cairn_types::{DataType, ObjLink, Value};

use crate::store::{ColumnSpec, StoreInner};

/// A value ready for the tree, plus the link it establishes (if any) for
/// backlink bookkeeping. Unresolved links establish no backlink.
pub(crate) struct NormalizedValue {
    pub(crate) value: Value,
    pub(crate) new_link: Option<ObjLink>,
}

impl NormalizedValue {
    fn plain(value: Value) -> Self {
        Self {
            value,
            new_link: None,
        }
    }

    fn linked(link: ObjLink) -> Self {
        Self {
            value: Value::TypedLink(link),
            new_link: (!link.is_unresolved()).then_some(link),
        }
    }
}

/// Validate a user key against the declared key type and the reserved
/// key syntax.
pub(crate) fn validate_key(key_type: DataType, key: &Value) -> Result<()> {
    match (key_type, key) {
        (DataType::Int, Value::Int(_)) | (DataType::String, Value::String(_)) => {}
        (DataType::Mixed, Value::Int(_) | Value::String(_)) => {}
        (DataType::Mixed, other) => {
            return Err(StoreError::not_implemented(format!(
                "dictionary keys of type {}",
                other.type_name()
            )))
        }
        (declared, other) => {
            return Err(StoreError::collection_mismatch(format!(
                "key of type {} on a {declared}-keyed dictionary",
                other.type_name()
            )))
        }
    }
    if let Value::String(s) = key {
        // '$' and '.' are reserved by the query and key-path syntax.
        if s.starts_with('$') {
            return Err(StoreError::invalid_key("key must not start with '$'"));
        }
        if s.contains('.') {
            return Err(StoreError::invalid_key("key must not contain '.'"));
        }
    }
    Ok(())
}

/// Apply the write-path contract to a value bound for the tree.
pub(crate) fn normalize_value(
    inner: &StoreInner,
    spec: &ColumnSpec,
    value: Value,
) -> Result<NormalizedValue> {
    let declared = spec.col.data_type();

    if value.is_null() {
        if !spec.col.is_nullable() {
            return Err(StoreError::type_mismatch(declared.name(), "Null"));
        }
        return Ok(NormalizedValue::plain(Value::Null));
    }

    match declared {
        DataType::Link => {
            // The schema guarantees a target table on link columns.
            let target = spec
                .target_table
                .ok_or_else(|| StoreError::collection_mismatch("link column has no target table"))?;
            match value {
                Value::TypedLink(link) => {
                    if link.table != target {
                        return Err(StoreError::WrongObjectType {
                            expected: target.value(),
                            actual: link.table.value(),
                        });
                    }
                    if !link.is_unresolved() {
                        inner.validate_link(link)?;
                    }
                    Ok(NormalizedValue::linked(link))
                }
                Value::Link(obj) => {
                    if !obj.is_unresolved() && !inner.is_object_valid(target, obj) {
                        return Err(StoreError::TargetOutOfRange);
                    }
                    Ok(NormalizedValue::linked(ObjLink::new(target, obj)))
                }
                other => Err(StoreError::type_mismatch("Link", other.type_name())),
            }
        }
        DataType::Mixed => match value {
            Value::TypedLink(link) => {
                if !link.is_unresolved() {
                    inner.validate_link(link)?;
                }
                Ok(NormalizedValue::linked(link))
            }
            // Untyped links carry no target table; only Link columns can
            // resolve one.
            Value::Link(_) => Err(StoreError::type_mismatch("TypedLink", "Link")),
            other => Ok(NormalizedValue::plain(other)),
        },
        declared => {
            if value.data_type() != Some(declared) {
                return Err(StoreError::type_mismatch(
                    declared.name(),
                    value.type_name(),
                ));
            }
            Ok(NormalizedValue::plain(value))
        }
    }
}

/// Apply the read-path filter to a stored value.
pub(crate) fn filter_read(declared: DataType, value: &Value) -> Value {
    match value {
        Value::TypedLink(link) => {
            if link.is_unresolved() {
                Value::Null
            } else if declared == DataType::Link {
                // The table is implicit in the column.
                Value::Link(link.obj)
            } else {
                Value::TypedLink(*link)
            }
        }
        other => other.clone(),
    }
}
