//! Property codec: typed values to/from their relational row representation
//!
//! One codec per property kind, selected by the kind tag stored with each
//! property. Values pass through verbatim: no trimming, no numeric
//! normalization, list order and element count preserved exactly.

use crate::class::PropertyKind;
use crate::error::{Result, StoreError};
use crate::object::PropertyValue;

/// Row-group representation of one property: a scalar row or one row per
/// list element (keyed by item index in the backend).
#[derive(Debug, Clone, PartialEq)]
pub enum RowPayload {
    Text(String),
    Number(i64),
    Items(Vec<String>),
}

/// Encode a value for storage under the given kind.
///
/// A shape/kind mismatch is a [`StoreError::TypeMismatch`]; the caller
/// must reject the whole write.
pub fn encode(name: &str, value: &PropertyValue, kind: PropertyKind) -> Result<RowPayload> {
    match (kind, value) {
        (
            PropertyKind::String | PropertyKind::TextArea | PropertyKind::StaticList,
            PropertyValue::Text(s),
        ) => Ok(RowPayload::Text(s.clone())),
        (PropertyKind::Number, PropertyValue::Number(n)) => Ok(RowPayload::Number(*n)),
        (k, PropertyValue::List(items)) if k.is_list() => Ok(RowPayload::Items(items.clone())),
        (k, v) => Err(StoreError::type_mismatch(
            name,
            format!("cannot store a {} value as {}", v.shape(), k),
        )),
    }
}

/// Decode a stored row group back into a value of the given kind.
///
/// A stored shape that does not fit the declared kind is a
/// [`StoreError::Decode`]; strictness policy is decided by the caller.
pub fn decode(name: &str, payload: RowPayload, kind: PropertyKind) -> Result<PropertyValue> {
    match (kind, payload) {
        (
            PropertyKind::String | PropertyKind::TextArea | PropertyKind::StaticList,
            RowPayload::Text(s),
        ) => Ok(PropertyValue::Text(s)),
        (PropertyKind::Number, RowPayload::Number(n)) => Ok(PropertyValue::Number(n)),
        (k, RowPayload::Items(items)) if k.is_list() => Ok(PropertyValue::List(items)),
        (k, p) => Err(StoreError::decode(
            name,
            format!("stored row group {:?} does not fit declared kind {}", p, k),
        )),
    }
}
