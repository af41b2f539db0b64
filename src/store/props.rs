// Flat property documents, as stored. Accessors are strict: a required
// field that is absent or of the wrong JSON type surfaces as MissingField
// (a schema mismatch is treated the same as a missing value).

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::store::key::Kind;

pub type Properties = serde_json::Map<String, Value>;

pub fn req_str(props: &Properties, kind: Kind, field: &'static str) -> StoreResult<String> {
    match props.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(StoreError::missing_field(kind, field)),
    }
}

pub fn req_i64(props: &Properties, kind: Kind, field: &'static str) -> StoreResult<i64> {
    match props.get(field).and_then(Value::as_i64) {
        Some(n) => Ok(n),
        None => Err(StoreError::missing_field(kind, field)),
    }
}

pub fn opt_str(props: &Properties, field: &str) -> Option<String> {
    match props.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

pub fn req_str_list(props: &Properties, kind: Kind, field: &'static str) -> StoreResult<Vec<String>> {
    match props.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(StoreError::missing_field(kind, field)),
            })
            .collect(),
        _ => Err(StoreError::missing_field(kind, field)),
    }
}

/// Like req_str_list, but an absent field reads as empty. Used for fields
/// that older records predate.
pub fn opt_str_list(props: &Properties, field: &str) -> Vec<String> {
    match props.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
