use serde_json::Value;

use crate::store::key::{Key, Kind};

/// A query over one kind: optional ancestor scope, equality filters on
/// properties, and a single-field sort. Prefix the order field with '-' for
/// descending ("-created"), otherwise ascending.
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) kind: Kind,
    pub(crate) ancestor: Option<Key>,
    pub(crate) filters: Vec<(String, Value)>,
    pub(crate) order: Option<String>,
}

impl Query {
    pub fn kind(kind: Kind) -> Self {
        Self {
            kind,
            ancestor: None,
            filters: Vec::new(),
            order: None,
        }
    }

    /// Restrict results to direct children of the given key.
    pub fn ancestor(mut self, key: Key) -> Self {
        self.ancestor = Some(key);
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order(mut self, field: impl Into<String>) -> Self {
        self.order = Some(field.into());
        self
    }
}
