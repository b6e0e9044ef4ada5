//! The [`Document`] record type.
//!
//! A document is an insertion-ordered mapping from field name to JSON value.
//! Every stored document carries a string `_id`; callers may supply `id`
//! instead, which is moved into `_id` on insert.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Primary identifier field.
pub const ID_FIELD: &str = "_id";
/// Caller-facing alias normalized into [`ID_FIELD`].
pub const ID_ALIAS: &str = "id";
/// Stamped once at insertion.
pub const CREATED_AT: &str = "created_at";
/// Stamped at insertion, refreshed by every successful update.
pub const UPDATED_AT: &str = "updated_at";

/// A single record: an ordered field-to-value mapping.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a document from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::InvalidDocument(format!(
                "expected an object, got {}",
                kind_name(&other)
            ))),
        }
    }

    /// The document's `_id`, if assigned.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Make sure the identifier lives under `_id` as a string.
    ///
    /// An existing `_id` wins over `id`; `id` is only consumed when `_id` is
    /// absent. Numeric identifiers are rendered as strings.
    pub(crate) fn normalize_id(&mut self) -> StoreResult<()> {
        if let Some(slot) = self.0.get_mut(ID_FIELD) {
            *slot = Value::String(id_string(slot)?);
        } else if let Some(raw) = self.0.remove(ID_ALIAS) {
            let id = id_string(&raw)?;
            self.0.insert(ID_FIELD.to_string(), Value::String(id));
        }
        Ok(())
    }
}

fn id_string(raw: &Value) -> StoreResult<String> {
    match raw {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(StoreError::InvalidDocument(format!(
            "identifier must be a non-empty string or a number, got {}",
            kind_name(other)
        ))),
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Document {
    type Error = StoreError;

    fn try_from(value: Value) -> StoreResult<Self> {
        Self::from_value(value)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Human-readable name of a JSON value's type, for error messages.
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Document::from_value(json!([1, 2])).is_err());
        assert!(Document::from_value(json!("pet")).is_err());
        assert!(Document::from_value(Value::Null).is_err());
    }

    #[test]
    fn field_order_is_preserved() {
        let d = doc(json!({"zeta": 1, "alpha": 2, "mid": 3}));
        let keys: Vec<&str> = d.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn alias_moves_into_primary_id() {
        let mut d = doc(json!({"id": "p-1", "name": "Rex"}));
        d.normalize_id().unwrap();
        assert_eq!(d.id(), Some("p-1"));
        assert!(!d.contains(ID_ALIAS));
    }

    #[test]
    fn primary_id_wins_over_alias() {
        let mut d = doc(json!({"_id": "a", "id": "b"}));
        d.normalize_id().unwrap();
        assert_eq!(d.id(), Some("a"));
        assert_eq!(d.get(ID_ALIAS), Some(&json!("b")));
    }

    #[test]
    fn numeric_id_is_stringified() {
        let mut d = doc(json!({"_id": 42}));
        d.normalize_id().unwrap();
        assert_eq!(d.id(), Some("42"));
    }

    #[test]
    fn missing_id_stays_missing() {
        let mut d = doc(json!({"name": "Rex"}));
        d.normalize_id().unwrap();
        assert_eq!(d.id(), None);
    }

    #[test]
    fn invalid_ids_are_rejected() {
        for bad in [json!(true), json!(null), json!(""), json!({"a": 1}), json!([1])] {
            let mut d = doc(json!({ "_id": bad }));
            assert!(matches!(d.normalize_id(), Err(StoreError::InvalidDocument(_))));
        }
    }

    #[test]
    fn serde_is_transparent() {
        let d = doc(json!({"_id": "x", "n": 1}));
        assert_eq!(serde_json::to_string(&d).unwrap(), r#"{"_id":"x","n":1}"#);
    }
}
