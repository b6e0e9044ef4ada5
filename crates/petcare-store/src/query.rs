//! Equality matching and the `$set` / `$inc` update interpreter.
//!
//! A query is a mapping of field to expected value. A document matches when
//! every queried field is present and deep-equal to the expected value. There
//! are no comparison, regex or nested-path operators.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::document::{kind_name, Document, ID_FIELD};
use crate::error::{StoreError, StoreResult};

/// Field-to-expected-value equality filter.
pub type Query = Map<String, Value>;

/// Overwrite operator.
pub const SET: &str = "$set";
/// Numeric increment operator.
pub const INC: &str = "$inc";

/// Whether `document` satisfies `query`. An absent or empty query matches
/// everything.
pub fn matches(document: &Document, query: Option<&Query>) -> bool {
    let Some(query) = query else {
        return true;
    };
    query.iter().all(|(field, expected)| {
        document
            .get(field)
            .is_some_and(|actual| values_equal(actual, expected))
    })
}

/// Deep value equality.
///
/// Numbers compare by numeric value (`1 == 1.0`), arrays element-wise and
/// objects key-wise regardless of field order.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Total order over JSON values:
/// null < boolean < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let mut left: Vec<_> = x.iter().collect();
            let mut right: Vec<_> = y.iter().collect();
            left.sort_by(|p, q| p.0.cmp(q.0));
            right.sort_by(|p, q| p.0.cmp(q.0));
            for ((lk, lv), (rk, rv)) in left.iter().zip(&right) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            left.len().cmp(&right.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a.cmp(&b);
    }
    // JSON numbers are never NaN, so this is total; it also keeps -0.0 == 0.0.
    let a = x.as_f64().unwrap_or_default();
    let b = y.as_f64().unwrap_or_default();
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// A parsed update payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// `{"$set": {...}}`: overwrite each named field.
    Set(Map<String, Value>),
    /// `{"$inc": {...}}`: add a numeric delta, treating absent fields as zero.
    Inc(Map<String, Value>),
    /// No operator: shallow-merge the payload into the document.
    Merge(Map<String, Value>),
}

impl Update {
    /// Parse an update payload.
    ///
    /// `$set` takes precedence: when a payload carries both `$set` and `$inc`,
    /// the `$inc` part is ignored (and logged). Any other `$`-prefixed key is
    /// rejected rather than merged as a literal field.
    pub fn parse(mut payload: Map<String, Value>) -> StoreResult<Self> {
        if let Some(set) = payload.remove(SET) {
            if payload.contains_key(INC) {
                warn!("update carries both $set and $inc; $inc is ignored");
            }
            return Ok(Self::Set(operator_fields(SET, set)?));
        }
        if let Some(inc) = payload.remove(INC) {
            let fields = operator_fields(INC, inc)?;
            for (field, delta) in &fields {
                if !delta.is_number() {
                    return Err(StoreError::InvalidUpdate(format!(
                        "$inc delta for {field:?} must be a number, got {}",
                        kind_name(delta)
                    )));
                }
            }
            return Ok(Self::Inc(fields));
        }
        if let Some(op) = payload.keys().find(|k| k.starts_with('$')) {
            return Err(StoreError::InvalidUpdate(format!(
                "unsupported update operator {op:?}"
            )));
        }
        Ok(Self::Merge(payload))
    }

    /// Parse an update from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(map) => Self::parse(map),
            other => Err(StoreError::InvalidUpdate(format!(
                "update must be an object, got {}",
                kind_name(&other)
            ))),
        }
    }

    /// The fields this update touches.
    pub fn fields(&self) -> &Map<String, Value> {
        match self {
            Self::Set(fields) | Self::Inc(fields) | Self::Merge(fields) => fields,
        }
    }

    /// Whether applying this update would write no fields.
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Apply to `document`. Returns `true` if any field was written.
    ///
    /// Validation happens before the first write, so a failed update leaves
    /// the document untouched.
    pub(crate) fn apply(&self, document: &mut Document) -> StoreResult<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let writes: Vec<(String, Value)> = match self {
            Self::Set(fields) | Self::Merge(fields) => {
                if let Some(new_id) = fields.get(ID_FIELD) {
                    let unchanged = document
                        .get(ID_FIELD)
                        .is_some_and(|current| values_equal(current, new_id));
                    if !unchanged {
                        return Err(StoreError::InvalidUpdate("_id is immutable".into()));
                    }
                }
                fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            Self::Inc(fields) => fields
                .iter()
                .map(|(field, delta)| increment(document, field, delta).map(|v| (field.clone(), v)))
                .collect::<StoreResult<_>>()?,
        };
        let map = document.as_map_mut();
        for (field, value) in writes {
            map.insert(field, value);
        }
        Ok(true)
    }
}

fn operator_fields(op: &str, value: Value) -> StoreResult<Map<String, Value>> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidUpdate(format!(
            "{op} expects an object, got {}",
            kind_name(&other)
        ))),
    }
}

fn increment(document: &Document, field: &str, delta: &Value) -> StoreResult<Value> {
    if field == ID_FIELD {
        return Err(StoreError::InvalidUpdate("_id is immutable".into()));
    }
    let Value::Number(delta) = delta else {
        return Err(StoreError::InvalidUpdate(format!(
            "$inc delta for {field:?} must be a number"
        )));
    };
    let current = match document.get(field) {
        None => return Ok(Value::Number(delta.clone())),
        Some(Value::Number(n)) => n,
        Some(other) => {
            return Err(StoreError::InvalidUpdate(format!(
                "cannot $inc field {field:?} holding a {}",
                kind_name(other)
            )))
        }
    };
    add_numbers(current, delta)
        .map(Value::Number)
        .ok_or_else(|| StoreError::InvalidUpdate(format!("$inc on {field:?} overflowed")))
}

fn add_numbers(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(sum.into());
        }
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(sum.into());
        }
    }
    Number::from_f64(a.as_f64()? + b.as_f64()?)
}
