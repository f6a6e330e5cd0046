//! Deep merge and structural equality over JSON payloads.

use serde_json::{Map, Value};

/// Merge `source` into `target`.
///
/// Objects merge key by key recursively, arrays concatenate (no dedup), and
/// anything else is replaced by `source`.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            for (key, value) in s {
                match t.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        t.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(t), Value::Array(s)) => t.extend(s.iter().cloned()),
        (t, s) => *t = s.clone(),
    }
}

/// Fold payloads into one value, starting from an empty object.
///
/// `null` payloads carry nothing and are skipped.
pub(crate) fn merge_payloads<'a>(payloads: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut merged = Value::Object(Map::new());
    for payload in payloads {
        if payload.is_null() {
            continue;
        }
        deep_merge(&mut merged, payload);
    }
    merged
}

pub(crate) fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}

/// Structural equality where `1` and `1.0` compare equal.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) if x.is_f64() || y.is_f64() => fx == fy,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| deep_equal(v, other)))
        }
        _ => a == b,
    }
}
