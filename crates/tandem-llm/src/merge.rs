//! Recursive delta merge.
//!
//! The merge rule, applied per key of a delta object against the
//! accumulator:
//!
//! - accumulator lacks the key: adopt the delta value verbatim, dropping
//!   transient `index` markers from newly adopted list elements
//! - both strings: concatenate
//! - both arrays: element-wise positional merge, padding with `Null`
//! - both objects: recurse
//! - anything else: the delta value wins
//!
//! Correctness here is load-bearing: a tool call's `arguments` string is
//! itself streamed as fragments of JSON text, and only this rule makes it
//! reassemble across chunks while the tool-call list grows one element at a
//! time.

use serde_json::Value;

/// Merge one delta into the accumulator, in place.
pub fn merge_delta(acc: &mut Value, delta: &Value) {
    match (&mut *acc, delta) {
        (Value::Object(a), Value::Object(d)) => {
            for (key, delta_value) in d {
                match a.get_mut(key) {
                    Some(acc_value) => merge_delta(acc_value, delta_value),
                    None => {
                        let _ = a.insert(key.clone(), adopt(delta_value));
                    }
                }
            }
        }
        (Value::String(a), Value::String(d)) => a.push_str(d),
        (Value::Array(a), Value::Array(d)) => {
            for (i, delta_value) in d.iter().enumerate() {
                if i >= a.len() {
                    a.resize(i + 1, Value::Null);
                }
                if a[i].is_null() {
                    a[i] = adopt_list_element(delta_value);
                } else {
                    merge_delta(&mut a[i], delta_value);
                }
            }
        }
        (Value::Null, _) => *acc = adopt(delta),
        (a, d) => *a = adopt(d),
    }
}

/// Clone a delta value for adoption, stripping `index` from list elements.
fn adopt(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(adopt_list_element).collect()),
        other => other.clone(),
    }
}

fn adopt_list_element(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut cleaned = map.clone();
            let _ = cleaned.remove("index");
            Value::Object(cleaned)
        }
        other => adopt(other),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
