//! Lossy conversion of decoded Hessian values to JSON.

use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::value::Value;

const BINARY_URI_PREFIX: &str = "data:application/octet-stream;base64,";

/// Converts a decoded value into a [`serde_json::Value`].
///
/// Binary blobs become base64 data-URI strings, dates become RFC 3339
/// strings, and non-string map keys are stringified. The conversion is
/// cycle-safe: a composite revisited through a cycle renders as `null`.
pub fn to_json(value: &Value) -> serde_json::Value {
    convert(value, &mut Vec::new())
}

fn convert(value: &Value, visiting: &mut Vec<*const ()>) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Null,
        Value::Bool(v) => Json::Bool(*v),
        Value::Int(n) => Json::from(*n),
        Value::Long(n) => Json::from(*n),
        Value::Double(v) => serde_json::Number::from_f64(*v)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Date(d) => Json::String(d.to_rfc3339()),
        Value::Str(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::String(format!("{BINARY_URI_PREFIX}{}", BASE64.encode(b))),
        Value::List(list) => {
            let ptr = Rc::as_ptr(list) as *const ();
            if visiting.contains(&ptr) {
                return Json::Null;
            }
            visiting.push(ptr);
            let items = list.borrow().iter().map(|v| convert(v, visiting)).collect();
            visiting.pop();
            Json::Array(items)
        }
        Value::Map(map) => {
            let ptr = Rc::as_ptr(map) as *const ();
            if visiting.contains(&ptr) {
                return Json::Null;
            }
            visiting.push(ptr);
            let mut out = serde_json::Map::new();
            let entries = map.borrow();
            for (key, val) in entries.iter() {
                out.insert(key_string(key, visiting), convert(val, visiting));
            }
            drop(entries);
            visiting.pop();
            Json::Object(out)
        }
        Value::Object(object) => {
            let ptr = Rc::as_ptr(object) as *const ();
            if visiting.contains(&ptr) {
                return Json::Null;
            }
            visiting.push(ptr);
            let mut out = serde_json::Map::new();
            let instance = object.borrow();
            for (name, val) in instance.iter() {
                out.insert(name.clone(), convert(val, visiting));
            }
            drop(instance);
            visiting.pop();
            Json::Object(out)
        }
    }
}

fn key_string(key: &Value, visiting: &mut Vec<*const ()>) -> String {
    match key {
        Value::Str(s) => s.clone(),
        Value::Int(n) => n.to_string(),
        Value::Long(n) => n.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        other => convert(other, visiting).to_string(),
    }
}
