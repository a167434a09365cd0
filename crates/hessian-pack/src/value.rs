//! Decoded Hessian value model.
//!
//! Composite values (lists, maps, objects) are held behind `Rc<RefCell<…>>`
//! handles so back-references in the wire format resolve to shared, possibly
//! cyclic, values. Reference identity survives decoding and can be observed
//! with [`Rc::ptr_eq`].

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};

/// Shared handle to a decoded list.
pub type ListRef = Rc<RefCell<Vec<Value>>>;
/// Shared handle to a decoded map.
pub type MapRef = Rc<RefCell<HessianMap>>;
/// Shared handle to a decoded object instance.
pub type ObjectRef = Rc<RefCell<HessianObject>>;

/// A decoded Hessian 2.0 value.
///
/// Derived equality is structural; comparing cyclic values recurses without
/// bound, so cyclic graphs should be compared by handle identity instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Date(DateTime<Utc>),
    Str(String),
    /// Binary blob, distinct from `Str`.
    Bytes(Vec<u8>),
    List(ListRef),
    Map(MapRef),
    Object(ObjectRef),
}

impl Value {
    /// Wraps a plain vector of values in a fresh shared list handle.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Wraps a map in a fresh shared handle.
    pub fn map(map: HessianMap) -> Self {
        Value::Map(Rc::new(RefCell::new(map)))
    }

    /// Wraps an object in a fresh shared handle.
    pub fn object(object: HessianObject) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` if `self` and `other` are the same composite handle.
    ///
    /// Scalars are never handle-identical.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Insertion-ordered map with arbitrary value keys.
///
/// Hessian map keys may be integers, strings, or composite values, so entries
/// are kept as an ordered association list rather than a hashed container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HessianMap {
    entries: Vec<(Value, Value)>,
}

impl HessianMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` to `key`, replacing an existing equal key in place.
    pub fn insert(&mut self, key: Value, value: Value) {
        for entry in &mut self.entries {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

impl FromIterator<(Value, Value)> for HessianMap {
    fn from_iter<T: IntoIterator<Item = (Value, Value)>>(iter: T) -> Self {
        let mut map = HessianMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// A decoded object instance: a class name and an ordered field bag.
///
/// Fields are addressed by name through a uniform `get`/`set` interface; no
/// types are synthesized at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct HessianObject {
    class: String,
    fields: Vec<(String, Value)>,
}

impl HessianObject {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: Vec::new(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Assigns a field, replacing an existing one of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        for field in &mut self.fields {
            if field.0 == name {
                field.1 = value;
                return;
            }
        }
        self.fields.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.fields.iter()
    }
}
