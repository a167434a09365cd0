//! Hessian 2.0 encoder.
//!
//! The complement of the streaming decoder. Every value is written in its
//! most compact opcode form. Composite values are tracked by handle identity
//! so shared and cyclic graphs come out as back-references, and class
//! definitions are emitted once per distinct `(class, field names)` shape.

use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::constants::*;
use crate::value::{ListRef, MapRef, ObjectRef, Value};
use crate::writer::Writer;

/// Hessian 2.0 encoder.
pub struct HessianEncoder {
    pub writer: Writer,
    /// Handle identity of every composite written so far, in write order.
    /// Mirrors the decoder's reference table.
    refs: Vec<*const ()>,
    /// Class definitions emitted so far, in emission order.
    defs: Vec<(String, Vec<String>)>,
}

impl Default for HessianEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HessianEncoder {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(),
            refs: Vec::new(),
            defs: Vec::new(),
        }
    }

    /// Encodes one top-level value.
    pub fn encode(&mut self, value: &Value) -> Vec<u8> {
        self.writer.reset();
        self.refs.clear();
        self.defs.clear();
        self.write_any(value);
        self.writer.flush()
    }

    pub fn write_any(&mut self, value: &Value) {
        match value {
            Value::Null => self.writer.u8(NULL),
            Value::Bool(true) => self.writer.u8(TRUE),
            Value::Bool(false) => self.writer.u8(FALSE),
            Value::Int(n) => self.write_int(*n),
            Value::Long(n) => self.write_long(*n),
            Value::Double(v) => self.write_double(*v),
            Value::Date(d) => self.write_date(d),
            Value::Str(s) => self.write_str(s),
            Value::Bytes(b) => self.write_bytes(b),
            Value::List(list) => self.write_list(list),
            Value::Map(map) => self.write_map(map),
            Value::Object(object) => self.write_object(object),
        }
    }

    pub fn write_int(&mut self, value: i32) {
        if (-16..=47).contains(&value) {
            self.writer.u8((value + INT_1_BIAS as i32) as u8);
        } else if (-2048..=2047).contains(&value) {
            self.writer.u8((INT_2_BIAS as i32 + (value >> 8)) as u8);
            self.writer.u8(value as u8);
        } else if (-262_144..=262_143).contains(&value) {
            self.writer.u8((INT_3_BIAS as i32 + (value >> 16)) as u8);
            self.writer.u8((value >> 8) as u8);
            self.writer.u8(value as u8);
        } else {
            self.writer.u8(INT_4);
            self.writer.u32(value as u32);
        }
    }

    pub fn write_long(&mut self, value: i64) {
        if (-8..=15).contains(&value) {
            self.writer.u8((value + LONG_1_BIAS as i64) as u8);
        } else if (-2048..=2047).contains(&value) {
            self.writer.u8((LONG_2_BIAS as i64 + (value >> 8)) as u8);
            self.writer.u8(value as u8);
        } else if (-262_144..=262_143).contains(&value) {
            self.writer.u8((LONG_3_BIAS as i64 + (value >> 16)) as u8);
            self.writer.u8((value >> 8) as u8);
            self.writer.u8(value as u8);
        } else if i32::try_from(value).is_ok() {
            self.writer.u8(LONG_4);
            self.writer.u32(value as i32 as u32);
        } else {
            self.writer.u8(LONG_8);
            self.writer.u64(value as u64);
        }
    }

    pub fn write_double(&mut self, value: f64) {
        let bits = value.to_bits();
        if bits == 0f64.to_bits() {
            self.writer.u8(DOUBLE_ZERO);
            return;
        }
        if bits == 1f64.to_bits() {
            self.writer.u8(DOUBLE_ONE);
            return;
        }
        let truncated = value as i32;
        if (truncated as f64).to_bits() == bits {
            if (-128..=127).contains(&truncated) {
                self.writer.u8(DOUBLE_1);
                self.writer.u8(truncated as u8);
                return;
            }
            if (-32_768..=32_767).contains(&truncated) {
                self.writer.u8(DOUBLE_2);
                self.writer.u16(truncated as i16 as u16);
                return;
            }
        }
        let single = value as f32;
        if (single as f64).to_bits() == bits {
            self.writer.u8(DOUBLE_4);
            self.writer.f32(single);
        } else {
            self.writer.u8(DOUBLE_8);
            self.writer.f64(value);
        }
    }

    pub fn write_date(&mut self, value: &DateTime<Utc>) {
        let millis = value.timestamp_millis();
        let minutes = millis / 60_000;
        if millis % 60_000 == 0 && i32::try_from(minutes).is_ok() {
            self.writer.u8(DATE_MINUTES);
            self.writer.u32(minutes as i32 as u32);
        } else {
            self.writer.u8(DATE_MILLIS);
            self.writer.u64(millis as u64);
        }
    }

    /// Writes a string. Length prefixes count Unicode characters, matching
    /// the decoder's accumulation rule.
    pub fn write_str(&mut self, value: &str) {
        let chars = value.chars().count();
        if chars <= STR_COMPACT_MAX as usize {
            self.writer.u8(chars as u8);
            self.writer.buf(value.as_bytes());
        } else if chars <= 0x3ff {
            self.writer.u8(STR_SHORT_MIN + (chars >> 8) as u8);
            self.writer.u8(chars as u8);
            self.writer.buf(value.as_bytes());
        } else {
            let mut rest = value;
            let mut rest_chars = chars;
            while rest_chars > CHUNK_MAX {
                let split = char_boundary(rest, CHUNK_MAX);
                self.writer.u8(STR_CHUNK);
                self.writer.u16(CHUNK_MAX as u16);
                self.writer.buf(&rest.as_bytes()[..split]);
                rest = &rest[split..];
                rest_chars -= CHUNK_MAX;
            }
            self.writer.u8(STR_FINAL);
            self.writer.u16(rest_chars as u16);
            self.writer.buf(rest.as_bytes());
        }
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        let len = value.len();
        if len <= (BIN_COMPACT_MAX - BIN_COMPACT_MIN) as usize {
            self.writer.u8(BIN_COMPACT_MIN + len as u8);
            self.writer.buf(value);
        } else if len <= 0x3ff {
            self.writer.u8(BIN_SHORT_MIN + (len >> 8) as u8);
            self.writer.u8(len as u8);
            self.writer.buf(value);
        } else {
            let mut rest = value;
            while rest.len() > CHUNK_MAX {
                self.writer.u8(BIN_CHUNK);
                self.writer.u16(CHUNK_MAX as u16);
                self.writer.buf(&rest[..CHUNK_MAX]);
                rest = &rest[CHUNK_MAX..];
            }
            self.writer.u8(BIN_FINAL);
            self.writer.u16(rest.len() as u16);
            self.writer.buf(rest);
        }
    }

    fn write_list(&mut self, list: &ListRef) {
        if self.back_reference(Rc::as_ptr(list) as *const ()) {
            return;
        }
        let items = list.borrow();
        if items.len() <= (VECTOR_FIXED_MAX - VECTOR_FIXED_MIN) as usize {
            self.writer.u8(VECTOR_FIXED_MIN + items.len() as u8);
        } else {
            self.writer.u8(VECTOR_FIXED);
            self.write_int(items.len() as i32);
        }
        for item in items.iter() {
            self.write_any(item);
        }
    }

    fn write_map(&mut self, map: &MapRef) {
        if self.back_reference(Rc::as_ptr(map) as *const ()) {
            return;
        }
        self.writer.u8(MAP);
        let entries = map.borrow();
        for (key, value) in entries.iter() {
            self.write_any(key);
            self.write_any(value);
        }
        self.writer.u8(END);
    }

    fn write_object(&mut self, object: &ObjectRef) {
        if self.back_reference(Rc::as_ptr(object) as *const ()) {
            return;
        }
        let instance = object.borrow();
        let class = instance.class().to_string();
        let fields: Vec<String> = instance.iter().map(|(name, _)| name.clone()).collect();
        let index = match self
            .defs
            .iter()
            .position(|(c, f)| *c == class && *f == fields)
        {
            Some(index) => index,
            None => {
                self.writer.u8(CLASS_DEF);
                self.write_str(&class);
                self.write_int(fields.len() as i32);
                for name in &fields {
                    self.write_str(name);
                }
                self.defs.push((class, fields));
                self.defs.len() - 1
            }
        };
        if index <= (OBJECT_COMPACT_MAX - OBJECT_COMPACT_MIN) as usize {
            self.writer.u8(OBJECT_COMPACT_MIN + index as u8);
        } else {
            self.writer.u8(OBJECT);
            self.write_int(index as i32);
        }
        for (_, value) in instance.iter() {
            self.write_any(value);
        }
    }

    /// Writes a back-reference if this composite was already written;
    /// otherwise registers it and returns `false`.
    fn back_reference(&mut self, ptr: *const ()) -> bool {
        if let Some(index) = self.refs.iter().position(|&p| p == ptr) {
            self.writer.u8(REF);
            self.write_int(index as i32);
            true
        } else {
            self.refs.push(ptr);
            false
        }
    }
}

/// Byte offset of the `chars`-th character, or the string's length.
fn char_boundary(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}
