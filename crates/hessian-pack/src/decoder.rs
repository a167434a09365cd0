//! Streaming Hessian 2.0 decoder.
//!
//! The decoder is a pushdown automaton fed one byte at a time: input may be
//! delivered in arbitrary increments and no full-message buffering ever
//! happens. Composite values register in a reference table the moment their
//! frame is pushed, before their contents are decoded, which is what lets
//! back-references produce shared and cyclic object graphs.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{TimeZone, Utc};

use crate::constants::*;
use crate::error::HessianDecodeError;
use crate::frame::{ClassDef, DefRef, Frame};
use crate::value::{HessianMap, HessianObject, ListRef, MapRef, ObjectRef, Value};

/// Default cap on parse-stack depth, guarding against adversarial nesting.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// What the current top-of-stack frame does with the next input byte.
enum Step {
    Begin,
    BeginInt,
    BeginStr,
    BeginType,
    Accumulate,
    NextStrChunk,
    NextBinChunk,
    CloseVector,
    CloseMap,
}

/// Incremental Hessian 2.0 decoder.
///
/// ```
/// use hessian_pack::{HessianDecoder, Value};
///
/// let mut decoder = HessianDecoder::new();
/// decoder.feed(&[0x57, 0x90]).unwrap();
/// decoder.feed(&[0x91, b'Z']).unwrap();
/// let value = decoder.finalize().unwrap();
/// assert_eq!(value, Value::list(vec![Value::Int(0), Value::Int(1)]));
/// ```
pub struct HessianDecoder {
    stack: Vec<Frame>,
    /// Every composite created during the decode, in creation order.
    refs: Vec<Value>,
    /// Inline class definitions, in declaration order.
    defs: Vec<DefRef>,
    value: Option<Value>,
    max_depth: usize,
    poisoned: Option<HessianDecodeError>,
}

impl Default for HessianDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HessianDecoder {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Creates a decoder with a custom nesting-depth cap.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            stack: Vec::new(),
            refs: Vec::new(),
            defs: Vec::new(),
            value: None,
            max_depth,
            poisoned: None,
        }
    }

    /// Clears all decode state. Idempotent.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.refs.clear();
        self.defs.clear();
        self.value = None;
        self.poisoned = None;
    }

    /// Consumes a contiguous slice of encoded bytes.
    ///
    /// A decode error poisons the decoder: the same error is returned from
    /// every later call until [`HessianDecoder::reset`].
    pub fn feed(&mut self, data: &[u8]) -> Result<(), HessianDecodeError> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        for &byte in data {
            if let Err(err) = self.advance(byte) {
                self.poisoned = Some(err.clone());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Returns the decoded value and resets the decoder for reuse.
    ///
    /// Fails with [`HessianDecodeError::UnexpectedEnd`] if called while a
    /// value is still in progress or before any value has completed.
    pub fn finalize(&mut self) -> Result<Value, HessianDecodeError> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        match self.value.take() {
            Some(value) if self.stack.is_empty() => {
                self.reset();
                Ok(value)
            }
            _ => {
                let err = HessianDecodeError::UnexpectedEnd;
                self.poisoned = Some(err.clone());
                Err(err)
            }
        }
    }

    /// One-shot convenience: reset, feed, finalize.
    pub fn decode(&mut self, data: &[u8]) -> Result<Value, HessianDecodeError> {
        self.reset();
        self.feed(data)?;
        self.finalize()
    }

    fn advance(&mut self, byte: u8) -> Result<(), HessianDecodeError> {
        let step = match self.stack.last() {
            None => Step::Begin,
            Some(frame) if frame.is_accumulating() => Step::Accumulate,
            Some(frame) => match frame {
                Frame::StrChunkNext { .. } => Step::NextStrChunk,
                Frame::BinChunkNext { .. } => Step::NextBinChunk,
                Frame::Vector { .. } if byte == END => Step::CloseVector,
                Frame::Map { key: None, .. } if byte == END => Step::CloseMap,
                Frame::VectorSize
                | Frame::ClassDefSize { .. }
                | Frame::ObjectType
                | Frame::Reference => Step::BeginInt,
                Frame::ClassDefName { .. } | Frame::ClassDefField { .. } => Step::BeginStr,
                Frame::CollectionType => Step::BeginType,
                _ => Step::Begin,
            },
        };
        match step {
            Step::Begin => self.begin(byte),
            Step::BeginInt => self.begin_int(byte),
            Step::BeginStr => self.begin_str(byte),
            Step::BeginType => self.begin_type(byte),
            Step::Accumulate => self.accumulate(byte),
            Step::NextStrChunk => self.next_str_chunk(byte),
            Step::NextBinChunk => self.next_bin_chunk(byte),
            Step::CloseVector => match self.stack.pop() {
                Some(Frame::Vector { list }) => self.emit(Value::List(list)),
                _ => unreachable!("classified as streamed vector"),
            },
            Step::CloseMap => match self.stack.pop() {
                Some(Frame::Map { map, .. }) => self.emit(Value::Map(map)),
                _ => unreachable!("classified as map"),
            },
        }
    }

    /// Classifies the first byte of a value and either emits it directly or
    /// pushes the frames that will consume its payload.
    fn begin(&mut self, byte: u8) -> Result<(), HessianDecodeError> {
        if is_int_opener(byte) {
            return self.begin_int(byte);
        }
        if is_str_opener(byte) {
            return self.begin_str(byte);
        }
        match byte {
            NULL => self.emit(Value::Null),
            TRUE => self.emit(Value::Bool(true)),
            FALSE => self.emit(Value::Bool(false)),
            LONG_1_MIN..=LONG_1_MAX => {
                self.emit(Value::Long(byte as i64 - LONG_1_BIAS as i64))
            }
            LONG_2_MIN..=0xff => self.push(Frame::int(vec![byte.wrapping_sub(LONG_2_BIAS)], 2, true)),
            LONG_3_MIN..=LONG_3_MAX => {
                self.push(Frame::int(vec![byte.wrapping_sub(LONG_3_BIAS)], 3, true))
            }
            LONG_4 => self.push(Frame::int(Vec::new(), 4, true)),
            LONG_8 => self.push(Frame::int(Vec::new(), 8, true)),
            DOUBLE_ZERO => self.emit(Value::Double(0.0)),
            DOUBLE_ONE => self.emit(Value::Double(1.0)),
            DOUBLE_1 => self.push(Frame::Double { buf: Vec::new(), size: 1 }),
            DOUBLE_2 => self.push(Frame::Double { buf: Vec::new(), size: 2 }),
            DOUBLE_4 => self.push(Frame::Double { buf: Vec::new(), size: 4 }),
            DOUBLE_8 => self.push(Frame::Double { buf: Vec::new(), size: 8 }),
            BIN_COMPACT_MIN..=BIN_COMPACT_MAX => {
                let size = (byte - BIN_COMPACT_MIN) as usize;
                if size == 0 {
                    self.emit(Value::Bytes(Vec::new()))
                } else {
                    self.push(Frame::BinData { buf: Vec::new(), size })
                }
            }
            BIN_SHORT_MIN..=BIN_SHORT_MAX => {
                self.push(Frame::BinSize { buf: vec![byte - BIN_SHORT_MIN] })
            }
            BIN_CHUNK => self.push(Frame::BinChunkSize {
                acc: Vec::new(),
                buf: Vec::new(),
                last: false,
            }),
            BIN_FINAL => self.push(Frame::BinChunkSize {
                acc: Vec::new(),
                buf: Vec::new(),
                last: true,
            }),
            DATE_MILLIS => self.push(Frame::Date { buf: Vec::new(), minutes: false }),
            DATE_MINUTES => self.push(Frame::Date { buf: Vec::new(), minutes: true }),
            VECTOR_TYPED => {
                let list = self.new_list();
                self.push(Frame::Vector { list })?;
                self.push(Frame::CollectionType)
            }
            VECTOR_TYPED_FIXED => {
                let list = self.new_list();
                self.push(Frame::VectorFixed { list, size: None })?;
                self.push(Frame::VectorSize)?;
                self.push(Frame::CollectionType)
            }
            VECTOR => {
                let list = self.new_list();
                self.push(Frame::Vector { list })
            }
            VECTOR_FIXED => {
                let list = self.new_list();
                self.push(Frame::VectorFixed { list, size: None })?;
                self.push(Frame::VectorSize)
            }
            VECTOR_TYPED_FIXED_MIN..=VECTOR_TYPED_FIXED_MAX => {
                let size = (byte - VECTOR_TYPED_FIXED_MIN) as usize;
                let list = self.new_list();
                self.push(Frame::VectorFixed { list, size: Some(size) })?;
                self.push(Frame::CollectionType)
            }
            VECTOR_FIXED_MIN..=VECTOR_FIXED_MAX => {
                let size = (byte - VECTOR_FIXED_MIN) as usize;
                let list = self.new_list();
                if size == 0 {
                    self.emit(Value::List(list))
                } else {
                    self.push(Frame::VectorFixed { list, size: Some(size) })
                }
            }
            MAP_TYPED => {
                let map = self.new_map();
                self.push(Frame::Map { map, key: None })?;
                self.push(Frame::CollectionType)
            }
            MAP => {
                let map = self.new_map();
                self.push(Frame::Map { map, key: None })
            }
            CLASS_DEF => {
                let def: DefRef = Rc::new(RefCell::new(ClassDef::default()));
                self.defs.push(def.clone());
                self.push(Frame::ClassDefName { def })
            }
            OBJECT => self.push(Frame::ObjectType),
            OBJECT_COMPACT_MIN..=OBJECT_COMPACT_MAX => {
                self.begin_instance((byte - OBJECT_COMPACT_MIN) as usize)
            }
            REF => self.push(Frame::Reference),
            _ => Err(HessianDecodeError::InvalidValueStart),
        }
    }

    /// Int-strict opener. Opcodes in the 64-bit-int range are not accepted.
    fn begin_int(&mut self, byte: u8) -> Result<(), HessianDecodeError> {
        match byte {
            INT_1_MIN..=INT_1_MAX => self.emit(Value::Int(byte as i32 - INT_1_BIAS as i32)),
            INT_2_MIN..=INT_2_MAX => {
                self.push(Frame::int(vec![byte.wrapping_sub(INT_2_BIAS)], 2, false))
            }
            INT_3_MIN..=INT_3_MAX => {
                self.push(Frame::int(vec![byte.wrapping_sub(INT_3_BIAS)], 3, false))
            }
            INT_4 => self.push(Frame::int(Vec::new(), 4, false)),
            _ => Err(HessianDecodeError::ExpectedInteger),
        }
    }

    /// String-strict opener.
    fn begin_str(&mut self, byte: u8) -> Result<(), HessianDecodeError> {
        match byte {
            0 => self.emit(Value::Str(String::new())),
            1..=STR_COMPACT_MAX => self.push(Frame::StrData {
                buf: Vec::new(),
                chars: byte as usize,
            }),
            STR_SHORT_MIN..=STR_SHORT_MAX => {
                self.push(Frame::StrSize { buf: vec![byte - STR_SHORT_MIN] })
            }
            STR_CHUNK => self.push(Frame::StrChunkSize {
                acc: String::new(),
                buf: Vec::new(),
                last: false,
            }),
            STR_FINAL => self.push(Frame::StrChunkSize {
                acc: String::new(),
                buf: Vec::new(),
                last: true,
            }),
            _ => Err(HessianDecodeError::ExpectedString),
        }
    }

    /// Collection-type opener: a type tag must be a string or an int32.
    fn begin_type(&mut self, byte: u8) -> Result<(), HessianDecodeError> {
        if is_str_opener(byte) {
            self.begin_str(byte)
        } else if is_int_opener(byte) {
            self.begin_int(byte)
        } else {
            Err(HessianDecodeError::ExpectedType)
        }
    }

    /// Starts an object instance for the class definition at `index`.
    fn begin_instance(&mut self, index: usize) -> Result<(), HessianDecodeError> {
        let def = self
            .defs
            .get(index)
            .cloned()
            .ok_or(HessianDecodeError::ClassDefOutOfBounds)?;
        let object: ObjectRef = Rc::new(RefCell::new(HessianObject::new(
            def.borrow().name.clone(),
        )));
        self.refs.push(Value::Object(object.clone()));
        if def.borrow().fields.is_empty() {
            return self.emit(Value::Object(object));
        }
        self.push(Frame::ObjectField { object, def, next: 0 })
    }

    /// Feeds one payload byte into the accumulating frame on top of the
    /// stack, finishing the frame once its payload is complete.
    fn accumulate(&mut self, byte: u8) -> Result<(), HessianDecodeError> {
        let done = match self.stack.last_mut() {
            Some(frame) => frame.accumulate(byte),
            None => unreachable!("accumulate requires a frame"),
        };
        if !done {
            return Ok(());
        }
        match self.stack.pop() {
            Some(frame) => self.finish(frame),
            None => unreachable!("frame checked above"),
        }
    }

    /// Completes a scalar frame whose payload bytes have all arrived: decode
    /// the buffer and either emit the value or transition to the next state.
    fn finish(&mut self, frame: Frame) -> Result<(), HessianDecodeError> {
        match frame {
            Frame::Int { buf, long, .. } => {
                let mut acc = (buf[0] as i8) as i64;
                for &byte in &buf[1..] {
                    acc = (acc << 8) | byte as i64;
                }
                if long {
                    self.emit(Value::Long(acc))
                } else {
                    self.emit(Value::Int(acc as i32))
                }
            }
            Frame::Double { buf, size } => {
                let value = match size {
                    1 => (buf[0] as i8) as f64,
                    2 => i16::from_be_bytes([buf[0], buf[1]]) as f64,
                    4 => f32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
                    _ => f64::from_be_bytes([
                        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
                    ]),
                };
                self.emit(Value::Double(value))
            }
            Frame::Date { buf, minutes } => {
                let millis = if minutes {
                    i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as i64 * 60_000
                } else {
                    i64::from_be_bytes([
                        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
                    ])
                };
                let date = Utc
                    .timestamp_millis_opt(millis)
                    .single()
                    .ok_or(HessianDecodeError::InvalidDate)?;
                self.emit(Value::Date(date))
            }
            Frame::StrSize { buf } => {
                let chars = ((buf[0] as usize) << 8) | buf[1] as usize;
                if chars == 0 {
                    self.emit(Value::Str(String::new()))
                } else {
                    self.stack.push(Frame::StrData { buf: Vec::new(), chars });
                    Ok(())
                }
            }
            Frame::StrData { buf, .. } => {
                self.emit(Value::Str(String::from_utf8(buf).unwrap_or_default()))
            }
            Frame::StrChunkSize { acc, buf, last } => {
                let chars = ((buf[0] as usize) << 8) | buf[1] as usize;
                if chars == 0 {
                    if last {
                        self.emit(Value::Str(acc))
                    } else {
                        self.stack.push(Frame::StrChunkNext { acc });
                        Ok(())
                    }
                } else {
                    self.stack.push(Frame::StrChunkData {
                        acc,
                        buf: Vec::new(),
                        chars,
                        last,
                    });
                    Ok(())
                }
            }
            Frame::StrChunkData { mut acc, buf, last, .. } => {
                acc.push_str(std::str::from_utf8(&buf).unwrap_or_default());
                if last {
                    self.emit(Value::Str(acc))
                } else {
                    self.stack.push(Frame::StrChunkNext { acc });
                    Ok(())
                }
            }
            Frame::BinSize { buf } => {
                let size = ((buf[0] as usize) << 8) | buf[1] as usize;
                if size == 0 {
                    self.emit(Value::Bytes(Vec::new()))
                } else {
                    self.stack.push(Frame::BinData { buf: Vec::new(), size });
                    Ok(())
                }
            }
            Frame::BinData { buf, .. } => self.emit(Value::Bytes(buf)),
            Frame::BinChunkSize { acc, buf, last } => {
                let size = ((buf[0] as usize) << 8) | buf[1] as usize;
                if size == 0 {
                    if last {
                        self.emit(Value::Bytes(acc))
                    } else {
                        self.stack.push(Frame::BinChunkNext { acc });
                        Ok(())
                    }
                } else {
                    self.stack.push(Frame::BinChunkData {
                        acc,
                        remaining: size,
                        last,
                    });
                    Ok(())
                }
            }
            Frame::BinChunkData { acc, last, .. } => {
                if last {
                    self.emit(Value::Bytes(acc))
                } else {
                    self.stack.push(Frame::BinChunkNext { acc });
                    Ok(())
                }
            }
            _ => unreachable!("only scalar frames accumulate"),
        }
    }

    /// After a non-final string chunk, only another chunk or the final chunk
    /// may follow.
    fn next_str_chunk(&mut self, byte: u8) -> Result<(), HessianDecodeError> {
        let acc = match self.stack.pop() {
            Some(Frame::StrChunkNext { acc }) => acc,
            _ => unreachable!("classified as string chunk continuation"),
        };
        match byte {
            STR_CHUNK | STR_FINAL => {
                self.stack.push(Frame::StrChunkSize {
                    acc,
                    buf: Vec::new(),
                    last: byte == STR_FINAL,
                });
                Ok(())
            }
            _ => Err(HessianDecodeError::InvalidStringChunk),
        }
    }

    fn next_bin_chunk(&mut self, byte: u8) -> Result<(), HessianDecodeError> {
        let acc = match self.stack.pop() {
            Some(Frame::BinChunkNext { acc }) => acc,
            _ => unreachable!("classified as binary chunk continuation"),
        };
        match byte {
            BIN_CHUNK | BIN_FINAL => {
                self.stack.push(Frame::BinChunkSize {
                    acc,
                    buf: Vec::new(),
                    last: byte == BIN_FINAL,
                });
                Ok(())
            }
            _ => Err(HessianDecodeError::InvalidBinaryChunk),
        }
    }

    /// Dispatches a completed value to the parent frame's continuation.
    ///
    /// The action is keyed on the frame on top of the stack once the
    /// completed sub-parser has been popped; completing a fixed vector,
    /// object, or back-reference cascades the emission outward.
    fn emit(&mut self, value: Value) -> Result<(), HessianDecodeError> {
        let mut value = value;
        loop {
            let frame = match self.stack.pop() {
                Some(frame) => frame,
                None => {
                    self.value = Some(value);
                    return Ok(());
                }
            };
            match frame {
                Frame::Vector { list } => {
                    list.borrow_mut().push(value);
                    self.stack.push(Frame::Vector { list });
                    return Ok(());
                }
                Frame::VectorFixed { list, size } => {
                    list.borrow_mut().push(value);
                    let full = size.map_or(false, |n| list.borrow().len() >= n);
                    if full {
                        value = Value::List(list);
                        continue;
                    }
                    self.stack.push(Frame::VectorFixed { list, size });
                    return Ok(());
                }
                Frame::VectorSize => {
                    let size = expect_int(&value)?;
                    if size < 0 {
                        return Err(HessianDecodeError::InvalidSize);
                    }
                    match self.stack.pop() {
                        Some(Frame::VectorFixed { list, .. }) => {
                            if size == 0 {
                                value = Value::List(list);
                                continue;
                            }
                            self.stack.push(Frame::VectorFixed {
                                list,
                                size: Some(size as usize),
                            });
                            return Ok(());
                        }
                        _ => unreachable!("size prefix sits atop a fixed vector"),
                    }
                }
                Frame::Map { map, key } => {
                    match key {
                        None => self.stack.push(Frame::Map { map, key: Some(value) }),
                        Some(k) => {
                            map.borrow_mut().insert(k, value);
                            self.stack.push(Frame::Map { map, key: None });
                        }
                    }
                    return Ok(());
                }
                Frame::CollectionType => {
                    // The type tag is discarded. A typed fixed vector whose
                    // size was pre-set to zero completes right here.
                    if matches!(
                        self.stack.last(),
                        Some(Frame::VectorFixed { size: Some(0), .. })
                    ) {
                        match self.stack.pop() {
                            Some(Frame::VectorFixed { list, .. }) => {
                                value = Value::List(list);
                                continue;
                            }
                            _ => unreachable!("checked above"),
                        }
                    }
                    return Ok(());
                }
                Frame::ClassDefName { def } => {
                    def.borrow_mut().name = expect_str(value)?;
                    self.stack.push(Frame::ClassDefSize { def });
                    return Ok(());
                }
                Frame::ClassDefSize { def } => {
                    let count = expect_int(&value)?;
                    if count < 0 {
                        return Err(HessianDecodeError::InvalidSize);
                    }
                    // A zero-field definition is already complete; definitions
                    // are a parse side effect and emit no value.
                    if count > 0 {
                        self.stack.push(Frame::ClassDefField {
                            def,
                            expect: count as usize,
                        });
                    }
                    return Ok(());
                }
                Frame::ClassDefField { def, expect } => {
                    def.borrow_mut().fields.push(expect_str(value)?);
                    if def.borrow().fields.len() < expect {
                        self.stack.push(Frame::ClassDefField { def, expect });
                    }
                    return Ok(());
                }
                Frame::ObjectType => {
                    let index = expect_int(&value)?;
                    if index < 0 {
                        return Err(HessianDecodeError::ClassDefOutOfBounds);
                    }
                    return self.begin_instance(index as usize);
                }
                Frame::ObjectField { object, def, next } => {
                    let name = def.borrow().fields[next].clone();
                    object.borrow_mut().set(name, value);
                    let next = next + 1;
                    if next == def.borrow().fields.len() {
                        value = Value::Object(object);
                        continue;
                    }
                    self.stack.push(Frame::ObjectField { object, def, next });
                    return Ok(());
                }
                Frame::Reference => {
                    let index = expect_int(&value)?;
                    let resolved = usize::try_from(index)
                        .ok()
                        .and_then(|i| self.refs.get(i))
                        .cloned();
                    match resolved {
                        Some(shared) => {
                            value = shared;
                            continue;
                        }
                        None => return Err(HessianDecodeError::RefOutOfBounds),
                    }
                }
                _ => unreachable!("scalar frames never receive emitted values"),
            }
        }
    }

    fn push(&mut self, frame: Frame) -> Result<(), HessianDecodeError> {
        if self.stack.len() >= self.max_depth {
            return Err(HessianDecodeError::DepthLimitExceeded);
        }
        self.stack.push(frame);
        Ok(())
    }

    /// Creates a list and registers it in the reference table before any of
    /// its elements exist.
    fn new_list(&mut self) -> ListRef {
        let list: ListRef = Rc::new(RefCell::new(Vec::new()));
        self.refs.push(Value::List(list.clone()));
        list
    }

    fn new_map(&mut self) -> MapRef {
        let map: MapRef = Rc::new(RefCell::new(HessianMap::new()));
        self.refs.push(Value::Map(map.clone()));
        map
    }
}

fn expect_int(value: &Value) -> Result<i32, HessianDecodeError> {
    match value {
        Value::Int(n) => Ok(*n),
        _ => Err(HessianDecodeError::ExpectedInteger),
    }
}

fn expect_str(value: Value) -> Result<String, HessianDecodeError> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(HessianDecodeError::ExpectedString),
    }
}
