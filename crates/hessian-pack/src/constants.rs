//! Opcode constants for the Hessian 2.0 wire grammar.
//!
//! The first byte of every encoded value classifies it. Compact encodings
//! pack payload bits into the opcode byte itself; the `*_MIN`/`*_MAX` pairs
//! below delimit those inclusive ranges.

pub const NULL: u8 = b'N';
pub const TRUE: u8 = b'T';
pub const FALSE: u8 = b'F';

// int32: one-byte [0x80..0xbf] (value = byte - 0x90), two-byte [0xc0..0xcf],
// three-byte [0xd0..0xd7], and the full four-byte 'I' form.
pub const INT_1_MIN: u8 = 0x80;
pub const INT_1_MAX: u8 = 0xbf;
pub const INT_1_BIAS: u8 = 0x90;
pub const INT_2_MIN: u8 = 0xc0;
pub const INT_2_MAX: u8 = 0xcf;
pub const INT_2_BIAS: u8 = 0xc8;
pub const INT_3_MIN: u8 = 0xd0;
pub const INT_3_MAX: u8 = 0xd7;
pub const INT_3_BIAS: u8 = 0xd4;
pub const INT_4: u8 = b'I';

// int64: one-byte [0xd8..0xef] (value = byte - 0xe0), two-byte [0xf0..0xff],
// three-byte [0x38..0x3f], four-byte 0x59 (sign-extended), eight-byte 'L'.
pub const LONG_1_MIN: u8 = 0xd8;
pub const LONG_1_MAX: u8 = 0xef;
pub const LONG_1_BIAS: u8 = 0xe0;
pub const LONG_2_MIN: u8 = 0xf0;
// LONG_2_MAX is 0xff, the end of the byte range.
pub const LONG_2_BIAS: u8 = 0xf8;
pub const LONG_3_MIN: u8 = 0x38;
pub const LONG_3_MAX: u8 = 0x3f;
pub const LONG_3_BIAS: u8 = 0x3c;
pub const LONG_4: u8 = 0x59;
pub const LONG_8: u8 = b'L';

pub const DOUBLE_ZERO: u8 = 0x5b;
pub const DOUBLE_ONE: u8 = 0x5c;
pub const DOUBLE_1: u8 = 0x5d;
pub const DOUBLE_2: u8 = 0x5e;
pub const DOUBLE_4: u8 = 0x5f;
pub const DOUBLE_8: u8 = b'D';

// Strings are length-prefixed in Unicode characters, not bytes.
pub const STR_COMPACT_MAX: u8 = 0x1f;
pub const STR_SHORT_MIN: u8 = 0x30;
pub const STR_SHORT_MAX: u8 = 0x33;
pub const STR_CHUNK: u8 = b'R';
pub const STR_FINAL: u8 = b'S';

pub const BIN_COMPACT_MIN: u8 = 0x20;
pub const BIN_COMPACT_MAX: u8 = 0x2f;
pub const BIN_SHORT_MIN: u8 = 0x34;
pub const BIN_SHORT_MAX: u8 = 0x37;
pub const BIN_CHUNK: u8 = b'A';
pub const BIN_FINAL: u8 = b'B';

/// 64-bit milliseconds since the Unix epoch.
pub const DATE_MILLIS: u8 = 0x4a;
/// 32-bit minutes since the Unix epoch.
pub const DATE_MINUTES: u8 = 0x4b;

pub const VECTOR_TYPED: u8 = 0x55;
pub const VECTOR_TYPED_FIXED: u8 = b'V';
pub const VECTOR: u8 = 0x57;
pub const VECTOR_FIXED: u8 = 0x58;
pub const VECTOR_TYPED_FIXED_MIN: u8 = 0x70;
pub const VECTOR_TYPED_FIXED_MAX: u8 = 0x77;
pub const VECTOR_FIXED_MIN: u8 = 0x78;
pub const VECTOR_FIXED_MAX: u8 = 0x7f;

pub const MAP_TYPED: u8 = b'M';
pub const MAP: u8 = b'H';

pub const CLASS_DEF: u8 = b'C';
pub const OBJECT: u8 = b'O';
pub const OBJECT_COMPACT_MIN: u8 = 0x60;
pub const OBJECT_COMPACT_MAX: u8 = 0x6f;

pub const REF: u8 = 0x51;

/// Terminator for streamed vectors and maps.
pub const END: u8 = b'Z';

/// Largest character count carried by a single string or binary chunk.
pub const CHUNK_MAX: usize = 0xffff;

/// Returns `true` if `byte` opens an int32 value.
///
/// The int-strict sub-dispatcher admits exactly these openers; opcodes in the
/// 64-bit-int range are not accepted there.
#[inline]
pub fn is_int_opener(byte: u8) -> bool {
    (INT_1_MIN..=INT_3_MAX).contains(&byte) || byte == INT_4
}

/// Returns `true` if `byte` opens a string value.
#[inline]
pub fn is_str_opener(byte: u8) -> bool {
    byte <= STR_COMPACT_MAX
        || (STR_SHORT_MIN..=STR_SHORT_MAX).contains(&byte)
        || byte == STR_CHUNK
        || byte == STR_FINAL
}
