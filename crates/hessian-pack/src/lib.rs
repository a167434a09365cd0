//! Streaming Hessian 2.0 binary serialization.
//!
//! The centerpiece is [`HessianDecoder`], an incremental decoder that accepts
//! encoded bytes in arbitrary increments, down to one byte at a time, and
//! produces a single decoded [`Value`] once the top-level value is complete.
//! Back-references resolve to shared handles, so object graphs with shared
//! subtrees and cycles decode faithfully.
//!
//! ```
//! use hessian_pack::{HessianDecoder, HessianEncoder, Value};
//!
//! let mut encoder = HessianEncoder::new();
//! let mut decoder = HessianDecoder::new();
//! let value = Value::list(vec![Value::Int(1), Value::Str("two".into())]);
//! let bytes = encoder.encode(&value);
//! assert_eq!(decoder.decode(&bytes).unwrap(), value);
//! ```

mod constants;
mod convert;
mod decoder;
mod encoder;
mod error;
mod frame;
mod value;
mod writer;

pub use convert::to_json;
pub use decoder::{HessianDecoder, DEFAULT_MAX_DEPTH};
pub use encoder::HessianEncoder;
pub use error::HessianDecodeError;
pub use value::{HessianMap, HessianObject, ListRef, MapRef, ObjectRef, Value};
pub use writer::Writer;
