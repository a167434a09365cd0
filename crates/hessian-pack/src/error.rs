use thiserror::Error;

/// Error type for Hessian decoding operations.
///
/// Every variant is terminal: once a decode fails the decoder is poisoned and
/// must be `reset` before reuse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HessianDecodeError {
    #[error("invalid byte at start of value")]
    InvalidValueStart,
    #[error("expected integer opener")]
    ExpectedInteger,
    #[error("expected string opener")]
    ExpectedString,
    #[error("expected string or integer type opener")]
    ExpectedType,
    #[error("invalid string chunk continuation")]
    InvalidStringChunk,
    #[error("invalid binary chunk continuation")]
    InvalidBinaryChunk,
    #[error("unexpected end of stream")]
    UnexpectedEnd,
    #[error("value reference out of bounds")]
    RefOutOfBounds,
    #[error("class definition out of bounds")]
    ClassDefOutOfBounds,
    #[error("invalid size")]
    InvalidSize,
    #[error("invalid date value")]
    InvalidDate,
    #[error("nesting depth limit exceeded")]
    DepthLimitExceeded,
}
