//! Error types for the protocol layer.
//!
//! Each crate in Simplenet defines its own error enum. A `ProtocolError`
//! always means the bytes themselves were the problem: too few of them, a
//! malformed variable-length integer, a payload the codec could not read.
//! It never means a registration mistake; those live in the codec crate.

/// Errors that can occur while reading or writing wire values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields,
    /// wrong data types, or truncated messages.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The buffer ended before a value was complete.
    #[error("truncated input: needed {needed} more byte(s), {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A variable-length integer ran past its maximum width.
    #[error("variable-length integer is longer than {max} bytes")]
    VarIntTooLong { max: usize },

    /// A length prefix was negative or exceeded the allowed maximum.
    #[error("length {len} is outside the allowed range 0..={max}")]
    LengthOutOfRange { len: i64, max: usize },

    /// A string payload was not valid UTF-8.
    #[error("string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The value is invalid at the protocol level.
    ///
    /// For values that parse but break a protocol rule, e.g. a channel
    /// name without a namespace.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// A registration index that does not fit in one discriminator byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("discriminator {0} is out of range (0..=255)")]
pub struct DiscriminatorOutOfRange(pub u32);
