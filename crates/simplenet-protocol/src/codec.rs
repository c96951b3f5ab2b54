//! Payload codecs for serde-based message kinds.
//!
//! A message kind can hand-write its encoder and decoder with the
//! [`WireRead`]/[`WireWrite`](crate::WireWrite) primitives, or it can
//! derive `Serialize`/`Deserialize` and let a [`Codec`] do the work. The
//! codec is a strategy: the multiplexer only sees the encoder/decoder
//! closures built from it and never learns which format is in use.
//!
//! Channel payloads carry no length prefix of their own: each decoder must
//! consume exactly what its encoder wrote. Self-describing formats like
//! JSON do not know where they end inside a larger buffer, so
//! [`Codec::encode_into`] writes a varint byte length first and
//! [`Codec::decode_from`] reads exactly that many bytes back.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;
use crate::wire::{WireRead, WireWrite};

/// Upper bound for one length-prefixed payload (2 MiB).
pub const MAX_PAYLOAD_LEN: usize = 2 * 1024 * 1024;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the closures built from a codec are
/// stored in descriptors shared by every connection thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Writes a varint length prefix followed by the encoded value.
    fn encode_into<T: Serialize, B: BufMut>(
        &self,
        value: &T,
        target: &mut B,
    ) -> Result<(), ProtocolError> {
        let bytes = self.encode(value)?;
        target.write_byte_array(&bytes, MAX_PAYLOAD_LEN)
    }

    /// Reads one value written by [`encode_into`](Self::encode_into),
    /// leaving any following bytes in `source` untouched.
    fn decode_from<T: DeserializeOwned, B: Buf>(&self, source: &mut B) -> Result<T, ProtocolError> {
        let bytes = source.read_byte_array(MAX_PAYLOAD_LEN)?;
        self.decode(&bytes)
    }
}

/// Convenience: encode a value into a fresh, length-prefixed buffer.
pub fn encode_to_bytes<C: Codec, T: Serialize>(
    codec: &C,
    value: &T,
) -> Result<BytesMut, ProtocolError> {
    let mut buf = BytesMut::new();
    codec.encode_into(value, &mut buf)?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Human-readable and easy to inspect in logs. This is behind the `json`
/// feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use bytes::BytesMut;
/// use simplenet_protocol::{Codec, JsonCodec};
///
/// let mut buf = BytesMut::new();
/// JsonCodec.encode_into(&vec![1u8, 2, 3], &mut buf).unwrap();
/// JsonCodec.encode_into(&"next", &mut buf).unwrap();
///
/// let mut bytes = buf.freeze();
/// let first: Vec<u8> = JsonCodec.decode_from(&mut bytes).unwrap();
/// let second: String = JsonCodec.decode_from(&mut bytes).unwrap();
/// assert_eq!(first, vec![1, 2, 3]);
/// assert_eq!(second, "next");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
