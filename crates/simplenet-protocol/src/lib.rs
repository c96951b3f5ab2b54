//! Wire vocabulary for Simplenet.
//!
//! This crate defines what the multiplexer moves around, without knowing
//! how it is multiplexed:
//!
//! - **Types** ([`Discriminator`], [`LoginIndex`], [`ChannelName`],
//!   [`Frame`]): the small values that label every message.
//! - **Wire** ([`WireRead`], [`WireWrite`]): bounds-checked primitive
//!   reads and writes over `bytes` buffers, for hand-written payloads.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): length-prefixed serde
//!   payloads for message kinds that derive their encoding.
//! - **Errors** ([`ProtocolError`]): what can go wrong with the bytes.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (bytes, values) → Codec (descriptors, dispatch)
//! ```

mod codec;
mod error;
mod types;
pub mod wire;

pub use codec::{Codec, MAX_PAYLOAD_LEN, encode_to_bytes};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{DiscriminatorOutOfRange, ProtocolError};
pub use types::{ChannelName, Discriminator, Frame, LoginIndex};
pub use wire::{WireRead, WireWrite};

// Re-exported so message kinds can name buffer types without a direct
// dependency on `bytes`.
pub use bytes::{Bytes, BytesMut};
