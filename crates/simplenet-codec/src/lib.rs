//! Discriminator-indexed message multiplexing for Simplenet.
//!
//! Many independently defined message kinds share one channel. Each kind is
//! registered once with a one-byte discriminator, its payload functions, a
//! consumer, and optionally a permitted direction and a login correlation
//! getter/setter pair.
//!
//! # Key types
//!
//! - [`MessageDescriptor`]: the registration record for one kind
//! - [`Registry`]: by-kind and by-discriminator lookup for one channel
//! - [`IndexedCodec`]: encode outbound values, dispatch inbound payloads
//! - [`DirectionPolicy`] / [`HandshakeTracker`]: transport decisions the
//!   dispatch path defers to
//!
//! # Flow
//!
//! ```text
//! outbound: value ──find_by_kind──→ descriptor ──encode──→ [disc][payload]
//! inbound:  [disc][payload] ──find_by_discriminator──→ descriptor
//!             ──direction check──→ decode ──stamp login index──→ consumer
//! ```

mod descriptor;
mod error;
mod indexed;
mod policy;
mod registry;

pub use descriptor::{
    ConsumeFn, DecodeFn, DescriptorBuilder, EncodeFn, LoginCorrelation, LoginGetFn, LoginSetFn,
    MessageDescriptor, RegisteredMessage,
};
pub use error::CodecError;
pub use indexed::{DispatchOutcome, IndexedCodec};
pub use policy::{
    DirectionPolicy, HandshakeTracker, NoPendingReplies, PendingReplies, StrictDirection,
};
pub use registry::{FreezePolicy, Registry, RegistryState};
