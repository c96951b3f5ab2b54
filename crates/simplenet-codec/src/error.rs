//! Error types for the codec layer.

use simplenet_protocol::{ChannelName, Discriminator, DiscriminatorOutOfRange, ProtocolError};
use simplenet_transport::Direction;

/// Errors raised while registering, encoding, or dispatching messages.
///
/// Registration errors (`RegistryFrozen`, `Duplicate*`, `MissingConsumer`,
/// `DiscriminatorOutOfRange`) and `UnknownMessageKind` are programming
/// mistakes: the channel was set up wrong. `DirectionViolation` and
/// `Protocol` are caused by the peer and should cost that peer its
/// connection, nothing more.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An encode was requested for a type never registered on the channel.
    #[error("message kind {kind} is not registered on channel {channel}")]
    UnknownMessageKind {
        channel: ChannelName,
        kind: &'static str,
    },

    /// The registry no longer accepts registrations.
    #[error("cannot register {kind} on channel {channel}: registry is frozen")]
    RegistryFrozen {
        channel: ChannelName,
        kind: &'static str,
    },

    /// Another kind already owns this discriminator on the channel.
    #[error("discriminator {discriminator} on channel {channel} is taken by {existing}, cannot register {kind}")]
    DuplicateDiscriminator {
        channel: ChannelName,
        discriminator: Discriminator,
        existing: &'static str,
        kind: &'static str,
    },

    /// The kind is already registered on the channel.
    #[error("message kind {kind} is already registered on channel {channel}")]
    DuplicateKind {
        channel: ChannelName,
        kind: &'static str,
    },

    /// The registration index does not fit in one byte.
    #[error(transparent)]
    DiscriminatorOutOfRange(#[from] DiscriminatorOutOfRange),

    /// A descriptor was built without a consumer.
    #[error("message kind {kind} has no consumer")]
    MissingConsumer { kind: &'static str },

    /// A message arrived travelling a direction its kind does not allow.
    #[error("{kind} on channel {channel} travelled {observed}, declared {declared:?}")]
    DirectionViolation {
        channel: ChannelName,
        kind: &'static str,
        declared: Option<Direction>,
        observed: Direction,
    },

    /// The payload bytes could not be read or written.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl CodecError {
    /// For errors returned by dispatch: `true` if the remote peer caused
    /// it, rather than the way this side set up its channel.
    pub fn is_peer_fault(&self) -> bool {
        matches!(self, Self::DirectionViolation { .. } | Self::Protocol(_))
    }
}
