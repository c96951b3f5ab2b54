//! Unified error type for Simplenet.

use simplenet_codec::CodecError;
use simplenet_protocol::{ChannelName, ProtocolError};
use simplenet_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `simplenet` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. `#[from]` on each
/// wrapping variant lets `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SimplenetError {
    /// A transport-level error (send, recv, closed).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-level error outside any channel (bad channel name, etc.).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registration, encode, or dispatch error on a channel.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A channel with this name is already registered on the hub.
    #[error("channel {0} is already registered")]
    DuplicateChannel(ChannelName),

    /// No channel with this name is registered on the hub.
    #[error("channel {0} is not registered")]
    UnknownChannel(ChannelName),

    /// The remote side runs an incompatible version of a channel, or
    /// lacks a channel that may not be absent.
    #[error("channel {channel}: local version {local}, remote version {remote:?}")]
    VersionMismatch {
        channel: ChannelName,
        local: String,
        remote: Option<String>,
    },

    /// A login query was built from a kind that does not carry a login
    /// index.
    #[error("{kind} on channel {channel} is not login-correlated")]
    NotLoginCorrelated {
        channel: ChannelName,
        kind: &'static str,
    },

    /// A kind without an encoder on this side was turned into a frame; the
    /// frame would carry no discriminator.
    #[error("{kind} on channel {channel} has no encoder")]
    NotEncodable {
        channel: ChannelName,
        kind: &'static str,
    },

    /// The connection was dropped because of a protocol violation.
    #[error("disconnected: {0}")]
    Disconnected(String),
}
