//! Transport-facing types for Simplenet.
//!
//! Simplenet does not open sockets. This crate holds what the codec needs
//! to know about the connection a message travelled on:
//!
//! - [`ConnectionId`] and [`Side`] identify a connection and our end of it.
//! - [`Direction`] is the travel orientation checked against each message
//!   kind's declaration.
//! - [`DispatchContext`] is handed to consumers with every inbound message.
//! - [`Connection`] abstracts over anything that moves frames between two
//!   sides. The `loopback` feature provides an in-memory implementation.
//!
//! # Feature Flags
//!
//! - `loopback` (default): in-memory connection pairs via Tokio channels

#![allow(async_fn_in_trait)]

mod context;
mod direction;
mod error;
#[cfg(feature = "loopback")]
mod loopback;

pub use context::DispatchContext;
pub use direction::{Direction, Side};
pub use error::TransportError;
#[cfg(feature = "loopback")]
pub use loopback::{LoopbackConnection, pair};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One end of a connection that moves whole frames.
///
/// Framing below the message boundary is the implementation's business;
/// callers only ever see complete `Frame` values.
pub trait Connection: Send + Sync + 'static {
    /// The unit this connection carries.
    type Frame: Send + 'static;
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends a frame to the remote peer.
    async fn send(&self, frame: Self::Frame) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Self::Frame>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Which end of the connection this handle is.
    fn side(&self) -> Side;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "client");
        map.insert(ConnectionId::new(2), "server");
        assert_eq!(map[&ConnectionId::new(1)], "client");
    }
}
