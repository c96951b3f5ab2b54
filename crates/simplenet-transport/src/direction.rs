//! Which way a message travels, and which end of a connection we are.
//!
//! Every connection has exactly two ends: a client and a server. A message
//! always leaves one side and arrives at the other, so a [`Direction`] is
//! fully described by its origin. Message kinds may be restricted to one
//! direction (a "you are now logged in" message only ever goes from the
//! server to the client), and the codec checks the observed direction of
//! every inbound message against that restriction.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    /// Returns the other end of the connection.
    pub fn opposite(self) -> Self {
        match self {
            Self::Client => Self::Server,
            Self::Server => Self::Client,
        }
    }

    /// The direction of messages this side *receives*.
    ///
    /// A server receives client-to-server traffic and vice versa. The
    /// serve loop uses this to stamp the observed direction onto every
    /// inbound dispatch context.
    pub fn inbound(self) -> Direction {
        match self {
            Self::Client => Direction::ServerToClient,
            Self::Server => Direction::ClientToServer,
        }
    }

    /// The direction of messages this side *sends*.
    pub fn outbound(self) -> Direction {
        self.inbound().reply()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
        }
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// The travel orientation of a message.
///
/// A message kind that may travel either way is declared with
/// `Option<Direction>::None` rather than a third variant, so "either" can
/// never be observed on a real message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    /// The direction a reply to this message travels.
    pub fn reply(self) -> Self {
        match self {
            Self::ClientToServer => Self::ServerToClient,
            Self::ServerToClient => Self::ClientToServer,
        }
    }

    /// The side that sent the message.
    pub fn origin(self) -> Side {
        match self {
            Self::ClientToServer => Side::Client,
            Self::ServerToClient => Side::Server,
        }
    }

    /// The side that receives the message.
    pub fn receiver(self) -> Side {
        self.origin().opposite()
    }

    /// Returns `true` if a message observed travelling `self` is allowed
    /// for a kind declared with `declared`. `None` permits both.
    pub fn is_permitted_by(self, declared: Option<Direction>) -> bool {
        declared.is_none_or(|d| d == self)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToServer => write!(f, "client->server"),
            Self::ServerToClient => write!(f, "server->client"),
        }
    }
}
