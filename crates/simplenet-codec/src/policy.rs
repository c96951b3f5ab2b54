//! Transport collaborators the dispatch path consults.
//!
//! The codec decides *what* a message is; whether a violation costs the
//! peer its connection, and whether a missing login reply matters, are
//! transport decisions. They are expressed as two traits so a server can
//! plug in its own handshake state machine, with ready-made
//! implementations for the common case.

use std::collections::HashMap;

use parking_lot::Mutex;
use simplenet_protocol::LoginIndex;
use simplenet_transport::{ConnectionId, Direction, DispatchContext};

// ---------------------------------------------------------------------------
// DirectionPolicy
// ---------------------------------------------------------------------------

/// Decides whether a message travelling `ctx.direction()` is acceptable
/// for a kind declared with `declared`.
pub trait DirectionPolicy: Send + Sync + 'static {
    /// Returns `false` to reject the message. The policy may also ask the
    /// transport to disconnect via [`DispatchContext::disconnect`].
    fn permits(&self, kind: &'static str, declared: Option<Direction>, ctx: &DispatchContext) -> bool;
}

/// Rejects any message travelling against its declared direction and
/// requests a disconnect for the offending connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictDirection;

impl DirectionPolicy for StrictDirection {
    fn permits(&self, kind: &'static str, declared: Option<Direction>, ctx: &DispatchContext) -> bool {
        let observed = ctx.direction();
        if observed.is_permitted_by(declared) {
            return true;
        }
        tracing::error!(
            conn_id = %ctx.connection(),
            kind,
            %observed,
            ?declared,
            "message travelled in a direction it is not allowed"
        );
        ctx.disconnect(format!("illegal {observed} message {kind}"));
        false
    }
}

// ---------------------------------------------------------------------------
// HandshakeTracker
// ---------------------------------------------------------------------------

/// Knows which login requests are still waiting for an answer.
pub trait HandshakeTracker: Send + Sync + 'static {
    /// Does the request sent on `connection` with `index` still need a
    /// real reply? Unknown requests never do.
    fn needs_response(&self, connection: ConnectionId, index: LoginIndex) -> bool;
}

/// A tracker for servers that never send login requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPendingReplies;

impl HandshakeTracker for NoPendingReplies {
    fn needs_response(&self, _connection: ConnectionId, _index: LoginIndex) -> bool {
        false
    }
}

/// A table of outstanding login requests, keyed by connection and index.
///
/// The requester records each request with [`expect`](Self::expect) when
/// it sends it and clears it with [`resolve`](Self::resolve) when the
/// reply is consumed. Whether a request *needs* a reply is decided when it
/// is sent: an optional query may be ignored by a peer that doesn't know
/// the channel, a mandatory one may not.
#[derive(Debug, Default)]
pub struct PendingReplies {
    pending: Mutex<HashMap<(ConnectionId, LoginIndex), bool>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outgoing request. Sentinel indices are ignored.
    pub fn expect(&self, connection: ConnectionId, index: LoginIndex, needs_response: bool) {
        if index.is_none() {
            return;
        }
        self.pending.lock().insert((connection, index), needs_response);
        tracing::trace!(conn_id = %connection, %index, needs_response, "awaiting login reply");
    }

    /// Clears a request once its reply has been handled. Returns whether it
    /// was outstanding.
    pub fn resolve(&self, connection: ConnectionId, index: LoginIndex) -> bool {
        self.pending.lock().remove(&(connection, index)).is_some()
    }

    /// Drops every request of a closed connection.
    pub fn forget_connection(&self, connection: ConnectionId) {
        self.pending.lock().retain(|(conn, _), _| *conn != connection);
    }

    /// Number of outstanding requests on `connection`.
    pub fn outstanding(&self, connection: ConnectionId) -> usize {
        self.pending
            .lock()
            .keys()
            .filter(|(conn, _)| *conn == connection)
            .count()
    }
}

impl HandshakeTracker for PendingReplies {
    fn needs_response(&self, connection: ConnectionId, index: LoginIndex) -> bool {
        self.pending
            .lock()
            .get(&(connection, index))
            .copied()
            .unwrap_or(false)
    }
}
