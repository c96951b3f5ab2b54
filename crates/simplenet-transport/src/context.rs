//! The per-message dispatch context handed to consumers.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::{ConnectionId, Direction};

/// Transport-supplied state for one inbound message.
///
/// The codec reads the observed [`Direction`] from it, consumers mark the
/// message as handled, and either of them may ask the transport to drop the
/// connection. The context is `Sync`, so a consumer may hand it to another
/// thread for the duration of the dispatch.
#[derive(Debug)]
pub struct DispatchContext {
    connection: ConnectionId,
    direction: Direction,
    handled: AtomicBool,
    disconnect: Mutex<Option<String>>,
}

impl DispatchContext {
    /// Creates a context for a message that arrived on `connection`
    /// travelling `direction`.
    pub fn new(connection: ConnectionId, direction: Direction) -> Self {
        Self {
            connection,
            direction,
            handled: AtomicBool::new(false),
            disconnect: Mutex::new(None),
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// The direction the message was observed travelling.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Records whether the message was handled.
    ///
    /// Login-phase messages that finish dispatch unhandled are treated as a
    /// protocol violation by the serve loop.
    pub fn set_handled(&self, handled: bool) {
        self.handled.store(handled, Ordering::Release);
    }

    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Acquire)
    }

    /// Asks the transport to terminate this connection.
    ///
    /// Only the first reason is kept; later calls are ignored so the log
    /// shows the violation that triggered the disconnect.
    pub fn disconnect(&self, reason: impl Into<String>) {
        let mut slot = self.disconnect.lock();
        if slot.is_none() {
            let reason = reason.into();
            tracing::debug!(conn_id = %self.connection, %reason, "disconnect requested");
            *slot = Some(reason);
        }
    }

    /// The reason passed to the first [`disconnect`](Self::disconnect), if any.
    pub fn disconnect_reason(&self) -> Option<String> {
        self.disconnect.lock().clone()
    }

    pub fn is_disconnect_requested(&self) -> bool {
        self.disconnect.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DispatchContext {
        DispatchContext::new(ConnectionId::new(3), Direction::ClientToServer)
    }

    #[test]
    fn test_new_context_is_unhandled_and_connected() {
        let ctx = ctx();
        assert!(!ctx.is_handled());
        assert!(!ctx.is_disconnect_requested());
        assert_eq!(ctx.connection(), ConnectionId::new(3));
        assert_eq!(ctx.direction(), Direction::ClientToServer);
    }

    #[test]
    fn test_set_handled() {
        let ctx = ctx();
        ctx.set_handled(true);
        assert!(ctx.is_handled());
        ctx.set_handled(false);
        assert!(!ctx.is_handled());
    }

    #[test]
    fn test_first_disconnect_reason_wins() {
        let ctx = ctx();
        ctx.disconnect("wrong direction");
        ctx.disconnect("something else");
        assert_eq!(ctx.disconnect_reason().as_deref(), Some("wrong direction"));
    }

    #[test]
    fn test_context_is_shareable_across_threads() {
        let ctx = ctx();
        std::thread::scope(|s| {
            s.spawn(|| ctx.set_handled(true));
        });
        assert!(ctx.is_handled());
    }
}
