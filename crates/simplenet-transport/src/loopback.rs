//! In-memory connection pairs backed by Tokio channels.
//!
//! Useful for tests and demos: both ends live in the same process, frames
//! are moved rather than serialized, and closing one end is observed by the
//! other as a clean end of stream.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use crate::{Connection, ConnectionId, Side, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Creates a connected `(client, server)` pair.
///
/// Both ends share one [`ConnectionId`]; they differ only in their
/// [`Side`].
pub fn pair<F: Send + 'static>() -> (LoopbackConnection<F>, LoopbackConnection<F>) {
    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    let (to_server, from_client) = mpsc::unbounded_channel();
    let (to_client, from_server) = mpsc::unbounded_channel();

    tracing::debug!(%id, "opened loopback connection");

    let client = LoopbackConnection {
        id,
        side: Side::Client,
        tx: Mutex::new(Some(to_server)),
        rx: AsyncMutex::new(from_server),
    };
    let server = LoopbackConnection {
        id,
        side: Side::Server,
        tx: Mutex::new(Some(to_client)),
        rx: AsyncMutex::new(from_client),
    };
    (client, server)
}

/// One end of an in-memory connection.
pub struct LoopbackConnection<F> {
    id: ConnectionId,
    side: Side,
    tx: Mutex<Option<mpsc::UnboundedSender<F>>>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<F>>,
}

impl<F: Send + 'static> Connection for LoopbackConnection<F> {
    type Frame = F;
    type Error = TransportError;

    async fn send(&self, frame: F) -> Result<(), Self::Error> {
        let tx = self.tx.lock();
        let tx = tx.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed(format!("{} closed locally", self.id))
        })?;
        tx.send(frame).map_err(|_| TransportError::SendFailed(self.id))
    }

    async fn recv(&self) -> Result<Option<F>, Self::Error> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        // Dropping our sender ends the peer's stream. Closing our receiver
        // makes the peer's next send fail, unless a recv on this end is
        // parked on it right now; that recv ends once the peer closes too.
        self.tx.lock().take();
        if let Ok(mut rx) = self.rx.try_lock() {
            rx.close();
        }
        tracing::debug!(id = %self.id, side = %self.side, "closed loopback connection");
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn side(&self) -> Side {
        self.side
    }
}
