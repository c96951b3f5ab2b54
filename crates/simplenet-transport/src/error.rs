/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a frame failed because the peer has gone away.
    #[error("send failed: peer {0} is gone")]
    SendFailed(crate::ConnectionId),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}
