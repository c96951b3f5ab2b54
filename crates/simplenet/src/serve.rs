//! Per-connection receive loop.
//!
//! [`serve`] drives one connection until the peer hangs up or breaks the
//! protocol:
//!
//! 1. Receive a frame
//! 2. Build a [`DispatchContext`] with the direction implied by our side
//! 3. Route it through [`NetworkHub::handle_frame`]
//! 4. Send any absent-payload reply the hub produced
//! 5. Close the connection if dispatch failed, a disconnect was requested,
//!    or a login frame went unhandled
//!
//! Only the offending connection is closed; other connections served by
//! the same hub are unaffected.

use simplenet_protocol::Frame;
use simplenet_transport::{Connection, DispatchContext, TransportError};

use crate::{FrameOutcome, NetworkHub, SimplenetError};

/// Serves `connection` until it closes, then closes our end as well.
///
/// Returns `Ok(())` when the peer closes the stream and
/// [`SimplenetError::Disconnected`] (or the dispatch error) when the
/// connection was dropped for misbehaving.
pub async fn serve<C>(hub: &NetworkHub, connection: &C) -> Result<(), SimplenetError>
where
    C: Connection<Frame = Frame, Error = TransportError>,
{
    let conn_id = connection.id();
    let direction = connection.side().inbound();
    tracing::debug!(%conn_id, side = %connection.side(), "serving connection");

    let result = receive_loop(hub, connection, direction).await;
    hub.pending().forget_connection(conn_id);

    match &result {
        Ok(()) => tracing::debug!(%conn_id, "peer closed the connection"),
        Err(e) => tracing::warn!(%conn_id, error = %e, "dropping connection"),
    }
    if let Err(close_err) = connection.close().await {
        tracing::debug!(%conn_id, error = %close_err, "close failed");
    }
    result
}

async fn receive_loop<C>(
    hub: &NetworkHub,
    connection: &C,
    direction: simplenet_transport::Direction,
) -> Result<(), SimplenetError>
where
    C: Connection<Frame = Frame, Error = TransportError>,
{
    while let Some(frame) = connection.recv().await? {
        let ctx = DispatchContext::new(connection.id(), direction);
        let is_login = frame.is_login();
        let channel = frame.channel.clone();
        let login_index = frame.login_index;
        tracing::trace!(conn_id = %ctx.connection(), %channel, %login_index, "frame received");

        match hub.handle_frame(frame, &ctx)? {
            FrameOutcome::Reply(reply) => connection.send(reply).await?,
            FrameOutcome::Dispatched(_) | FrameOutcome::Dropped => {}
        }

        if let Some(reason) = ctx.disconnect_reason() {
            return Err(SimplenetError::Disconnected(reason));
        }
        if is_login && !ctx.is_handled() {
            return Err(SimplenetError::Disconnected(format!(
                "login frame {login_index} on {channel} was not handled"
            )));
        }
    }
    Ok(())
}
