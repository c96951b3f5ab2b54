//! The channel hub: name-based routing for every channel on one endpoint.
//!
//! A [`NetworkHub`] owns every [`SimpleChannel`] of one endpoint (client or
//! server) and routes frames to them by name. It also owns the pieces of
//! state that span channels:
//!
//! - the login index allocator, so indices are unique per endpoint
//! - the [`PendingReplies`] table shared by every channel's codec
//! - version negotiation against the peer's channel list
//!
//! # Login exchange
//!
//! ```text
//! server                                   client
//!   │  login_query() ── Frame::login(L-1) ──→  │  handle_frame → consumer
//!   │                                          │  builds reply with L-1
//!   │  ←── Frame::login_reply(L-1) ─────────── │  login_reply()
//!   │  handle_frame → stamp L-1 → consumer     │
//!   │  pending.resolve(L-1)                    │
//! ```
//!
//! Both sides number their own queries, so the same index can be in flight
//! in both directions. Only reply frames resolve pending queries.
//!
//! A client that doesn't know the channel answers with
//! [`Frame::absent_reply`]; the server's tracker decides whether the query
//! needed a real answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::RwLock;
use simplenet_codec::{DispatchOutcome, PendingReplies};
use simplenet_protocol::{ChannelName, Frame, LoginIndex};
use simplenet_transport::{ConnectionId, DispatchContext, Side};

use crate::{ChannelConfig, SimpleChannel, SimplenetError};

/// What [`NetworkHub::handle_frame`] did with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame reached its channel's codec.
    Dispatched(DispatchOutcome),
    /// The channel is unknown here and the frame was dropped.
    Dropped,
    /// The channel is unknown here; send this absent-payload reply so the
    /// peer's login exchange can continue.
    Reply(Frame),
}

/// Every channel of one endpoint, keyed by name.
#[derive(Debug)]
pub struct NetworkHub {
    side: Side,
    channels: RwLock<HashMap<ChannelName, Arc<SimpleChannel>>>,
    pending: Arc<PendingReplies>,
    next_login_index: AtomicI32,
}

impl NetworkHub {
    /// Creates an empty hub for one side of the connection.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            channels: RwLock::new(HashMap::new()),
            pending: Arc::new(PendingReplies::new()),
            next_login_index: AtomicI32::new(1),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Outstanding login queries sent from this hub.
    pub fn pending(&self) -> &PendingReplies {
        &self.pending
    }

    // -- Channels ---------------------------------------------------------

    /// Creates and registers a channel.
    ///
    /// # Errors
    /// [`SimplenetError::DuplicateChannel`] if the name is taken.
    pub fn register_channel(&self, config: ChannelConfig) -> Result<Arc<SimpleChannel>, SimplenetError> {
        let mut channels = self.channels.write();
        if channels.contains_key(&config.name) {
            tracing::error!(channel = %config.name, "channel registered twice");
            return Err(SimplenetError::DuplicateChannel(config.name));
        }

        let name = config.name.clone();
        let channel = Arc::new(SimpleChannel::with_tracker(config, self.pending.clone()));
        channels.insert(name.clone(), Arc::clone(&channel));
        tracing::debug!(channel = %name, side = %self.side, "registered channel");
        Ok(channel)
    }

    pub fn channel(&self, name: &ChannelName) -> Option<Arc<SimpleChannel>> {
        self.channels.read().get(name).cloned()
    }

    fn require_channel(&self, name: &ChannelName) -> Result<Arc<SimpleChannel>, SimplenetError> {
        self.channel(name)
            .ok_or_else(|| SimplenetError::UnknownChannel(name.clone()))
    }

    /// Freezes every channel's registry.
    pub fn freeze_all(&self) {
        for channel in self.channels.read().values() {
            channel.freeze();
        }
    }

    // -- Login indices ----------------------------------------------------

    /// Allocates a fresh login index. Never returns [`LoginIndex::NONE`].
    pub fn next_login_index(&self) -> LoginIndex {
        loop {
            let raw = self.next_login_index.fetch_add(1, Ordering::Relaxed);
            let index = LoginIndex::new(raw);
            if index.is_some() {
                return index;
            }
        }
    }

    // -- Outbound ---------------------------------------------------------

    /// Encodes `message` on `channel` into a frame.
    pub fn frame<M: 'static>(&self, channel: &ChannelName, message: &M) -> Result<Frame, SimplenetError> {
        self.require_channel(channel)?.to_frame(message)
    }

    /// Encodes a login query for `connection` and records it as
    /// outstanding. `needs_response` says whether an absent-payload answer
    /// should cost the peer its connection.
    ///
    /// # Errors
    /// - [`SimplenetError::UnknownChannel`]: no such channel here
    /// - [`SimplenetError::NotLoginCorrelated`]: `M` carries no login index
    pub fn login_query<M: 'static>(
        &self,
        connection: ConnectionId,
        channel: &ChannelName,
        message: &M,
        needs_response: bool,
    ) -> Result<Frame, SimplenetError> {
        let frame = self.frame(channel, message)?;
        if !frame.is_login() {
            return Err(SimplenetError::NotLoginCorrelated {
                channel: channel.clone(),
                kind: std::any::type_name::<M>(),
            });
        }
        self.pending.expect(connection, frame.login_index, needs_response);
        tracing::debug!(
            %channel,
            conn_id = %connection,
            login_index = %frame.login_index,
            needs_response,
            "sending login query"
        );
        Ok(frame)
    }

    /// Encodes `message` as the answer to the peer's login query. `message`
    /// must carry the index of that query.
    ///
    /// # Errors
    /// - [`SimplenetError::UnknownChannel`]: no such channel here
    /// - [`SimplenetError::NotLoginCorrelated`]: `M` carries no login index
    pub fn login_reply<M: 'static>(&self, channel: &ChannelName, message: &M) -> Result<Frame, SimplenetError> {
        let frame = self.frame(channel, message)?;
        if !frame.is_login() {
            return Err(SimplenetError::NotLoginCorrelated {
                channel: channel.clone(),
                kind: std::any::type_name::<M>(),
            });
        }
        Ok(frame.into_reply())
    }

    // -- Inbound ----------------------------------------------------------

    /// Routes one inbound frame to its channel.
    pub fn handle_frame(&self, frame: Frame, ctx: &DispatchContext) -> Result<FrameOutcome, SimplenetError> {
        let Some(channel) = self.channel(&frame.channel) else {
            if frame.is_login() && !frame.is_reply {
                tracing::debug!(
                    channel = %frame.channel,
                    conn_id = %ctx.connection(),
                    login_index = %frame.login_index,
                    "login frame for unknown channel, answering with no payload"
                );
                ctx.set_handled(true);
                return Ok(FrameOutcome::Reply(Frame::absent_reply(
                    frame.channel,
                    frame.login_index,
                )));
            }
            tracing::debug!(
                channel = %frame.channel,
                conn_id = %ctx.connection(),
                "frame for unknown channel dropped"
            );
            return Ok(FrameOutcome::Dropped);
        };

        let login_index = frame.login_index;
        let is_reply = frame.is_reply;
        let outcome = channel.dispatch(frame, ctx)?;
        if is_reply
            && login_index.is_some()
            && matches!(
                outcome,
                DispatchOutcome::Delivered(_) | DispatchOutcome::ReplyNotRequired
            )
        {
            self.pending.resolve(ctx.connection(), login_index);
        }
        Ok(FrameOutcome::Dispatched(outcome))
    }

    // -- Version negotiation ----------------------------------------------

    /// `(name, version)` of every local channel, sorted by name.
    pub fn channel_versions(&self) -> Vec<(ChannelName, String)> {
        let mut versions: Vec<_> = self
            .channels
            .read()
            .values()
            .map(|c| (c.name().clone(), c.config().protocol_version.clone()))
            .collect();
        versions.sort();
        versions
    }

    /// Checks the peer's channel list against every local channel.
    ///
    /// Channels the peer has but this side doesn't are ignored; frames for
    /// them are dropped at dispatch time.
    ///
    /// # Errors
    /// [`SimplenetError::VersionMismatch`] for the first local channel that
    /// rejects the peer's version, or its absence.
    pub fn check_remote_versions(&self, remote: &[(ChannelName, String)]) -> Result<(), SimplenetError> {
        let remote: HashMap<&ChannelName, &str> =
            remote.iter().map(|(name, v)| (name, v.as_str())).collect();

        let channels = self.channels.read();
        let mut names: Vec<_> = channels.keys().collect();
        names.sort();
        for name in names {
            let channel = &channels[name];
            let theirs = remote.get(name).copied();
            if !channel.accepts_version(theirs) {
                tracing::warn!(
                    channel = %name,
                    local = %channel.config().protocol_version,
                    remote = ?theirs,
                    "channel version rejected"
                );
                return Err(SimplenetError::VersionMismatch {
                    channel: name.clone(),
                    local: channel.config().protocol_version.clone(),
                    remote: theirs.map(str::to_string),
                });
            }
        }
        Ok(())
    }
}
