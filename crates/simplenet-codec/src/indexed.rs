//! The discriminator-indexed codec for one channel.
//!
//! Outbound, [`IndexedCodec::encode`] finds the descriptor for a value's
//! type and writes `discriminator, payload` into the buffer. Inbound,
//! [`IndexedCodec::dispatch`] reads the discriminator back, checks the
//! direction, decodes, and hands the message to its consumer.
//!
//! # Wire format
//!
//! ```text
//! u8        discriminator   (unique per channel)
//! variable  payload         (whatever the kind's encoder wrote)
//! ```
//!
//! There is no length prefix or checksum at this layer. A decoder that
//! reads more or fewer bytes than its encoder wrote corrupts everything
//! after it in the same buffer; dispatch logs leftover bytes to make such
//! mismatches visible.

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use simplenet_protocol::{ChannelName, Discriminator, LoginIndex, WireRead};
use simplenet_transport::DispatchContext;

use crate::{
    CodecError, DirectionPolicy, FreezePolicy, HandshakeTracker, MessageDescriptor,
    NoPendingReplies, RegisteredMessage, Registry, RegistryState, StrictDirection,
};

/// What [`IndexedCodec::dispatch`] did with a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message was decoded and its consumer ran.
    Delivered(Discriminator),
    /// The kind has no decoder on this endpoint; nothing ran.
    NoDecoder(Discriminator),
    /// No kind owns the discriminator; the message was dropped.
    UnknownDiscriminator(Discriminator),
    /// No payload arrived, and the request it answers did not need one.
    /// The context has been marked handled.
    ReplyNotRequired,
    /// No payload arrived for a request that needed one. The context is
    /// left unhandled for the transport to act on.
    ReplyMissing,
}

impl DispatchOutcome {
    pub fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Registry plus encode/dispatch for one channel.
///
/// `IndexedCodec` is `Send + Sync`; share it behind an `Arc` and call
/// [`encode`](Self::encode) and [`dispatch`](Self::dispatch) from as many
/// connection threads as needed.
pub struct IndexedCodec {
    registry: Registry,
    direction_policy: Arc<dyn DirectionPolicy>,
    tracker: Arc<dyn HandshakeTracker>,
    freeze_policy: FreezePolicy,
}

impl IndexedCodec {
    /// Creates a codec with [`StrictDirection`], no login tracking, and
    /// manual freezing.
    pub fn new(channel: ChannelName) -> Self {
        Self {
            registry: Registry::new(channel),
            direction_policy: Arc::new(StrictDirection),
            tracker: Arc::new(NoPendingReplies),
            freeze_policy: FreezePolicy::default(),
        }
    }

    pub fn with_direction_policy(mut self, policy: Arc<dyn DirectionPolicy>) -> Self {
        self.direction_policy = policy;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn HandshakeTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_freeze_policy(mut self, policy: FreezePolicy) -> Self {
        self.freeze_policy = policy;
        self
    }

    pub fn channel(&self) -> &ChannelName {
        self.registry.channel()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // -- Registration -----------------------------------------------------

    /// See [`Registry::register`].
    pub fn register<M: 'static>(
        &self,
        descriptor: MessageDescriptor<M>,
    ) -> Result<Arc<MessageDescriptor<M>>, CodecError> {
        self.registry.register(descriptor)
    }

    pub fn find_by_kind<M: 'static>(&self) -> Option<Arc<MessageDescriptor<M>>> {
        self.registry.find_by_kind::<M>()
    }

    pub fn find_by_discriminator(&self, discriminator: Discriminator) -> Option<Arc<dyn RegisteredMessage>> {
        self.registry.find_by_discriminator(discriminator)
    }

    pub fn freeze(&self) {
        self.registry.freeze();
    }

    // -- Encode -----------------------------------------------------------

    /// Writes `message` into `target` and returns its login index.
    ///
    /// Kinds without an encoder write nothing. The returned index is
    /// [`LoginIndex::NONE`] unless the kind is login-correlated.
    ///
    /// # Errors
    /// - [`CodecError::UnknownMessageKind`]: `M` is not registered here
    /// - [`CodecError::Protocol`]: the payload encoder failed
    pub fn encode<M: 'static>(&self, message: &M, target: &mut BytesMut) -> Result<LoginIndex, CodecError> {
        let Some(descriptor) = self.registry.find_by_kind::<M>() else {
            let kind = std::any::type_name::<M>();
            tracing::error!(channel = %self.channel(), kind, "encode of unregistered message kind");
            return Err(CodecError::UnknownMessageKind {
                channel: self.channel().clone(),
                kind,
            });
        };
        Ok(descriptor.encode(message, target)?)
    }

    /// Convenience wrapper around [`encode`](Self::encode) that returns a
    /// fresh buffer.
    pub fn encode_to_bytes<M: 'static>(&self, message: &M) -> Result<(Bytes, LoginIndex), CodecError> {
        let mut buf = BytesMut::new();
        let index = self.encode(message, &mut buf)?;
        Ok((buf.freeze(), index))
    }

    // -- Dispatch ---------------------------------------------------------

    /// Decodes one inbound payload and runs its consumer.
    ///
    /// `payload == None` means the peer sent no answer to the login request
    /// `login_index`; the handshake tracker decides whether that is fine.
    /// `login_index` is stamped onto the decoded message when it is not
    /// the sentinel and the kind is login-correlated.
    ///
    /// # Errors
    /// - [`CodecError::DirectionViolation`]: the direction policy refused
    /// - [`CodecError::Protocol`]: the payload was empty or malformed
    pub fn dispatch(
        &self,
        payload: Option<Bytes>,
        login_index: LoginIndex,
        ctx: &DispatchContext,
    ) -> Result<DispatchOutcome, CodecError> {
        if self.freeze_policy == FreezePolicy::OnFirstDispatch
            && self.registry.state() == RegistryState::Open
        {
            self.registry.freeze();
        }

        let Some(mut payload) = payload else {
            return Ok(self.absent_payload(login_index, ctx));
        };

        let discriminator = Discriminator::new(payload.read_u8()?);
        let Some(descriptor) = self.registry.find_by_discriminator(discriminator) else {
            tracing::error!(
                channel = %self.channel(),
                %discriminator,
                conn_id = %ctx.connection(),
                "received unknown discriminator"
            );
            return Ok(DispatchOutcome::UnknownDiscriminator(discriminator));
        };

        let kind = descriptor.kind_name();
        let declared = descriptor.direction();
        if !self.direction_policy.permits(kind, declared, ctx) {
            return Err(CodecError::DirectionViolation {
                channel: self.channel().clone(),
                kind,
                declared,
                observed: ctx.direction(),
            });
        }

        if !descriptor.decode_and_consume(&mut payload, login_index, ctx)? {
            tracing::debug!(
                channel = %self.channel(),
                kind,
                %discriminator,
                "no decoder on this side, message ignored"
            );
            return Ok(DispatchOutcome::NoDecoder(discriminator));
        }

        if payload.has_remaining() {
            tracing::warn!(
                channel = %self.channel(),
                kind,
                leftover = payload.remaining(),
                "decoder did not consume the whole payload"
            );
        }
        tracing::trace!(channel = %self.channel(), kind, %login_index, "dispatched");
        Ok(DispatchOutcome::Delivered(discriminator))
    }

    fn absent_payload(&self, login_index: LoginIndex, ctx: &DispatchContext) -> DispatchOutcome {
        if self.tracker.needs_response(ctx.connection(), login_index) {
            tracing::debug!(
                channel = %self.channel(),
                %login_index,
                conn_id = %ctx.connection(),
                "required login reply is missing"
            );
            DispatchOutcome::ReplyMissing
        } else {
            ctx.set_handled(true);
            DispatchOutcome::ReplyNotRequired
        }
    }
}

impl std::fmt::Debug for IndexedCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedCodec")
            .field("registry", &self.registry)
            .field("freeze_policy", &self.freeze_policy)
            .finish_non_exhaustive()
    }
}
