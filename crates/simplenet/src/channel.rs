//! A named channel: one config, one discriminator-indexed codec.

use std::sync::Arc;

use simplenet_codec::{
    DescriptorBuilder, DispatchOutcome, HandshakeTracker, IndexedCodec, MessageDescriptor,
    RegisteredMessage,
};
use simplenet_protocol::{
    Bytes, BytesMut, ChannelName, Codec, Frame, LoginIndex, ProtocolError,
};
use simplenet_transport::{Direction, DispatchContext};

use crate::{ChannelConfig, SimplenetError};

/// One named channel carrying many message kinds.
///
/// Message kinds are added with [`message`](Self::message) during startup.
/// Afterwards the channel turns values into [`Frame`]s and dispatches
/// inbound frames to the registered consumers.
///
/// # Example
///
/// ```rust
/// use simplenet::prelude::*;
///
/// #[derive(Debug)]
/// struct Ping(i32);
///
/// let name = ChannelName::new("demo:ping").unwrap();
/// let channel = SimpleChannel::new(ChannelConfig::new(name));
/// channel
///     .message::<Ping>(0)
///     .encoder(|ping, buf| {
///         buf.write_var_i32(ping.0);
///         Ok(())
///     })
///     .decoder(|buf| Ok(Ping(buf.read_var_i32()?)))
///     .consumer(|ping, _ctx| println!("got {ping:?}"))
///     .add()
///     .unwrap();
///
/// let frame = channel.to_frame(&Ping(7)).unwrap();
/// assert!(!frame.is_login());
/// ```
#[derive(Debug)]
pub struct SimpleChannel {
    config: ChannelConfig,
    codec: IndexedCodec,
}

impl SimpleChannel {
    /// Creates a standalone channel that tracks no login replies.
    pub fn new(config: ChannelConfig) -> Self {
        let codec = IndexedCodec::new(config.name.clone()).with_freeze_policy(config.freeze_policy);
        Self { config, codec }
    }

    /// Creates a channel whose absent-payload decisions go to `tracker`.
    pub(crate) fn with_tracker(config: ChannelConfig, tracker: Arc<dyn HandshakeTracker>) -> Self {
        let mut channel = Self::new(config);
        channel.codec = channel.codec.with_tracker(tracker);
        channel
    }

    pub fn name(&self) -> &ChannelName {
        &self.config.name
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn codec(&self) -> &IndexedCodec {
        &self.codec
    }

    /// Starts registering message kind `M` under discriminator `index`.
    /// Nothing is registered until [`MessageBuilder::add`].
    pub fn message<M: 'static>(&self, index: u32) -> MessageBuilder<'_, M> {
        MessageBuilder {
            channel: self,
            inner: MessageDescriptor::<M>::builder(index),
        }
    }

    /// Stops accepting message registrations.
    pub fn freeze(&self) {
        self.codec.freeze();
    }

    // -- Outbound ---------------------------------------------------------

    /// Encodes `message` as `discriminator, payload`.
    pub fn encode<M: 'static>(&self, message: &M) -> Result<(Bytes, LoginIndex), SimplenetError> {
        Ok(self.codec.encode_to_bytes(message)?)
    }

    /// Encodes `message` into a frame. Login-correlated kinds produce a
    /// login request carrying the message's index.
    ///
    /// # Errors
    /// - [`SimplenetError::NotEncodable`]: `M` has no encoder on this side,
    ///   so the frame would be empty
    /// - [`SimplenetError::Codec`]: `M` is not registered, or encoding failed
    pub fn to_frame<M: 'static>(&self, message: &M) -> Result<Frame, SimplenetError> {
        if self
            .codec
            .find_by_kind::<M>()
            .is_some_and(|descriptor| !descriptor.can_encode())
        {
            return Err(SimplenetError::NotEncodable {
                channel: self.name().clone(),
                kind: std::any::type_name::<M>(),
            });
        }
        let (payload, index) = self.encode(message)?;
        let frame = if index.is_some() {
            Frame::login(self.name().clone(), index, payload)
        } else {
            Frame::play(self.name().clone(), payload)
        };
        Ok(frame)
    }

    // -- Inbound ----------------------------------------------------------

    /// Dispatches a frame addressed to this channel.
    ///
    /// # Errors
    /// [`SimplenetError::UnknownChannel`] if the frame names another channel;
    /// otherwise see [`IndexedCodec::dispatch`].
    pub fn dispatch(&self, frame: Frame, ctx: &DispatchContext) -> Result<DispatchOutcome, SimplenetError> {
        if &frame.channel != self.name() {
            tracing::error!(
                channel = %self.name(),
                frame_channel = %frame.channel,
                "frame dispatched to the wrong channel"
            );
            return Err(SimplenetError::UnknownChannel(frame.channel));
        }
        Ok(self.codec.dispatch(frame.payload, frame.login_index, ctx)?)
    }

    /// See [`ChannelConfig::accepts_version`].
    pub fn accepts_version(&self, remote: Option<&str>) -> bool {
        self.config.accepts_version(remote)
    }
}

// ---------------------------------------------------------------------------
// MessageBuilder
// ---------------------------------------------------------------------------

/// Fluent registration of one message kind on a [`SimpleChannel`].
#[must_use = "a message kind is only registered once `add` is called"]
pub struct MessageBuilder<'a, M> {
    channel: &'a SimpleChannel,
    inner: DescriptorBuilder<M>,
}

impl<M: 'static> MessageBuilder<'_, M> {
    pub fn encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&M, &mut BytesMut) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.inner = self.inner.encoder(encoder);
        self
    }

    pub fn decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(&mut Bytes) -> Result<M, ProtocolError> + Send + Sync + 'static,
    {
        self.inner = self.inner.decoder(decoder);
        self
    }

    pub fn consumer<F>(mut self, consumer: F) -> Self
    where
        F: Fn(M, &DispatchContext) + Send + Sync + 'static,
    {
        self.inner = self.inner.consumer(consumer);
        self
    }

    /// Restricts the kind to one direction of travel.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.inner = self.inner.direction(direction);
        self
    }

    /// Makes the kind login-correlated.
    pub fn login_index<G, S>(mut self, get: G, set: S) -> Self
    where
        G: Fn(&M) -> LoginIndex + Send + Sync + 'static,
        S: Fn(&mut M, LoginIndex) + Send + Sync + 'static,
    {
        self.inner = self.inner.login_index(get, set);
        self
    }

    /// Installs an encoder and decoder backed by a serde payload codec.
    pub fn payload_codec<C>(mut self, codec: C) -> Self
    where
        C: Codec + Clone,
        M: serde::Serialize + serde::de::DeserializeOwned,
    {
        self.inner = self.inner.payload_codec(codec);
        self
    }

    /// Builds the descriptor and registers it on the channel.
    pub fn add(self) -> Result<Arc<MessageDescriptor<M>>, SimplenetError> {
        let descriptor = self.inner.build()?;
        Ok(self.channel.codec.register(descriptor)?)
    }
}
