//! Message descriptors: one registration record per message kind.
//!
//! A descriptor binds a Rust type to its discriminator byte, its payload
//! encoder and decoder, its consumer, and the direction it may travel.
//! Descriptors are immutable once built and shared through `Arc` between
//! the registry's two lookup tables.
//!
//! Encoder and decoder are both optional:
//!
//! - no encoder: the kind is inbound-only for this endpoint; encoding it
//!   writes nothing,
//! - no decoder: the kind is outbound-only; a peer sending it gets
//!   nothing dispatched.

use std::any::{TypeId, type_name};
use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};
use simplenet_protocol::{Codec, Discriminator, LoginIndex, ProtocolError};
use simplenet_transport::{Direction, DispatchContext};

use crate::CodecError;

/// Writes a message's payload (not its discriminator).
pub type EncodeFn<M> = dyn Fn(&M, &mut BytesMut) -> Result<(), ProtocolError> + Send + Sync;
/// Reads a message's payload; the discriminator is already consumed.
pub type DecodeFn<M> = dyn Fn(&mut Bytes) -> Result<M, ProtocolError> + Send + Sync;
/// Receives a decoded message.
pub type ConsumeFn<M> = dyn Fn(M, &DispatchContext) + Send + Sync;
/// Reads the login correlation index a request carries.
pub type LoginGetFn<M> = dyn Fn(&M) -> LoginIndex + Send + Sync;
/// Stamps a login correlation index onto a decoded reply.
pub type LoginSetFn<M> = dyn Fn(&mut M, LoginIndex) + Send + Sync;

// ---------------------------------------------------------------------------
// LoginCorrelation
// ---------------------------------------------------------------------------

/// Whether a kind takes part in login-phase request/reply correlation.
///
/// The getter and setter come as a pair: a kind either relays indices in
/// both directions or not at all.
pub enum LoginCorrelation<M> {
    NotApplicable,
    Correlated {
        get: Box<LoginGetFn<M>>,
        set: Box<LoginSetFn<M>>,
    },
}

impl<M> LoginCorrelation<M> {
    pub fn is_correlated(&self) -> bool {
        matches!(self, Self::Correlated { .. })
    }

    /// The index to report after encoding `message`.
    pub fn index_of(&self, message: &M) -> LoginIndex {
        match self {
            Self::NotApplicable => LoginIndex::NONE,
            Self::Correlated { get, .. } => get(message),
        }
    }

    /// Stamps `index` onto a decoded message. The sentinel is never
    /// stamped: only replies carry a real index.
    pub fn stamp(&self, message: &mut M, index: LoginIndex) {
        if index.is_none() {
            return;
        }
        if let Self::Correlated { set, .. } = self {
            set(message, index);
        }
    }
}

// ---------------------------------------------------------------------------
// MessageDescriptor
// ---------------------------------------------------------------------------

/// The registration record for message kind `M` on one channel.
pub struct MessageDescriptor<M> {
    discriminator: Discriminator,
    encoder: Option<Box<EncodeFn<M>>>,
    decoder: Option<Box<DecodeFn<M>>>,
    consumer: Box<ConsumeFn<M>>,
    direction: Option<Direction>,
    login: LoginCorrelation<M>,
}

impl<M: 'static> MessageDescriptor<M> {
    /// Starts a descriptor for `M` at registration index `index`.
    ///
    /// The index is validated by [`DescriptorBuilder::build`]; anything
    /// above 255 is rejected there.
    pub fn builder(index: u32) -> DescriptorBuilder<M> {
        DescriptorBuilder {
            index,
            encoder: None,
            decoder: None,
            consumer: None,
            direction: None,
            login: LoginCorrelation::NotApplicable,
        }
    }

    pub fn discriminator(&self) -> Discriminator {
        self.discriminator
    }

    pub fn kind_name(&self) -> &'static str {
        type_name::<M>()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn login(&self) -> &LoginCorrelation<M> {
        &self.login
    }

    /// Writes the discriminator and payload of `message`, then reports its
    /// login index.
    ///
    /// Without an encoder nothing is written, but the login index is still
    /// reported.
    pub fn encode(&self, message: &M, target: &mut BytesMut) -> Result<LoginIndex, ProtocolError> {
        if let Some(encoder) = &self.encoder {
            target.extend_from_slice(&[self.discriminator.get()]);
            encoder(message, target)?;
        }
        Ok(self.login.index_of(message))
    }

    /// Decodes a payload whose discriminator has already been read and
    /// stamps `login_index` onto it.
    ///
    /// Returns `Ok(None)` when this endpoint has no decoder for the kind.
    pub fn decode(&self, payload: &mut Bytes, login_index: LoginIndex) -> Result<Option<M>, ProtocolError> {
        let Some(decoder) = &self.decoder else {
            return Ok(None);
        };
        let mut message = decoder(payload)?;
        self.login.stamp(&mut message, login_index);
        Ok(Some(message))
    }

    pub fn consume(&self, message: M, ctx: &DispatchContext) {
        (self.consumer)(message, ctx);
    }
}

impl<M> fmt::Debug for MessageDescriptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDescriptor")
            .field("kind", &type_name::<M>())
            .field("discriminator", &self.discriminator)
            .field("direction", &self.direction)
            .field("encoder", &self.encoder.is_some())
            .field("decoder", &self.decoder.is_some())
            .field("login", &self.login.is_correlated())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RegisteredMessage: the type-erased view
// ---------------------------------------------------------------------------

/// A descriptor with its message type erased.
///
/// The decode path only knows a discriminator byte, not a Rust type, so it
/// works through this trait. Decoding and consuming happen in one call so
/// the decoded value never has to leave its concrete type.
pub trait RegisteredMessage: Send + Sync {
    fn discriminator(&self) -> Discriminator;
    fn kind(&self) -> TypeId;
    fn kind_name(&self) -> &'static str;
    fn direction(&self) -> Option<Direction>;
    fn can_encode(&self) -> bool;
    fn can_decode(&self) -> bool;
    fn is_login_correlated(&self) -> bool;

    /// Decodes `payload`, stamps the login index, and runs the consumer.
    ///
    /// Returns `Ok(false)` without touching `payload` if there is no
    /// decoder.
    fn decode_and_consume(
        &self,
        payload: &mut Bytes,
        login_index: LoginIndex,
        ctx: &DispatchContext,
    ) -> Result<bool, ProtocolError>;
}

impl<M: 'static> RegisteredMessage for MessageDescriptor<M> {
    fn discriminator(&self) -> Discriminator {
        self.discriminator
    }

    fn kind(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn kind_name(&self) -> &'static str {
        type_name::<M>()
    }

    fn direction(&self) -> Option<Direction> {
        self.direction
    }

    fn can_encode(&self) -> bool {
        self.encoder.is_some()
    }

    fn can_decode(&self) -> bool {
        self.decoder.is_some()
    }

    fn is_login_correlated(&self) -> bool {
        self.login.is_correlated()
    }

    fn decode_and_consume(
        &self,
        payload: &mut Bytes,
        login_index: LoginIndex,
        ctx: &DispatchContext,
    ) -> Result<bool, ProtocolError> {
        match self.decode(payload, login_index)? {
            Some(message) => {
                self.consume(message, ctx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// DescriptorBuilder
// ---------------------------------------------------------------------------

/// Builder for [`MessageDescriptor`].
///
/// ```rust
/// use simplenet_codec::MessageDescriptor;
/// use simplenet_protocol::{LoginIndex, WireRead, WireWrite};
/// use simplenet_transport::Direction;
///
/// struct Ping { login: LoginIndex, nonce: i32 }
///
/// let descriptor = MessageDescriptor::<Ping>::builder(3)
///     .encoder(|ping, buf| { buf.write_i32(ping.nonce); Ok(()) })
///     .decoder(|buf| Ok(Ping { login: LoginIndex::NONE, nonce: buf.read_i32()? }))
///     .consumer(|ping, ctx| { let _ = ping.nonce; ctx.set_handled(true); })
///     .direction(Direction::ServerToClient)
///     .login_index(|ping| ping.login, |ping, index| ping.login = index)
///     .build()
///     .unwrap();
///
/// assert_eq!(descriptor.discriminator().get(), 3);
/// ```
pub struct DescriptorBuilder<M> {
    index: u32,
    encoder: Option<Box<EncodeFn<M>>>,
    decoder: Option<Box<DecodeFn<M>>>,
    consumer: Option<Box<ConsumeFn<M>>>,
    direction: Option<Direction>,
    login: LoginCorrelation<M>,
}

impl<M: 'static> DescriptorBuilder<M> {
    pub fn encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&M, &mut BytesMut) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.encoder = Some(Box::new(encoder));
        self
    }

    pub fn decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(&mut Bytes) -> Result<M, ProtocolError> + Send + Sync + 'static,
    {
        self.decoder = Some(Box::new(decoder));
        self
    }

    pub fn consumer<F>(mut self, consumer: F) -> Self
    where
        F: Fn(M, &DispatchContext) + Send + Sync + 'static,
    {
        self.consumer = Some(Box::new(consumer));
        self
    }

    /// Restricts the kind to one direction of travel. Without this call
    /// both directions are accepted.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Makes the kind take part in login-phase correlation.
    pub fn login_index<G, S>(mut self, get: G, set: S) -> Self
    where
        G: Fn(&M) -> LoginIndex + Send + Sync + 'static,
        S: Fn(&mut M, LoginIndex) + Send + Sync + 'static,
    {
        self.login = LoginCorrelation::Correlated {
            get: Box::new(get),
            set: Box::new(set),
        };
        self
    }

    /// Installs both encoder and decoder from a serde [`Codec`].
    pub fn payload_codec<C>(self, codec: C) -> Self
    where
        C: Codec + Clone,
        M: Serialize + DeserializeOwned,
    {
        let decode_with = codec.clone();
        self.encoder(move |message, target| codec.encode_into(message, target))
            .decoder(move |payload| decode_with.decode_from(payload))
    }

    /// Validates the registration index and finishes the descriptor.
    ///
    /// # Errors
    /// - [`CodecError::DiscriminatorOutOfRange`]: index above 255
    /// - [`CodecError::MissingConsumer`]: no consumer was set
    pub fn build(self) -> Result<MessageDescriptor<M>, CodecError> {
        let discriminator = Discriminator::try_from(self.index)?;
        let consumer = self.consumer.ok_or(CodecError::MissingConsumer {
            kind: type_name::<M>(),
        })?;
        Ok(MessageDescriptor {
            discriminator,
            encoder: self.encoder,
            decoder: self.decoder,
            consumer,
            direction: self.direction,
            login: self.login,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use simplenet_protocol::{JsonCodec, WireRead, WireWrite};
    use simplenet_transport::ConnectionId;

    use super::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Query {
        #[serde(skip, default)]
        login: LoginIndex,
        text: String,
    }

    fn ctx() -> DispatchContext {
        DispatchContext::new(ConnectionId::new(1), Direction::ClientToServer)
    }

    fn noop<M>(_: M, _: &DispatchContext) {}

    #[test]
    fn test_build_rejects_index_above_255() {
        let err = MessageDescriptor::<Query>::builder(256)
            .consumer(noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, CodecError::DiscriminatorOutOfRange(_)));
    }

    #[test]
    fn test_build_requires_consumer() {
        let err = MessageDescriptor::<Query>::builder(1).build().unwrap_err();
        assert!(matches!(err, CodecError::MissingConsumer { .. }));
    }

    #[test]
    fn test_encode_writes_discriminator_before_payload() {
        let descriptor = MessageDescriptor::<i32>::builder(0xab)
            .encoder(|value, buf| {
                buf.write_i32(*value);
                Ok(())
            })
            .consumer(noop)
            .build()
            .unwrap();

        let mut buf = BytesMut::new();
        let index = descriptor.encode(&1, &mut buf).unwrap();
        assert_eq!(&buf[..], &[0xab, 0, 0, 0, 1]);
        assert!(index.is_none());
    }

    #[test]
    fn test_encode_without_encoder_writes_nothing_but_reports_index() {
        let descriptor = MessageDescriptor::<Query>::builder(1)
            .consumer(noop)
            .login_index(|q| q.login, |q, i| q.login = i)
            .build()
            .unwrap();

        let mut buf = BytesMut::new();
        let query = Query { login: LoginIndex::new(4), text: "x".into() };
        let index = descriptor.encode(&query, &mut buf).unwrap();
        assert!(buf.is_empty());
        assert_eq!(index, LoginIndex::new(4));
    }

    #[test]
    fn test_decode_stamps_only_real_indices() {
        let stamps = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&stamps);
        let descriptor = MessageDescriptor::<Query>::builder(1)
            .payload_codec(JsonCodec)
            .consumer(noop)
            .login_index(
                |q| q.login,
                move |q, i| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    q.login = i;
                },
            )
            .build()
            .unwrap();

        let query = Query { login: LoginIndex::NONE, text: "hi".into() };
        let mut buf = BytesMut::new();
        descriptor.encode(&query, &mut buf).unwrap();
        let mut bytes = buf.freeze();
        assert_eq!(bytes.read_u8().unwrap(), 1);

        let mut sentinel = bytes.clone();
        let decoded = descriptor.decode(&mut sentinel, LoginIndex::NONE).unwrap().unwrap();
        assert!(decoded.login.is_none());
        assert_eq!(stamps.load(Ordering::SeqCst), 0);

        let decoded = descriptor.decode(&mut bytes, LoginIndex::new(9)).unwrap().unwrap();
        assert_eq!(decoded.login, LoginIndex::new(9));
        assert_eq!(decoded.text, "hi");
        assert_eq!(stamps.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_and_consume_without_decoder_skips_consumer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let descriptor = MessageDescriptor::<Query>::builder(1)
            .consumer(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let mut payload = Bytes::from_static(b"\x01\x02");
        let delivered = descriptor
            .decode_and_consume(&mut payload, LoginIndex::NONE, &ctx())
            .unwrap();
        assert!(!delivered);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(payload.len(), 2, "payload left untouched");
    }

    #[test]
    fn test_erased_view_reports_capabilities() {
        let descriptor = MessageDescriptor::<Query>::builder(7)
            .decoder(|buf| {
                Ok(Query { login: LoginIndex::NONE, text: buf.read_string(64)? })
            })
            .consumer(noop)
            .direction(Direction::ServerToClient)
            .build()
            .unwrap();
        let erased: &dyn RegisteredMessage = &descriptor;

        assert_eq!(erased.discriminator().get(), 7);
        assert_eq!(erased.kind(), TypeId::of::<Query>());
        assert!(erased.kind_name().ends_with("Query"));
        assert_eq!(erased.direction(), Some(Direction::ServerToClient));
        assert!(!erased.can_encode());
        assert!(erased.can_decode());
        assert!(!erased.is_login_correlated());
    }
}
