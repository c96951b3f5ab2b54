//! Value types that appear on the wire or label what travels on it.
//!
//! None of these know how a message is encoded. They are the small,
//! strongly typed vocabulary shared by the codec and the hub: which
//! channel, which slot in that channel, and which login exchange.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{DiscriminatorOutOfRange, ProtocolError};

// ---------------------------------------------------------------------------
// Discriminator
// ---------------------------------------------------------------------------

/// The one-byte tag that identifies a message kind within a channel.
///
/// A registration index above 255 cannot be represented, and
/// `Discriminator::try_from` rejects it rather than truncating it into a
/// collision with a smaller index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Discriminator(u8);

impl Discriminator {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for Discriminator {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl TryFrom<u32> for Discriminator {
    type Error = DiscriminatorOutOfRange;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| DiscriminatorOutOfRange(value))
    }
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LoginIndex
// ---------------------------------------------------------------------------

/// Sender-assigned index correlating a login reply with its request.
///
/// [`LoginIndex::NONE`] (the minimum `i32`) means no correlation was
/// requested. It is what the encode path returns for ordinary messages, and
/// what the dispatch path receives for anything that is not a login reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoginIndex(i32);

impl LoginIndex {
    /// The "no correlation" sentinel.
    pub const NONE: Self = Self(i32::MIN);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == i32::MIN
    }

    pub const fn is_some(self) -> bool {
        !self.is_none()
    }

    /// Returns `None` for the sentinel, the raw index otherwise.
    pub fn into_option(self) -> Option<i32> {
        self.is_some().then_some(self.0)
    }
}

impl Default for LoginIndex {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<i32> for LoginIndex {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for LoginIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "L-{}", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelName
// ---------------------------------------------------------------------------

/// A validated `namespace:path` channel identifier.
///
/// The namespace may contain `[a-z0-9_.-]`, the path additionally `/`.
/// Both halves must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    /// Parses and validates a channel name.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidValue`] if the name has no `:`
    /// separator, an empty half, or a character outside the allowed set.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        let Some((namespace, path)) = name.split_once(':') else {
            return Err(ProtocolError::InvalidValue(format!(
                "channel name {name:?} has no namespace"
            )));
        };

        let namespace_ok = !namespace.is_empty()
            && namespace.chars().all(|c| is_name_char(c, false));
        let path_ok = !path.is_empty() && path.chars().all(|c| is_name_char(c, true));

        if namespace_ok && path_ok {
            Ok(Self(name))
        } else {
            Err(ProtocolError::InvalidValue(format!(
                "channel name {name:?} contains invalid characters"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map_or("", |(ns, _)| ns)
    }

    pub fn path(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, path)| path)
    }
}

fn is_name_char(c: char, allow_slash: bool) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-') || (allow_slash && c == '/')
}

impl TryFrom<String> for ChannelName {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelName> for String {
    fn from(value: ChannelName) -> Self {
        value.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One multiplexed message as handed to and from a connection.
///
/// `payload` is the channel-relative bytes: discriminator first, then the
/// kind-specific body. A `None` payload only appears on login replies and
/// means "I have no answer for this request", typically because the peer
/// does not know the channel.
///
/// Login requests and login replies travel as different frames: both peers
/// number their own requests, so an index alone doesn't say whose request
/// a frame belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: ChannelName,
    pub login_index: LoginIndex,
    /// Set on answers to a login request the receiver sent.
    pub is_reply: bool,
    pub payload: Option<Bytes>,
}

impl Frame {
    /// A regular, uncorrelated frame.
    pub fn play(channel: ChannelName, payload: Bytes) -> Self {
        Self {
            channel,
            login_index: LoginIndex::NONE,
            is_reply: false,
            payload: Some(payload),
        }
    }

    /// A login request carrying the requester's correlation index.
    pub fn login(channel: ChannelName, login_index: LoginIndex, payload: Bytes) -> Self {
        Self {
            channel,
            login_index,
            is_reply: false,
            payload: Some(payload),
        }
    }

    /// An answer to the peer's login request `login_index`.
    pub fn login_reply(channel: ChannelName, login_index: LoginIndex, payload: Bytes) -> Self {
        Self {
            channel,
            login_index,
            is_reply: true,
            payload: Some(payload),
        }
    }

    /// A login reply that carries no payload.
    pub fn absent_reply(channel: ChannelName, login_index: LoginIndex) -> Self {
        Self {
            channel,
            login_index,
            is_reply: true,
            payload: None,
        }
    }

    /// Turns a login request frame into the reply carrying the same index.
    pub fn into_reply(mut self) -> Self {
        self.is_reply = true;
        self
    }

    pub fn is_login(&self) -> bool {
        self.login_index.is_some()
    }
}
