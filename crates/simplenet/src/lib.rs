//! # Simplenet
//!
//! Channel-scoped message multiplexing for client/server games.
//!
//! A [`NetworkHub`] owns named channels. Each [`SimpleChannel`] carries many
//! independently defined message kinds, each identified on the wire by a
//! one-byte discriminator. Kinds can be restricted to one direction of
//! travel, and login-phase kinds carry a correlation index so a reply can
//! be matched to the query it answers.
//!
//! ## Quick Start
//!
//! ```rust
//! use simplenet::prelude::*;
//!
//! #[derive(Debug, serde::Serialize, serde::Deserialize)]
//! struct Chat {
//!     text: String,
//! }
//!
//! let hub = NetworkHub::new(Side::Server);
//! let name = ChannelName::new("demo:chat").unwrap();
//! let channel = hub.register_channel(ChannelConfig::new(name.clone())).unwrap();
//! channel
//!     .message::<Chat>(0)
//!     .payload_codec(JsonCodec)
//!     .consumer(|chat, ctx| {
//!         println!("{}", chat.text);
//!         ctx.set_handled(true);
//!     })
//!     .direction(Direction::ClientToServer)
//!     .add()
//!     .unwrap();
//! hub.freeze_all();
//!
//! let frame = hub.frame(&name, &Chat { text: "hi".into() }).unwrap();
//! // send `frame` over a connection, and on the other side:
//! // serve(&hub, &connection).await
//! # let _ = frame;
//! ```

mod channel;
mod config;
mod error;
mod hub;
mod serve;

pub use channel::{MessageBuilder, SimpleChannel};
pub use config::{ChannelConfig, DEFAULT_PROTOCOL_VERSION};
pub use error::SimplenetError;
pub use hub::{FrameOutcome, NetworkHub};
pub use serve::serve;

pub use simplenet_codec as codec;
pub use simplenet_protocol as protocol;
pub use simplenet_transport as transport;

/// Everything needed to define channels and message kinds.
pub mod prelude {
    pub use crate::{
        ChannelConfig, FrameOutcome, MessageBuilder, NetworkHub, SimpleChannel, SimplenetError,
        serve,
    };
    pub use simplenet_codec::{DispatchOutcome, FreezePolicy};
    pub use simplenet_protocol::{
        Bytes, BytesMut, ChannelName, Frame, JsonCodec, LoginIndex, ProtocolError, WireRead,
        WireWrite,
    };
    pub use simplenet_transport::{
        Connection, ConnectionId, Direction, DispatchContext, Side, pair,
    };
}
