//! A server and a client negotiate their mod lists over an in-memory
//! connection, then exchange a chat line in the play phase.
//!
//! Run with `RUST_LOG=debug cargo run -p login-handshake` to see every
//! routing decision.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use simplenet::prelude::*;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Message kinds
// ---------------------------------------------------------------------------

/// Server → client: "these are my mods, which do you have?"
#[derive(Debug, Serialize, Deserialize)]
struct ModListQuery {
    #[serde(skip)]
    login: LoginIndex,
    mods: Vec<String>,
}

/// Client → server: the answer to a [`ModListQuery`].
#[derive(Debug, Serialize, Deserialize)]
struct ModListReply {
    #[serde(skip)]
    login: LoginIndex,
    mods: Vec<String>,
}

/// Server → client: an optional config sync the client may not know about.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigSync {
    #[serde(skip)]
    login: LoginIndex,
    view_distance: u8,
}

/// Server → client, play phase. Hand-written wire format.
#[derive(Debug)]
struct ChatLine {
    sender: i32,
    text: String,
}

const MAX_CHAT_LEN: usize = 256;

fn handshake_channel() -> Result<ChannelName, ProtocolError> {
    ChannelName::new("handshake:mods")
}

fn config_channel() -> Result<ChannelName, ProtocolError> {
    ChannelName::new("handshake:config")
}

fn chat_channel() -> Result<ChannelName, ProtocolError> {
    ChannelName::new("play:chat")
}

// ---------------------------------------------------------------------------
// Hub setup
// ---------------------------------------------------------------------------

/// Registers the mod list kinds on either side. The side that only sends a
/// kind gets a consumer that is never reached.
fn register_handshake(
    hub: &NetworkHub,
    on_query: impl Fn(ModListQuery, &DispatchContext) + Send + Sync + 'static,
    on_reply: impl Fn(ModListReply, &DispatchContext) + Send + Sync + 'static,
) -> Result<(), SimplenetError> {
    let channel = hub.register_channel(ChannelConfig::new(handshake_channel()?))?;
    channel
        .message::<ModListQuery>(0)
        .payload_codec(JsonCodec)
        .consumer(on_query)
        .login_index(|q| q.login, |q, index| q.login = index)
        .direction(Direction::ServerToClient)
        .add()?;
    channel
        .message::<ModListReply>(1)
        .payload_codec(JsonCodec)
        .consumer(on_reply)
        .login_index(|r| r.login, |r, index| r.login = index)
        .direction(Direction::ClientToServer)
        .add()?;
    Ok(())
}

fn register_chat(
    hub: &NetworkHub,
    on_chat: impl Fn(ChatLine, &DispatchContext) + Send + Sync + 'static,
) -> Result<(), SimplenetError> {
    let channel = hub.register_channel(
        ChannelConfig::new(chat_channel()?).with_freeze_policy(FreezePolicy::OnFirstDispatch),
    )?;
    channel
        .message::<ChatLine>(0)
        .encoder(|line, buf| {
            buf.write_var_i32(line.sender);
            buf.write_string(&line.text, MAX_CHAT_LEN)
        })
        .decoder(|buf| {
            Ok(ChatLine {
                sender: buf.read_var_i32()?,
                text: buf.read_string(MAX_CHAT_LEN)?,
            })
        })
        .consumer(on_chat)
        .direction(Direction::ServerToClient)
        .add()?;
    Ok(())
}

struct Server {
    hub: NetworkHub,
    replies: mpsc::UnboundedReceiver<ModListReply>,
}

fn server() -> Result<Server, SimplenetError> {
    let hub = NetworkHub::new(Side::Server);
    let (reply_tx, replies) = mpsc::unbounded_channel();
    register_handshake(
        &hub,
        |_, _| {},
        move |reply, ctx| {
            tracing::info!(login_index = %reply.login, mods = ?reply.mods, "client answered");
            ctx.set_handled(true);
            let _ = reply_tx.send(reply);
        },
    )?;

    // Clients without this channel may ignore the sync.
    let config = hub.register_channel(ChannelConfig::new(config_channel()?).with_allow_absent(true))?;
    config
        .message::<ConfigSync>(0)
        .payload_codec(JsonCodec)
        .consumer(|_, _| {})
        .login_index(|c| c.login, |c, index| c.login = index)
        .direction(Direction::ServerToClient)
        .add()?;

    register_chat(&hub, |_, _| {})?;
    hub.freeze_all();
    Ok(Server { hub, replies })
}

struct Client {
    hub: NetworkHub,
    queries: mpsc::UnboundedReceiver<ModListQuery>,
    chat: mpsc::UnboundedReceiver<ChatLine>,
}

/// A client that knows the mod list and chat channels, but not config.
fn client() -> Result<Client, SimplenetError> {
    let hub = NetworkHub::new(Side::Client);
    let (query_tx, queries) = mpsc::unbounded_channel();
    register_handshake(
        &hub,
        move |query, ctx| {
            tracing::info!(login_index = %query.login, mods = ?query.mods, "server asked for mods");
            ctx.set_handled(true);
            let _ = query_tx.send(query);
        },
        |_, _| {},
    )?;
    let (chat_tx, chat) = mpsc::unbounded_channel();
    register_chat(&hub, move |line, ctx| {
        ctx.set_handled(true);
        let _ = chat_tx.send(line);
    })?;
    Ok(Client { hub, queries, chat })
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// What the demo observed, for printing and for tests.
#[derive(Debug)]
struct Summary {
    client_mods: Vec<String>,
    chat: Vec<String>,
    outstanding_queries: usize,
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Result<T, SimplenetError> {
    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(value)) => Ok(value),
        _ => Err(SimplenetError::Disconnected("peer went quiet".into())),
    }
}

async fn run() -> Result<Summary, SimplenetError> {
    let Server {
        hub: server,
        mut replies,
    } = server()?;
    let Client {
        hub: client,
        mut queries,
        mut chat,
    } = client()?;

    server.check_remote_versions(&client.channel_versions())?;

    let (client_conn, server_conn) = pair::<Frame>();
    let conn_id = server_conn.id();

    let session = async {
        // Login phase: one mandatory query, one optional.
        let query = ModListQuery {
            login: server.next_login_index(),
            mods: vec!["core".into(), "minimap".into()],
        };
        let frame = server.login_query(conn_id, &handshake_channel()?, &query, true)?;
        server_conn.send(frame).await?;

        let sync = ConfigSync {
            login: server.next_login_index(),
            view_distance: 12,
        };
        let frame = server.login_query(conn_id, &config_channel()?, &sync, false)?;
        server_conn.send(frame).await?;

        let query = next(&mut queries).await?;
        let reply = ModListReply {
            login: query.login,
            mods: query.mods.into_iter().filter(|m| m == "core").collect(),
        };
        client_conn.send(client.login_reply(&handshake_channel()?, &reply)?).await?;
        let reply = next(&mut replies).await?;

        // Play phase.
        let line = ChatLine {
            sender: 0,
            text: format!("welcome, you run {} mod(s)", reply.mods.len()),
        };
        server_conn.send(server.frame(&chat_channel()?, &line)?).await?;
        let line = next(&mut chat).await?;
        tracing::info!(sender = line.sender, text = %line.text, "chat");

        let outstanding_queries = server.pending().outstanding(conn_id);
        client_conn.close().await?;
        Ok::<_, SimplenetError>(Summary {
            client_mods: reply.mods,
            chat: vec![line.text],
            outstanding_queries,
        })
    };

    let (server_result, client_result, summary) = tokio::join!(
        serve(&server, &server_conn),
        serve(&client, &client_conn),
        session
    );
    server_result?;
    client_result?;
    summary
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let summary = run().await?;
    println!("client mods: {:?}", summary.client_mods);
    println!("chat: {:?}", summary.chat);
    Ok(())
}
