//! Integration tests: a server hub and client hubs talking over loopback
//! connections, each end driven by its own `serve` loop.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use simplenet::prelude::*;
use simplenet::codec::CodecError;
use tokio::sync::mpsc;

// =========================================================================
// Message kinds and hub setup
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
struct ModListQuery {
    #[serde(skip)]
    login: LoginIndex,
    mods: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModListReply {
    #[serde(skip)]
    login: LoginIndex,
    mods: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Chat {
    text: String,
}

fn login_channel() -> ChannelName {
    ChannelName::new("demo:login").unwrap()
}

fn chat_channel() -> ChannelName {
    ChannelName::new("demo:chat").unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Registers both login kinds. Each side only consumes what travels
/// towards it; the other consumer is a no-op.
fn register_login_kinds(
    hub: &NetworkHub,
    on_query: impl Fn(ModListQuery, &DispatchContext) + Send + Sync + 'static,
    on_reply: impl Fn(ModListReply, &DispatchContext) + Send + Sync + 'static,
) {
    let channel = hub
        .register_channel(ChannelConfig::new(login_channel()))
        .unwrap();
    channel
        .message::<ModListQuery>(0)
        .payload_codec(JsonCodec)
        .consumer(on_query)
        .login_index(|q| q.login, |q, index| q.login = index)
        .direction(Direction::ServerToClient)
        .add()
        .unwrap();
    channel
        .message::<ModListReply>(1)
        .payload_codec(JsonCodec)
        .consumer(on_reply)
        .login_index(|r| r.login, |r, index| r.login = index)
        .direction(Direction::ClientToServer)
        .add()
        .unwrap();
}

fn register_chat(hub: &NetworkHub, on_chat: impl Fn(Chat, &DispatchContext) + Send + Sync + 'static) {
    let channel = hub
        .register_channel(ChannelConfig::new(chat_channel()).with_allow_absent(true))
        .unwrap();
    channel
        .message::<Chat>(0)
        .payload_codec(JsonCodec)
        .consumer(on_chat)
        .direction(Direction::ClientToServer)
        .add()
        .unwrap();
}

/// A server hub forwarding every reply and chat line it consumes.
fn server_hub() -> (
    NetworkHub,
    mpsc::UnboundedReceiver<ModListReply>,
    mpsc::UnboundedReceiver<Chat>,
) {
    let hub = NetworkHub::new(Side::Server);
    let (reply_tx, replies) = mpsc::unbounded_channel();
    register_login_kinds(
        &hub,
        |_, _| {},
        move |reply, ctx| {
            ctx.set_handled(true);
            let _ = reply_tx.send(reply);
        },
    );
    let (chat_tx, chats) = mpsc::unbounded_channel();
    register_chat(&hub, move |chat, ctx| {
        ctx.set_handled(true);
        let _ = chat_tx.send(chat);
    });
    hub.freeze_all();
    (hub, replies, chats)
}

/// A client hub forwarding every query it consumes to `queries`.
fn client_hub(queries: mpsc::UnboundedSender<ModListQuery>) -> NetworkHub {
    let hub = NetworkHub::new(Side::Client);
    register_login_kinds(
        &hub,
        move |query, ctx| {
            ctx.set_handled(true);
            let _ = queries.send(query);
        },
        |_, _| {},
    );
    register_chat(&hub, |_, _| {});
    hub.freeze_all();
    hub
}

fn query(login: LoginIndex) -> ModListQuery {
    ModListQuery {
        login,
        mods: vec!["core".into()],
    }
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("sender dropped")
}

// =========================================================================
// Login exchange
// =========================================================================

#[tokio::test]
async fn test_login_query_round_trip() {
    init_tracing();
    let (server, mut replies, _chats) = server_hub();
    let (query_tx, mut queries) = mpsc::unbounded_channel();
    let client = client_hub(query_tx);
    let (client_conn, server_conn) = pair::<Frame>();

    let driver = async {
        let index = server.next_login_index();
        let frame = server
            .login_query(server_conn.id(), &login_channel(), &query(index), true)
            .unwrap();
        assert!(frame.is_login());
        assert_eq!(frame.login_index, index);
        assert_eq!(server.pending().outstanding(server_conn.id()), 1);
        server_conn.send(frame).await.unwrap();

        let received = recv(&mut queries).await;
        assert_eq!(received.login, index);
        assert_eq!(received.mods, ["core"]);

        let reply = ModListReply {
            login: received.login,
            mods: vec!["core".into(), "extra".into()],
        };
        let frame = client.login_reply(&login_channel(), &reply).unwrap();
        client_conn.send(frame).await.unwrap();

        let reply = recv(&mut replies).await;
        assert_eq!(reply.login, index);
        assert_eq!(reply.mods, ["core", "extra"]);
        assert_eq!(server.pending().outstanding(server_conn.id()), 0);

        client_conn.close().await.unwrap();
    };

    let (server_result, client_result, ()) = tokio::join!(
        serve(&server, &server_conn),
        serve(&client, &client_conn),
        driver
    );
    server_result.unwrap();
    client_result.unwrap();
}

#[tokio::test]
async fn test_optional_query_to_client_without_channel() {
    init_tracing();
    let (server, _replies, _chats) = server_hub();
    let client = NetworkHub::new(Side::Client);
    let (client_conn, server_conn) = pair::<Frame>();

    let driver = async {
        let frame = server
            .login_query(
                server_conn.id(),
                &login_channel(),
                &query(server.next_login_index()),
                false,
            )
            .unwrap();
        server_conn.send(frame).await.unwrap();

        // The client answers with an absent payload; the server accepts it.
        tokio::time::timeout(Duration::from_secs(2), async {
            while server.pending().outstanding(server_conn.id()) > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("query was never resolved");

        client_conn.close().await.unwrap();
    };

    let (server_result, client_result, ()) = tokio::join!(
        serve(&server, &server_conn),
        serve(&client, &client_conn),
        driver
    );
    server_result.unwrap();
    client_result.unwrap();
}

#[tokio::test]
async fn test_required_query_without_answer_disconnects() {
    init_tracing();
    let (server, _replies, _chats) = server_hub();
    let client = NetworkHub::new(Side::Client);
    let (client_conn, server_conn) = pair::<Frame>();

    let driver = async {
        let frame = server
            .login_query(
                server_conn.id(),
                &login_channel(),
                &query(server.next_login_index()),
                true,
            )
            .unwrap();
        server_conn.send(frame).await.unwrap();
    };

    let (server_result, client_result, ()) = tokio::join!(
        serve(&server, &server_conn),
        serve(&client, &client_conn),
        driver
    );
    let err = server_result.unwrap_err();
    assert!(
        matches!(&err, SimplenetError::Disconnected(reason) if reason.contains("not handled")),
        "unexpected error: {err}"
    );
    // The client saw the server hang up, which is a clean end of stream.
    client_result.unwrap();
    assert_eq!(server.pending().outstanding(server_conn.id()), 0);
}

#[tokio::test]
async fn test_login_query_requires_login_kind() {
    let (server, _replies, _chats) = server_hub();
    let err = server
        .login_query(
            ConnectionId::new(1),
            &chat_channel(),
            &Chat { text: "hi".into() },
            true,
        )
        .unwrap_err();
    assert!(matches!(err, SimplenetError::NotLoginCorrelated { .. }));

    let err = server
        .frame(&ChannelName::new("demo:nowhere").unwrap(), &Chat { text: "hi".into() })
        .unwrap_err();
    assert!(matches!(err, SimplenetError::UnknownChannel(_)));
}

#[test]
fn test_peer_request_with_same_index_keeps_own_query_pending() {
    init_tracing();
    let (server, _replies, _chats) = server_hub();
    let (query_tx, _queries) = mpsc::unbounded_channel();
    let client = client_hub(query_tx);
    let conn = ConnectionId::new(7);
    let shared = LoginIndex::new(1);

    // The client sends its own required query L-1...
    client
        .login_query(
            conn,
            &login_channel(),
            &ModListReply {
                login: shared,
                mods: vec![],
            },
            true,
        )
        .unwrap();
    assert_eq!(client.pending().outstanding(conn), 1);

    // ...while the server's query, also numbered L-1, arrives.
    let request = server.frame(&login_channel(), &query(shared)).unwrap();
    assert!(!request.is_reply);
    let ctx = DispatchContext::new(conn, Direction::ServerToClient);
    let outcome = client.handle_frame(request, &ctx).unwrap();
    assert!(matches!(outcome, FrameOutcome::Dispatched(DispatchOutcome::Delivered(_))));
    assert_eq!(client.pending().outstanding(conn), 1);

    // The server cannot answer the client's query: still a required reply.
    let ctx = DispatchContext::new(conn, Direction::ServerToClient);
    let outcome = client
        .handle_frame(Frame::absent_reply(login_channel(), shared), &ctx)
        .unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::Dispatched(DispatchOutcome::ReplyMissing)
    );
    assert!(!ctx.is_handled());
}

#[test]
fn test_only_replies_resolve_pending_queries() {
    let (server, _replies, _chats) = server_hub();
    let (query_tx, _queries) = mpsc::unbounded_channel();
    let client = client_hub(query_tx);
    let conn = ConnectionId::new(8);
    let index = server.next_login_index();
    server
        .login_query(conn, &login_channel(), &query(index), true)
        .unwrap();

    let reply = ModListReply {
        login: index,
        mods: vec!["core".into()],
    };
    let ctx = DispatchContext::new(conn, Direction::ClientToServer);
    let unmarked = client.frame(&login_channel(), &reply).unwrap();
    server.handle_frame(unmarked, &ctx).unwrap();
    assert_eq!(server.pending().outstanding(conn), 1);

    let ctx = DispatchContext::new(conn, Direction::ClientToServer);
    let marked = client.login_reply(&login_channel(), &reply).unwrap();
    assert!(marked.is_reply);
    server.handle_frame(marked, &ctx).unwrap();
    assert_eq!(server.pending().outstanding(conn), 0);

    let err = client
        .login_reply(&chat_channel(), &Chat { text: "hi".into() })
        .unwrap_err();
    assert!(matches!(err, SimplenetError::NotLoginCorrelated { .. }));
}

#[tokio::test]
async fn test_many_connections_exchange_concurrently() {
    init_tracing();
    let (server, mut replies, _chats) = server_hub();
    const CONNECTIONS: usize = 4;
    const ROUNDS: usize = 5;

    let sent: Vec<Vec<LoginIndex>> = join_all((0..CONNECTIONS).map(|_| exchange(&server, ROUNDS))).await;

    let sent: HashSet<LoginIndex> = sent.into_iter().flatten().collect();
    assert_eq!(sent.len(), CONNECTIONS * ROUNDS);

    let mut answered = HashSet::new();
    while let Ok(reply) = replies.try_recv() {
        assert_eq!(reply.mods, ["core"]);
        answered.insert(reply.login);
    }
    assert_eq!(answered, sent);
}

/// One client connection answering `rounds` login queries.
async fn exchange(server: &NetworkHub, rounds: usize) -> Vec<LoginIndex> {
    let (query_tx, mut queries) = mpsc::unbounded_channel();
    let client = client_hub(query_tx);
    let (client_conn, server_conn) = pair::<Frame>();

    let driver = async {
        let mut sent = Vec::with_capacity(rounds);
        for _ in 0..rounds {
            let index = server.next_login_index();
            let frame = server
                .login_query(server_conn.id(), &login_channel(), &query(index), true)
                .unwrap();
            server_conn.send(frame).await.unwrap();
            sent.push(index);
        }
        for _ in 0..rounds {
            let query = recv(&mut queries).await;
            let reply = ModListReply {
                login: query.login,
                mods: query.mods,
            };
            let frame = client.login_reply(&login_channel(), &reply).unwrap();
            client_conn.send(frame).await.unwrap();
        }
        client_conn.close().await.unwrap();
        sent
    };

    let (server_result, client_result, sent) = tokio::join!(
        serve(server, &server_conn),
        serve(&client, &client_conn),
        driver
    );
    server_result.unwrap();
    client_result.unwrap();
    sent
}

// =========================================================================
// Play phase
// =========================================================================

#[tokio::test]
async fn test_direction_violation_closes_only_the_offender() {
    init_tracing();
    let (server, _replies, mut chats) = server_hub();
    let (query_tx, _queries) = mpsc::unbounded_channel();
    let client = client_hub(query_tx);
    let (bad_client, bad_server) = pair::<Frame>();
    let (good_client, good_server) = pair::<Frame>();

    let driver = async {
        // A client may encode a server-to-client kind, but the server
        // refuses to dispatch it.
        let forged = client
            .frame(&login_channel(), &query(LoginIndex::new(99)))
            .unwrap();
        bad_client.send(forged).await.unwrap();
        let end = tokio::time::timeout(Duration::from_secs(2), bad_client.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(end.is_none(), "offender should be disconnected");

        let chat = client
            .frame(&chat_channel(), &Chat { text: "still here".into() })
            .unwrap();
        good_client.send(chat).await.unwrap();
        assert_eq!(recv(&mut chats).await.text, "still here");

        good_client.close().await.unwrap();
    };

    let (bad_result, good_result, ()) = tokio::join!(
        serve(&server, &bad_server),
        serve(&server, &good_server),
        driver
    );
    let err = bad_result.unwrap_err();
    assert!(
        matches!(
            err,
            SimplenetError::Codec(CodecError::DirectionViolation {
                observed: Direction::ClientToServer,
                ..
            })
        ),
        "unexpected error: {err}"
    );
    good_result.unwrap();
}

#[tokio::test]
async fn test_unknown_channel_play_frame_is_ignored() {
    init_tracing();
    let (server, _replies, mut chats) = server_hub();
    let (query_tx, _queries) = mpsc::unbounded_channel();
    let client = client_hub(query_tx);
    let (client_conn, server_conn) = pair::<Frame>();

    let driver = async {
        let stray = Frame::play(
            ChannelName::new("other:mod").unwrap(),
            Bytes::from_static(&[0, 1, 2]),
        );
        client_conn.send(stray).await.unwrap();

        let chat = client
            .frame(&chat_channel(), &Chat { text: "after".into() })
            .unwrap();
        client_conn.send(chat).await.unwrap();
        assert_eq!(recv(&mut chats).await.text, "after");

        client_conn.close().await.unwrap();
    };

    let (server_result, ()) = tokio::join!(serve(&server, &server_conn), driver);
    server_result.unwrap();
}

// =========================================================================
// Version negotiation
// =========================================================================

#[test]
fn test_hubs_negotiate_channel_versions() {
    let (server, _replies, _chats) = server_hub();
    let (query_tx, _queries) = mpsc::unbounded_channel();
    let client = client_hub(query_tx);
    server.check_remote_versions(&client.channel_versions()).unwrap();

    // A client without the chat channel is fine, one without login is not.
    let login_only = NetworkHub::new(Side::Client);
    register_login_kinds(&login_only, |_, _| {}, |_, _| {});
    server.check_remote_versions(&login_only.channel_versions()).unwrap();

    let chat_only = NetworkHub::new(Side::Client);
    register_chat(&chat_only, |_, _| {});
    let err = server
        .check_remote_versions(&chat_only.channel_versions())
        .unwrap_err();
    assert!(matches!(
        err,
        SimplenetError::VersionMismatch { ref channel, remote: None, .. } if *channel == login_channel()
    ));
}
