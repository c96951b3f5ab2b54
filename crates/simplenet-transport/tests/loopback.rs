//! Integration tests for the in-memory loopback connections.
//!
//! Both ends of a pair run on the same Tokio runtime, so these tests
//! exercise the real send/recv/close paths without any sockets.

#[cfg(feature = "loopback")]
mod loopback {
    use simplenet_transport::{Connection, Side, TransportError, pair};

    #[tokio::test]
    async fn test_loopback_send_and_receive_both_ways() {
        let (client, server) = pair::<String>();

        assert_eq!(client.id(), server.id());
        assert_eq!(client.side(), Side::Client);
        assert_eq!(server.side(), Side::Server);

        client.send("hello from client".to_string()).await.unwrap();
        let received = server.recv().await.unwrap();
        assert_eq!(received.as_deref(), Some("hello from client"));

        server.send("hello from server".to_string()).await.unwrap();
        let received = client.recv().await.unwrap();
        assert_eq!(received.as_deref(), Some("hello from server"));
    }

    #[tokio::test]
    async fn test_loopback_preserves_order() {
        let (client, server) = pair::<u32>();
        for i in 0..10 {
            client.send(i).await.unwrap();
        }
        for i in 0..10 {
            assert_eq!(server.recv().await.unwrap(), Some(i));
        }
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_peer_close() {
        let (client, server) = pair::<u32>();
        client.close().await.unwrap();

        let result = server.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on peer close");
    }

    #[tokio::test]
    async fn test_send_after_local_close_fails() {
        let (client, _server) = pair::<u32>();
        client.close().await.unwrap();

        let err = client.send(1).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn test_send_to_closed_peer_fails() {
        let (client, server) = pair::<u32>();
        server.close().await.unwrap();

        let err = client.send(1).await.unwrap_err();
        assert!(matches!(err, TransportError::SendFailed(id) if id == client.id()));
    }

    #[tokio::test]
    async fn test_each_pair_gets_a_fresh_id() {
        let (a, _) = pair::<u32>();
        let (b, _) = pair::<u32>();
        assert_ne!(a.id(), b.id());
    }
}
