//! End-to-end tests of a connection against a loopback agent.
//!
//! Each test plays the agent side with a raw `TcpStream` and drives the
//! engine side through the public `Connection` API.

mod common;

use std::time::Duration;

use agentwire::{CommError, Connection, EngineConfig, Received, encode_message};
use common::{fast_config, spawn_agent};
use rstest::rstest;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn connect(addr: std::net::SocketAddr, config: &EngineConfig) -> Connection {
    Connection::connect_with("127.0.0.1", &addr.port().to_string(), config)
        .await
        .expect("connect to loopback agent")
}

#[rstest]
#[tokio::test]
async fn reply_with_attachment_is_received_whole(fast_config: EngineConfig) {
    let (addr, accept) = spawn_agent().await;
    let mut conn = connect(addr, &fast_config).await;
    let mut agent = accept.await.expect("join accept task");

    agent
        .write_all(b"cmd attach 5\0HELLO")
        .await
        .expect("agent write");
    let mut buf = vec![0u8; 4096];
    let received = conn.receive(&mut buf).await.expect("receive");

    assert_eq!(
        received,
        Received::Complete {
            len: 18,
            attachment: Some(13)
        }
    );
    assert_eq!(&buf[..4], b"cmd\0");
    assert_eq!(&buf[13..18], b"HELLO");
    assert_eq!(conn.pending_attachment_bytes(), 0);
    conn.close().expect("close");
}

#[rstest]
#[tokio::test]
async fn large_attachment_is_drained_in_chunks(fast_config: EngineConfig) {
    let (addr, accept) = spawn_agent().await;
    let mut conn = connect(addr, &fast_config).await;
    let mut agent = accept.await.expect("join accept task");

    let payload: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();
    let wire =
        encode_message("file /var/log/agent.log", Some(payload.as_slice())).expect("encode");
    let header_len = wire.len() - payload.len();
    let writer = tokio::spawn(async move {
        agent.write_all(&wire).await.expect("agent write");
        agent
    });

    let mut buf = vec![0u8; 4096];
    let first = conn.receive(&mut buf).await.expect("header");
    assert_eq!(
        first,
        Received::AttachmentPending {
            total: header_len + payload.len(),
            attachment: header_len
        }
    );
    let mut collected = buf[header_len..].to_vec();
    while conn.pending_attachment_bytes() > 0 {
        let owed = conn.pending_attachment_bytes();
        match conn.receive(&mut buf).await.expect("chunk") {
            Received::AttachmentPending { total, attachment } => {
                assert_eq!((total, attachment), (owed, 0));
                collected.extend_from_slice(&buf);
            }
            Received::Complete { len, attachment } => {
                assert_eq!((len, attachment), (owed, Some(0)));
                collected.extend_from_slice(&buf[..len]);
            }
            Received::BufferTooSmall => panic!("continuation never reports a short buffer"),
        }
    }

    assert_eq!(collected, payload);
    let _agent = writer.await.expect("join writer");
    conn.close().expect("close");
}

#[rstest]
#[tokio::test]
async fn header_larger_than_buffer_is_too_small(fast_config: EngineConfig) {
    let (addr, accept) = spawn_agent().await;
    let mut conn = connect(addr, &fast_config).await;
    let mut agent = accept.await.expect("join accept task");

    let mut header = vec![b'x'; 200];
    header.push(0);
    agent.write_all(&header).await.expect("agent write");

    let mut buf = [0u8; 64];
    let received = conn.receive(&mut buf).await.expect("receive");

    assert_eq!(received, Received::BufferTooSmall);
    assert_eq!(conn.pending_attachment_bytes(), 0);
}

#[rstest]
#[tokio::test]
async fn agent_closing_mid_attachment_is_peer_closed(fast_config: EngineConfig) {
    let (addr, accept) = spawn_agent().await;
    let mut conn = connect(addr, &fast_config).await;
    let mut agent = accept.await.expect("join accept task");

    agent
        .write_all(b"cmd attach 10\0short")
        .await
        .expect("agent write");
    drop(agent);

    let mut buf = [0u8; 64];
    let err = conn.receive(&mut buf).await.expect_err("agent hung up");

    assert!(matches!(err, CommError::PeerClosed), "got {err:?}");
    assert_eq!(err.raw_os_error(), Some(libc::EPIPE));
}

#[rstest]
#[tokio::test]
async fn commands_reach_the_agent_unchanged(fast_config: EngineConfig) {
    let (addr, accept) = spawn_agent().await;
    let mut conn = connect(addr, &fast_config).await;
    let mut agent = accept.await.expect("join accept task");

    let wire = encode_message("put /tmp/blob", Some(&b"\0\n\r binary"[..])).expect("encode");
    conn.send(&wire).await.expect("send");
    conn.close().expect("close");

    let mut seen = Vec::new();
    agent.read_to_end(&mut seen).await.expect("agent read");
    assert_eq!(seen, b"put /tmp/blob attach 10\0\0\n\r binary");
}

#[rstest]
#[tokio::test]
async fn readiness_tracks_queued_data(fast_config: EngineConfig) {
    let (addr, accept) = spawn_agent().await;
    let conn = connect(addr, &fast_config).await;
    let mut agent = accept.await.expect("join accept task");

    assert!(!conn.is_ready(), "nothing sent yet");

    agent.write_all(b"ping\0").await.expect("agent write");
    let mut ready = false;
    for _ in 0..100 {
        if conn.is_ready() {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(ready, "queued bytes should make the connection ready");
}

#[rstest]
#[tokio::test]
async fn socket_options_are_applied_on_connect(fast_config: EngineConfig) {
    let (addr, accept) = spawn_agent().await;
    let conn = connect(addr, &fast_config).await;
    let _agent = accept.await.expect("join accept task");

    let sock = socket2::SockRef::from(conn.get_ref());
    assert!(sock.nodelay().expect("query TCP_NODELAY"));
    assert!(sock.keepalive().expect("query SO_KEEPALIVE"));
    assert_eq!(conn.peer_addr().expect("peer addr"), addr);
}
