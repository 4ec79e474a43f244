//! Server connection lifecycle: serial serving, forced disconnects, idle
//! clients, misbehaving clients and shutdown.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use interprocess::local_socket::tokio::{prelude::*, Stream};
use tokio_util::codec::Framed;

use debug_pipe::ipc::client::call_pipe;
use debug_pipe::ipc::codec::MessageCodec;
use debug_pipe::ipc::server::{DebugServer, ServeSummary};
use debug_pipe::ipc::{PipeName, ACK_BODY, MAX_MESSAGE_BYTES};

use super::test_helpers::{test_config, RunningServer, STEP};

/// Connect without going through `call_pipe`, so a test controls timing.
async fn raw_connect(pipe: &PipeName, max_bytes: usize) -> Framed<Stream, MessageCodec> {
    let stream = tokio::time::timeout(STEP, Stream::connect(pipe.to_name().expect("name")))
        .await
        .expect("connect in time")
        .expect("server is listening");
    Framed::new(stream, MessageCodec::new(max_bytes))
}

/// True once the server has closed its end of `framed`.
async fn closed_by_server(framed: &mut Framed<Stream, MessageCodec>) -> bool {
    match tokio::time::timeout(STEP, framed.next()).await {
        Ok(None | Some(Err(_))) => true,
        Ok(Some(Ok(_))) | Err(_) => false,
    }
}

#[tokio::test]
async fn second_client_waits_while_first_is_served() {
    let mut server = RunningServer::start(test_config());
    let pipe = server.pipe();

    // First client connects and holds the server in its read.
    let mut first = raw_connect(&pipe, MAX_MESSAGE_BYTES).await;

    let second_pipe = pipe.clone();
    let options = server.options();
    let second = tokio::spawn(async move {
        call_pipe(&second_pipe, Bytes::from_static(b"second"), &options).await
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        !second.is_finished(),
        "second client must block while the first is being served"
    );

    first
        .send(Bytes::from_static(b"first"))
        .await
        .expect("first client sends");
    let ack = tokio::time::timeout(STEP, first.next())
        .await
        .expect("ack in time");
    assert!(matches!(ack, Some(Ok(ref body)) if body.as_ref() == ACK_BODY));

    let outcome = tokio::time::timeout(STEP, second)
        .await
        .expect("second client finished in time")
        .expect("second task joined")
        .expect("second call succeeded, not an error");
    assert_eq!(outcome.reply.as_deref(), Some(ACK_BODY));

    assert_eq!(server.next_line().await, "first");
    assert_eq!(server.next_line().await, "second");
}

#[tokio::test]
async fn client_hanging_up_before_ack_does_not_stop_server() {
    let mut server = RunningServer::start(test_config());
    let pipe = server.pipe();

    let mut impatient = raw_connect(&pipe, MAX_MESSAGE_BYTES).await;
    impatient
        .send(Bytes::from_static(b"fire and forget"))
        .await
        .expect("send");
    drop(impatient);

    assert_eq!(server.next_line().await, "fire and forget");

    tokio::time::timeout(
        STEP,
        call_pipe(&pipe, Bytes::from_static(b"still serving"), &server.options()),
    )
    .await
    .expect("call finished in time")
    .expect("call succeeds");
    assert_eq!(server.next_line().await, "still serving");

    let summary = server.stop().await;
    assert_eq!(summary.messages, 2);
    assert_eq!(summary.dropped, 0);
}

#[tokio::test]
async fn idle_client_is_dropped_after_timeout() {
    let mut config = test_config();
    config.idle_timeout_ms = 100;
    let mut server = RunningServer::start(config);
    let pipe = server.pipe();

    let mut silent = raw_connect(&pipe, MAX_MESSAGE_BYTES).await;
    assert!(
        closed_by_server(&mut silent).await,
        "server must disconnect a silent client"
    );

    tokio::time::timeout(
        STEP,
        call_pipe(&pipe, Bytes::from_static(b"after idle"), &server.options()),
    )
    .await
    .expect("call finished in time")
    .expect("call succeeds");
    assert_eq!(server.next_line().await, "after idle");

    let summary = server.stop().await;
    assert_eq!(
        summary,
        ServeSummary {
            connections: 2,
            messages: 1,
            dropped: 1,
        }
    );
}

#[tokio::test]
async fn oversize_frame_from_foreign_client_drops_connection() {
    let mut server = RunningServer::start(test_config());
    let pipe = server.pipe();

    // A client with a looser codec than the server's.
    let mut foreign = raw_connect(&pipe, MAX_MESSAGE_BYTES * 2).await;
    foreign
        .send(Bytes::from(vec![b'z'; MAX_MESSAGE_BYTES + 1]))
        .await
        .expect("foreign client sends");
    assert!(closed_by_server(&mut foreign).await);

    tokio::time::timeout(
        STEP,
        call_pipe(&pipe, Bytes::from_static(b"next"), &server.options()),
    )
    .await
    .expect("call finished in time")
    .expect("call succeeds");
    assert_eq!(server.next_line().await, "next");

    let summary = server.stop().await;
    assert_eq!(summary.messages, 1);
    assert_eq!(summary.dropped, 1);
}

#[tokio::test]
async fn client_disconnecting_without_sending_is_dropped() {
    let mut server = RunningServer::start(test_config());
    let pipe = server.pipe();

    drop(raw_connect(&pipe, MAX_MESSAGE_BYTES).await);

    tokio::time::timeout(
        STEP,
        call_pipe(&pipe, Bytes::from_static(b"after hang-up"), &server.options()),
    )
    .await
    .expect("call finished in time")
    .expect("call succeeds");
    assert_eq!(server.next_line().await, "after hang-up");

    let summary = server.stop().await;
    assert_eq!(summary.connections, 2);
    assert_eq!(summary.dropped, 1);
}

#[tokio::test]
async fn cancel_with_no_clients_returns_empty_summary() {
    let server = RunningServer::start(test_config());
    assert_eq!(server.stop().await, ServeSummary::default());
}

#[cfg(unix)]
#[tokio::test]
async fn second_server_on_same_name_fails_to_bind() {
    let config = test_config();
    let _first = DebugServer::bind(&config).expect("first bind");

    let second = DebugServer::bind(&config);
    assert!(
        matches!(second, Err(debug_pipe::AppError::Ipc(_))),
        "channel creation failure must surface as an ipc error"
    );
}
