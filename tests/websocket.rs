//! Connection manager over real WebSocket links.
//!
//! Each test runs a local echo server that answers every text frame with
//! a bot message carrying the reversed text.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chat_channel::{
    ChannelMessage, ConnectionManager, ConnectionState, ManagerOptions, MessageId, Sender,
    Transport, WebSocketTransport,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

// ============================================================================
// Helpers
// ============================================================================

const WAIT: Duration = Duration::from_secs(5);

/// Starts a reversing bot server on a random local port.
async fn spawn_reverse_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(ws) = accept_async(stream).await else {
                    return;
                };
                let (mut write, mut read) = ws.split();
                let mut next_id = 1;

                while let Some(Ok(frame)) = read.next().await {
                    let Message::Text(text) = frame else {
                        continue;
                    };
                    let reversed: String = text.as_str().chars().rev().collect();
                    let reply = ChannelMessage::remote(MessageId::new(next_id), reversed);
                    next_id += 1;

                    let json = reply.to_json().expect("serialize");
                    if write.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

/// Returns an address nothing listens on.
async fn unused_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr")
}

/// Waits until `predicate` holds for the manager, or the timeout elapses.
async fn wait_until<T: Transport>(
    manager: &ConnectionManager<T>,
    predicate: impl Fn(&ConnectionManager<T>) -> bool,
) -> bool {
    let mut changes = manager.subscribe();
    let wait = async {
        while !predicate(manager) {
            if changes.changed().await.is_err() {
                return false;
            }
        }
        true
    };

    timeout(WAIT, wait).await.unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_send_and_receive_reply() {
    common::init_tracing();
    let addr = spawn_reverse_server().await;

    let manager = ConnectionManager::new(
        ManagerOptions::new(format!("ws://{addr}")),
        WebSocketTransport::new(),
    )
    .expect("manager");

    manager.connect();
    assert!(wait_until(&manager, |m| m.is_connected()).await);

    assert!(manager.send("  hello "));
    assert!(manager.is_loading());
    assert!(wait_until(&manager, |m| !m.is_loading()).await);

    let messages = manager.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text(), "hello");
    assert_eq!(messages[0].sender(), Sender::Local);
    assert_eq!(messages[1].text(), "olleh");
    assert_eq!(messages[1].sender(), Sender::Remote);
    assert_eq!(messages[1].id(), MessageId::new(1));
}

#[tokio::test]
async fn test_disconnect_closes_socket() {
    common::init_tracing();
    let addr = spawn_reverse_server().await;

    let manager = ConnectionManager::new(
        ManagerOptions::new(format!("ws://{addr}")),
        WebSocketTransport::new(),
    )
    .expect("manager");

    manager.connect();
    assert!(wait_until(&manager, |m| m.is_connected()).await);

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(!manager.send("after disconnect"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert_eq!(manager.pending_timer(), None);
}

#[tokio::test]
async fn test_refused_connection_is_abandoned() {
    common::init_tracing();
    let addr = unused_address().await;

    let errors = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&errors);
    let options = ManagerOptions::new(format!("ws://{addr}"))
        .with_max_retries(1)
        .with_retry_interval(Duration::from_millis(50))
        .on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let manager = ConnectionManager::new(options, WebSocketTransport::new()).expect("manager");
    manager.connect();

    assert!(wait_until(&manager, |m| m.state() == ConnectionState::Abandoned).await);
    assert_eq!(manager.retry_attempts(), 1);
    assert_eq!(manager.pending_timer(), None);
    assert_eq!(errors.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unsupported_scheme_stays_idle_without_retry() {
    common::init_tracing();

    let manager = ConnectionManager::new(
        ManagerOptions::new("http://localhost:8080"),
        WebSocketTransport::new(),
    )
    .expect("manager");

    manager.connect();

    assert_eq!(manager.state(), ConnectionState::Idle);
    assert_eq!(manager.retry_attempts(), 0);
    assert_eq!(manager.pending_timer(), None);
    assert!(!manager.is_connected());
}
