//! Shared helpers for integration tests.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use chat_channel::{ConnectionManager, ManagerOptions, MemoryPeer, MemoryTransport};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Memory Transport Helpers
// ============================================================================

/// Lets the dispatcher and timer tasks run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advances the paused clock, then lets woken tasks run.
///
/// Settles first so timers spawned just before arm their deadline.
pub async fn advance(duration: Duration) {
    settle().await;
    tokio::time::advance(duration).await;
    settle().await;
}

/// Options pointing at the memory transport.
pub fn options(max_retries: u32, retry_interval: Duration) -> ManagerOptions {
    ManagerOptions::new("ws://memory.test")
        .with_max_retries(max_retries)
        .with_retry_interval(retry_interval)
}

/// Creates a manager and connects it, without accepting the link.
pub fn connecting(
    options: ManagerOptions,
) -> (ConnectionManager<MemoryTransport>, MemoryTransport, MemoryPeer) {
    init_tracing();

    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(options, transport.clone()).expect("valid options");
    manager.connect();

    let peer = transport.last_peer().expect("link opened");
    (manager, transport, peer)
}

/// Creates a manager whose link is open.
pub async fn open(
    options: ManagerOptions,
) -> (ConnectionManager<MemoryTransport>, MemoryTransport, MemoryPeer) {
    let (manager, transport, peer) = connecting(options);
    peer.accept();
    settle().await;
    assert!(manager.is_connected(), "link should be open");
    (manager, transport, peer)
}

/// A bot frame as the remote peer sends it.
pub fn bot_frame(id: u64, text: &str) -> String {
    serde_json::json!({ "id": id, "text": text, "sender": "bot" }).to_string()
}
