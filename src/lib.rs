//! Chat Channel - Reconnecting single-channel chat client.
//!
//! This library manages one persistent bidirectional message channel from
//! the client side: it opens the channel, tracks its lifecycle, parses
//! inbound messages, gates the UI while a response is outstanding, and
//! reconnects after unexpected loss within a bounded retry budget.
//!
//! # Architecture
//!
//! - **Manager (Rust)**: Owns the state machine, link, timers and messages
//! - **Transport**: Injected capability that opens links (WebSocket, memory)
//! - **Presentation layer**: Reads [`Snapshot`]s, calls `send` / `reconnect`
//!
//! Key design principles:
//!
//! - All lifecycle logic is one pure transition function ([`Machine::apply`])
//! - Exactly one link and at most one timer per manager
//! - Outbound frames are plain text, inbound frames are JSON messages
//! - Operations never fail loudly; failures are booleans or observable state
//!
//! # Quick Start
//!
//! ```no_run
//! use chat_channel::{ConnectionManager, ManagerOptions, Result, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let options = ManagerOptions::new("ws://localhost:8080");
//!     let manager = ConnectionManager::new(options, WebSocketTransport::new())?;
//!     manager.connect();
//!
//!     let mut changes = manager.subscribe();
//!     while !manager.is_connected() {
//!         let _ = changes.changed().await;
//!     }
//!
//!     manager.send("hello");
//!     while manager.is_loading() {
//!         let _ = changes.changed().await;
//!     }
//!
//!     for message in manager.messages() {
//!         println!("{}: {}", message.sender(), message.text());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`manager`] | [`ConnectionManager`], options and state machine |
//! | [`protocol`] | [`ChannelMessage`] wire format |
//! | [`transport`] | [`Transport`] trait, WebSocket and memory transports |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Connection manager, configuration and state machine.
///
/// - [`ConnectionManager`] - Runtime owning link, timers and messages
/// - [`ManagerOptions`] - Address, retry policy and hooks
/// - [`Machine`] - Pure transition function
pub mod manager;

/// Channel wire protocol.
pub mod protocol;

/// Channel transport layer.
///
/// Defines the [`Transport`] capability and ships a WebSocket client
/// and an in-memory implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Manager types
pub use manager::{
    ConnectionManager, ConnectionState, IllegalTransition, Machine, ManagerOptions, RetryBudget,
    Snapshot, TimerKind,
};

// Protocol types
pub use protocol::{ChannelMessage, Sender};

// Transport types
pub use transport::{
    EventSink, Link, MemoryPeer, MemoryTransport, PeerState, Transport, TransportEvent,
    WebSocketTransport,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::MessageId;
