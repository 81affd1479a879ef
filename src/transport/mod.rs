//! Channel transport layer.
//!
//! The [`ConnectionManager`](crate::ConnectionManager) never talks to a
//! socket directly. It is handed a [`Transport`] at construction time and
//! asks it to open [`Link`]s. A link reports its lifecycle through the
//! [`EventSink`] it was opened with.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   open(address, sink)   ┌──────────────────┐
//! │ ConnectionManager│────────────────────────►│    Transport     │
//! │                  │                         └────────┬─────────┘
//! │                  │◄──── send / close ────┐          │ creates
//! │                  │                       │ ┌────────▼─────────┐
//! │  event queue     │◄── Opened / Message ──┴─│      Link        │
//! │                  │    Error / Closed       └──────────────────┘
//! └──────────────────┘
//! ```
//!
//! # Link Lifecycle
//!
//! 1. `Transport::open` - validate the address and start connecting
//! 2. `Opened` - the link can carry frames
//! 3. `Message` / `Error` - any number, in emission order
//! 4. `Closed` - emitted once; no further events follow
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | In-process transport for tests and demos |
//! | `websocket` | WebSocket client transport |

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport driven by the caller.
pub mod memory;

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryPeer, MemoryTransport, PeerState};
pub use websocket::WebSocketTransport;

// ============================================================================
// Types
// ============================================================================

/// Identifies one opened link within a manager.
pub type LinkId = u64;

/// Receiving half of the manager's event queue.
pub(crate) type EventReceiver = mpsc::UnboundedReceiver<(LinkId, TransportEvent)>;

// ============================================================================
// TransportEvent
// ============================================================================

/// Lifecycle notification emitted by a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The link is established.
    Opened,
    /// A raw inbound frame.
    Message(String),
    /// A transport-level error. Does not close the link by itself.
    Error(String),
    /// The link is gone.
    Closed,
}

// ============================================================================
// EventSink
// ============================================================================

/// Where a link delivers its [`TransportEvent`]s.
///
/// Events are tagged with the link id so the manager can ignore a link
/// it already released.
#[derive(Debug, Clone)]
pub struct EventSink {
    link_id: LinkId,
    tx: mpsc::UnboundedSender<(LinkId, TransportEvent)>,
}

impl EventSink {
    /// Creates a sink for `link_id`.
    pub(crate) fn new(
        link_id: LinkId,
        tx: mpsc::UnboundedSender<(LinkId, TransportEvent)>,
    ) -> Self {
        Self { link_id, tx }
    }

    /// Creates a sink together with the receiving end of its queue.
    #[must_use]
    pub fn channel(link_id: LinkId) -> (Self, mpsc::UnboundedReceiver<(LinkId, TransportEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(link_id, tx), rx)
    }

    /// Returns the id of the link this sink belongs to.
    #[inline]
    #[must_use]
    pub const fn link_id(&self) -> LinkId {
        self.link_id
    }

    /// Delivers an event. Returns `false` if the manager is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.link_id, event)).is_ok()
    }

    /// Reports that the link is established.
    #[inline]
    pub fn opened(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    /// Reports an inbound frame.
    #[inline]
    pub fn message(&self, raw: impl Into<String>) -> bool {
        self.emit(TransportEvent::Message(raw.into()))
    }

    /// Reports a transport error.
    #[inline]
    pub fn error(&self, info: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error(info.into()))
    }

    /// Reports that the link is gone.
    #[inline]
    pub fn closed(&self) -> bool {
        self.emit(TransportEvent::Closed)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Capability to open links to a channel address.
pub trait Transport: Send + Sync + 'static {
    /// Starts opening a link to `address`.
    ///
    /// Returns as soon as the link exists; the connection completes
    /// asynchronously and is reported through `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be constructed at all
    /// (e.g. a malformed address). No events are emitted in that case.
    fn open(&self, address: &str, events: EventSink) -> Result<Box<dyn Link>>;
}

/// An open (or opening) transport instance.
pub trait Link: Send + Sync {
    /// Sends one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the link can no longer carry frames.
    fn send(&self, text: &str) -> Result<()>;

    /// Closes the link. Safe to call more than once.
    fn close(&self);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_events_with_link_id() {
        let (sink, mut rx) = EventSink::channel(9);
        assert!(sink.opened());
        assert!(sink.message("{}"));
        assert!(sink.closed());

        assert_eq!(rx.try_recv().ok(), Some((9, TransportEvent::Opened)));
        assert_eq!(
            rx.try_recv().ok(),
            Some((9, TransportEvent::Message("{}".into())))
        );
        assert_eq!(rx.try_recv().ok(), Some((9, TransportEvent::Closed)));
    }

    #[test]
    fn test_sink_reports_dropped_receiver() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        assert!(!sink.error("boom"));
    }
}
