//! In-process transport driven by the caller.
//!
//! [`MemoryTransport`] never connects anywhere. Each `open` creates a
//! [`MemoryPeer`]: the remote end of that link, which the caller drives
//! to accept the connection, deliver frames, raise errors or drop it.
//!
//! # Example
//!
//! ```ignore
//! let transport = MemoryTransport::new();
//! let manager = ConnectionManager::new(options, transport.clone())?;
//! manager.connect();
//!
//! let peer = transport.last_peer().unwrap();
//! peer.accept();
//! peer.deliver(r#"{"id": 1, "text": "olleh", "sender": "bot"}"#);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::ChannelMessage;

use super::{EventSink, Link, Transport};

// ============================================================================
// PeerState
// ============================================================================

/// Ready state of a memory link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Opened, not yet accepted.
    Connecting,
    /// Accepted; frames flow.
    Open,
    /// Closed by either side.
    Closed,
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// Transport whose links live in memory.
///
/// Clones share the same list of peers.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<TransportState>>,
}

#[derive(Debug, Default)]
struct TransportState {
    peers: Vec<MemoryPeer>,
    fail_next_open: Option<String>,
}

impl MemoryTransport {
    /// Creates a transport with no peers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `open` fail with [`Error::Connection`].
    pub fn fail_next_open(&self, message: impl Into<String>) {
        self.inner.lock().fail_next_open = Some(message.into());
    }

    /// Number of links opened so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner.lock().peers.len()
    }

    /// Returns the peer of the `index`-th opened link.
    #[must_use]
    pub fn peer(&self, index: usize) -> Option<MemoryPeer> {
        self.inner.lock().peers.get(index).cloned()
    }

    /// Returns the peer of the most recently opened link.
    #[must_use]
    pub fn last_peer(&self) -> Option<MemoryPeer> {
        self.inner.lock().peers.last().cloned()
    }
}

impl Transport for MemoryTransport {
    fn open(&self, address: &str, events: EventSink) -> Result<Box<dyn Link>> {
        let mut state = self.inner.lock();

        if let Some(message) = state.fail_next_open.take() {
            return Err(Error::connection(message));
        }

        let peer = MemoryPeer {
            shared: Arc::new(PeerShared {
                address: address.to_owned(),
                events,
                state: Mutex::new(LinkState {
                    ready: PeerState::Connecting,
                    sent: Vec::new(),
                }),
            }),
        };
        state.peers.push(peer.clone());

        trace!(address, link = peer.shared.events.link_id(), "Memory link opened");

        Ok(Box::new(MemoryLink {
            shared: Arc::clone(&peer.shared),
        }))
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Remote end of a memory link.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    shared: Arc<PeerShared>,
}

#[derive(Debug)]
struct PeerShared {
    address: String,
    events: EventSink,
    state: Mutex<LinkState>,
}

#[derive(Debug)]
struct LinkState {
    ready: PeerState,
    sent: Vec<String>,
}

impl MemoryPeer {
    /// Address the link was opened with.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Current ready state.
    #[must_use]
    pub fn state(&self) -> PeerState {
        self.shared.state.lock().ready
    }

    /// Frames the manager sent over this link.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.shared.state.lock().sent.clone()
    }

    /// Completes the connection.
    pub fn accept(&self) {
        let mut state = self.shared.state.lock();
        if state.ready == PeerState::Connecting {
            state.ready = PeerState::Open;
            self.shared.events.opened();
        }
    }

    /// Delivers a raw inbound frame.
    pub fn deliver(&self, raw: impl Into<String>) {
        self.shared.events.message(raw);
    }

    /// Delivers a structured inbound frame.
    pub fn deliver_message(&self, message: &ChannelMessage) {
        if let Ok(json) = message.to_json() {
            self.deliver(json);
        }
    }

    /// Raises a transport error without closing.
    pub fn fail(&self, info: impl Into<String>) {
        self.shared.events.error(info);
    }

    /// Drops the connection from the remote side.
    pub fn drop_connection(&self) {
        let mut state = self.shared.state.lock();
        if state.ready != PeerState::Closed {
            state.ready = PeerState::Closed;
            self.shared.events.closed();
        }
    }
}

// ============================================================================
// MemoryLink
// ============================================================================

/// Local end of a memory link, handed to the manager.
struct MemoryLink {
    shared: Arc<PeerShared>,
}

impl Link for MemoryLink {
    fn send(&self, text: &str) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.ready != PeerState::Open {
            return Err(Error::ConnectionClosed);
        }
        state.sent.push(text.to_owned());
        Ok(())
    }

    fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.ready != PeerState::Closed {
            state.ready = PeerState::Closed;
            self.shared.events.closed();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
