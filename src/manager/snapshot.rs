//! Read-only view of the manager for the presentation layer.

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::ChannelMessage;

use super::state::ConnectionState;

// ============================================================================
// Snapshot
// ============================================================================

/// Observable state of a [`ConnectionManager`](crate::ConnectionManager),
/// taken at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Messages of the session, oldest first.
    pub messages: Vec<ChannelMessage>,
    /// Connection state.
    pub state: ConnectionState,
    /// `true` when messages can be sent.
    pub is_connected: bool,
    /// `true` while a sent message awaits its response.
    pub is_loading: bool,
    /// Automatic reconnection attempts since the last successful open.
    pub retry_attempts: u32,
}

impl Snapshot {
    /// Returns `true` if nothing has been exchanged yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message, if any.
    #[inline]
    #[must_use]
    pub fn last_message(&self) -> Option<&ChannelMessage> {
        self.messages.last()
    }
}
