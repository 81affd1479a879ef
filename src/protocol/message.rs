//! Channel message type.
//!
//! # Format
//!
//! Inbound frames from the remote peer are JSON objects:
//!
//! ```json
//! {
//!   "id": 1718000000000,
//!   "text": "olleh",
//!   "sender": "bot"
//! }
//! ```
//!
//! Outbound frames are the plain trimmed text, not JSON.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{from_str, to_string};

use crate::error::Result;
use crate::identifiers::MessageId;

// ============================================================================
// Sender
// ============================================================================

/// Origin of a [`ChannelMessage`].
///
/// The remote peer names these `"user"` and `"bot"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    /// Typed locally and sent to the peer.
    #[serde(rename = "user")]
    Local,

    /// Produced by the remote peer.
    #[serde(rename = "bot")]
    Remote,
}

impl Sender {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "user",
            Self::Remote => "bot",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ChannelMessage
// ============================================================================

/// A discrete unit exchanged over the channel.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    id: MessageId,
    text: String,
    sender: Sender,
}

impl ChannelMessage {
    /// Creates a locally originated message from user input.
    ///
    /// The text is trimmed. Returns `None` if nothing is left.
    #[must_use]
    pub fn local(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            id: MessageId::next(),
            text: text.to_owned(),
            sender: Sender::Local,
        })
    }

    /// Creates a remote message. The text is kept as is.
    #[inline]
    #[must_use]
    pub fn remote(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            sender: Sender::Remote,
        }
    }

    /// Parses an inbound frame.
    ///
    /// # Errors
    ///
    /// [`Error::Json`](crate::Error::Json) if the payload is not a message object.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(from_str(raw)?)
    }

    /// Serializes to the wire format.
    ///
    /// # Errors
    ///
    /// [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(to_string(self)?)
    }

    /// Returns the id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the text.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns who produced the message.
    #[inline]
    #[must_use]
    pub const fn sender(&self) -> Sender {
        self.sender
    }

    /// Returns `true` if the message was typed locally.
    #[inline]
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self.sender, Sender::Local)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_trims_text() {
        let message = ChannelMessage::local("  hello world \n").expect("non-empty");
        assert_eq!(message.text(), "hello world");
        assert_eq!(message.sender(), Sender::Local);
        assert!(message.is_local());
    }

    #[test]
    fn test_local_rejects_blank_text() {
        assert!(ChannelMessage::local("").is_none());
        assert!(ChannelMessage::local("   \t\n").is_none());
    }

    #[test]
    fn test_local_ids_increase() {
        let first = ChannelMessage::local("a").expect("non-empty");
        let second = ChannelMessage::local("b").expect("non-empty");
        assert!(first.id() < second.id());
    }

    #[test]
    fn test_parse_bot_frame() {
        let message = ChannelMessage::from_json(r#"{"id": 17, "text": " olleh ", "sender": "bot"}"#)
            .expect("valid frame");
        assert_eq!(message.id(), MessageId::new(17));
        assert_eq!(message.text(), " olleh ");
        assert_eq!(message.sender(), Sender::Remote);
    }

    #[test]
    fn test_parse_user_frame_maps_to_local() {
        let message =
            ChannelMessage::from_json(r#"{"id": 1, "text": "echo", "sender": "user"}"#)
                .expect("valid frame");
        assert_eq!(message.sender(), Sender::Local);
    }

    #[test]
    fn test_parse_rejects_malformed_frames() {
        for raw in [
            "not json",
            "{}",
            r#"{"id": 1, "text": "x"}"#,
            r#"{"id": 1, "text": "x", "sender": "robot"}"#,
            r#"{"id": "one", "text": "x", "sender": "bot"}"#,
            r#"{"id": 1, "text": 5, "sender": "bot"}"#,
        ] {
            let err = ChannelMessage::from_json(raw).unwrap_err();
            assert!(err.is_protocol_error(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_to_json_uses_wire_vocabulary() {
        let message = ChannelMessage::remote(MessageId::new(3), "hi");
        let json = message.to_json().expect("serialize");
        assert_eq!(json, r#"{"id":3,"text":"hi","sender":"bot"}"#);
    }
}
