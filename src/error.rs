//! Error types for the chat channel client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Constructors and transports return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use chat_channel::{ConnectionManager, ManagerOptions, Result, WebSocketTransport};
//!
//! fn example() -> Result<()> {
//!     let options = ManagerOptions::new("ws://localhost:8080");
//!     let manager = ConnectionManager::new(options, WebSocketTransport::new())?;
//!     manager.connect();
//!     Ok(())
//! }
//! ```
//!
//! The [`ConnectionManager`](crate::ConnectionManager) itself never returns
//! errors from its operations. Failures there surface as `false` returns or
//! as observable state.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidAddress`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::WebSocket`] |
//! | Protocol | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when manager options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Channel address cannot be used by the transport.
    #[error("Invalid channel address '{address}': {message}")]
    InvalidAddress {
        /// The rejected address.
        address: String,
        /// Why it was rejected.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport could not be created or used.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The link is closed and cannot carry frames.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON error. Inbound frames that do not follow the wire format.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket handshake or socket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if an inbound frame was rejected.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Returns `true` if the error comes from bad configuration.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidAddress { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_invalid_address_display() {
        let err = Error::invalid_address("http://x", "unsupported scheme 'http'");
        assert_eq!(
            err.to_string(),
            "Invalid channel address 'http://x': unsupported scheme 'http'"
        );
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_from_websocket_error() {
        let err: Error = WsError::ConnectionClosed.into();
        assert!(matches!(err, Error::WebSocket(_)));
        assert!(err.is_connection_error());
        assert!(err.to_string().starts_with("WebSocket error:"));
    }

    #[test]
    fn test_is_config_error() {
        assert!(Error::config("missing").is_config_error());
        assert!(Error::invalid_address("", "empty").is_config_error());
        assert!(!Error::ConnectionClosed.is_config_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.is_protocol_error());
    }
}
