//! WebSocket client transport.
//!
//! Each link spawns a tokio task that connects to the address and then
//! runs the event loop:
//!
//! - Incoming text frames are reported as `Message`
//! - Outgoing frames come from the link handle over a command channel
//! - Socket errors are reported as `Error`, followed by `Closed`
//!
//! A failed connect is reported as `Error` then `Closed`, the same sequence
//! a browser WebSocket produces, so the manager's retry policy applies.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{EventSink, Link, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for the WebSocket handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Opens WebSocket client links with `tokio-tungstenite`.
///
/// Links must be opened from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl WebSocketTransport {
    /// Creates a transport with the default connect timeout (30s).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns the handshake timeout.
    #[inline]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, address: &str, events: EventSink) -> Result<Box<dyn Link>> {
        let url = parse_address(address)?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::connection(format!("no tokio runtime available: {e}")))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_link(url, self.connect_timeout, command_rx, events));

        Ok(Box::new(WebSocketLink { command_tx }))
    }
}

/// Validates a channel address.
fn parse_address(address: &str) -> Result<Url> {
    let url = Url::parse(address).map_err(|e| Error::invalid_address(address, e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(Error::invalid_address(
            address,
            format!("unsupported scheme '{other}', expected ws or wss"),
        )),
    }
}

// ============================================================================
// WebSocketLink
// ============================================================================

/// Commands from the link handle to its task.
enum LinkCommand {
    /// Send a text frame.
    Send(String),
    /// Close the socket.
    Close,
}

/// Handle to a running WebSocket link task.
///
/// Dropping the handle closes the socket.
struct WebSocketLink {
    command_tx: mpsc::UnboundedSender<LinkCommand>,
}

impl Link for WebSocketLink {
    fn send(&self, text: &str) -> Result<()> {
        self.command_tx
            .send(LinkCommand::Send(text.to_owned()))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let _ = self.command_tx.send(LinkCommand::Close);
    }
}

// ============================================================================
// Link Task
// ============================================================================

/// Connects and runs the event loop until either side closes.
async fn run_link(
    url: Url,
    connect_timeout: Duration,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    events: EventSink,
) {
    let link = events.link_id();
    let connect = timeout(connect_timeout, connect_async(url.as_str()));
    tokio::pin!(connect);

    // Handshake, unless the handle closes first
    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(Ok((stream, _response))) => break stream,
                Ok(Err(e)) => {
                    let e = Error::from(e);
                    error!(link, url = %url, error = %e, "WebSocket connect failed");
                    events.error(e.to_string());
                    events.closed();
                    return;
                }
                Err(_) => {
                    let timeout_ms = connect_timeout.as_millis() as u64;
                    error!(link, url = %url, timeout_ms, "WebSocket connect timed out");
                    events.error(format!("connect timed out after {timeout_ms}ms"));
                    events.closed();
                    return;
                }
            },

            command = command_rx.recv() => match command {
                Some(LinkCommand::Send(_)) => {
                    warn!(link, "Dropping frame sent before the link opened");
                }
                Some(LinkCommand::Close) | None => {
                    debug!(link, "Link closed while connecting");
                    events.closed();
                    return;
                }
            },
        }
    };

    info!(link, url = %url, "WebSocket connection established");
    events.opened();

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the peer
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(link, len = text.len(), "Frame received");
                        events.message(text.as_str());
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(link, ?frame, "WebSocket closed by remote");
                        break;
                    }

                    Some(Err(e)) => {
                        let e = Error::from(e);
                        error!(link, error = %e, "WebSocket error");
                        events.error(e.to_string());
                        break;
                    }

                    None => {
                        debug!(link, "WebSocket stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            // Commands from the link handle
            command = command_rx.recv() => {
                match command {
                    Some(LinkCommand::Send(text)) => {
                        let sent = ws_write.send(Message::Text(text.into())).await;
                        if let Err(e) = sent.map_err(Error::from) {
                            warn!(link, error = %e, "Failed to send frame");
                            events.error(e.to_string());
                        } else {
                            trace!(link, "Frame sent");
                        }
                    }

                    Some(LinkCommand::Close) | None => {
                        debug!(link, "Closing WebSocket");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    events.closed();
    debug!(link, "Link task terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::TransportEvent;

    #[test]
    fn test_default_connect_timeout() {
        assert_eq!(DEFAULT_CONNECT_TIMEOUT.as_secs(), 30);
        assert_eq!(WebSocketTransport::new().connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_with_connect_timeout() {
        let transport = WebSocketTransport::new().with_connect_timeout(Duration::from_secs(2));
        assert_eq!(transport.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_parse_address_accepts_ws_schemes() {
        assert!(parse_address("ws://localhost:8080").is_ok());
        assert!(parse_address("wss://chat.example.com/socket").is_ok());
    }

    #[test]
    fn test_parse_address_rejects_other_schemes() {
        let err = parse_address("http://localhost:8080").unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!(parse_address("not a url").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_open_outside_runtime_fails() {
        let (sink, _rx) = EventSink::channel(1);
        let result = WebSocketTransport::new().open("ws://localhost:1", sink);
        assert!(matches!(result, Err(Error::Connection { .. })));
    }

    #[tokio::test]
    async fn test_refused_connect_reports_error_then_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let (sink, mut rx) = EventSink::channel(3);
        let _link = WebSocketTransport::new()
            .open(&format!("ws://{addr}"), sink)
            .expect("open");

        let (link, event) = rx.recv().await.expect("error event");
        assert_eq!(link, 3);
        match event {
            TransportEvent::Error(info) => assert!(info.starts_with("WebSocket error:")),
            other => panic!("expected error event, got {other:?}"),
        }
        assert_eq!(rx.recv().await, Some((3, TransportEvent::Closed)));
    }

    #[tokio::test]
    async fn test_open_invalid_address_emits_nothing() {
        let (sink, mut rx) = EventSink::channel(1);
        let result = WebSocketTransport::new().open("ftp://localhost", sink);
        assert!(result.is_err());
        assert!(rx.try_recv().is_err());
    }
}
