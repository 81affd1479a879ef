//! Interactive chat over a reconnecting channel.
//!
//! Demonstrates:
//! - Creating a ConnectionManager with a WebSocket transport
//! - Watching state changes through `subscribe`
//! - Sending messages and waiting for replies
//! - Explicit reconnect after the retry budget is spent
//!
//! Commands: `/clear`, `/reconnect`, `/quit`. Anything else is sent.
//!
//! Usage:
//!   cargo run --example chat -- --serve
//!   cargo run --example chat -- --address ws://localhost:8080
//!   cargo run --example chat -- --serve --debug

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::time::Duration;

use chat_channel::{
    ChannelMessage, ConnectionManager, ConnectionState, ManagerOptions, MessageId, Snapshot,
    WebSocketTransport,
};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_ADDRESS: &str = "ws://127.0.0.1:8080";

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    address: String,
    serve: bool,
    debug: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let address = args
            .iter()
            .position(|a| a == "--address")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_owned());

        Self {
            address,
            serve: args.iter().any(|a| a == "--serve"),
            debug: args.iter().any(|a| a == "--debug"),
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== Chat Channel ===\n");

    let address = if args.serve {
        let addr = serve_reverse_bot().await?;
        println!("[Setup] Reverse bot listening on {addr}");
        format!("ws://{addr}")
    } else {
        args.address
    };

    let options = ManagerOptions::new(address)
        .with_retry_interval(Duration::from_secs(1))
        .on_open(|| println!("        [channel open]"))
        .on_close(|| println!("        [channel closed]"))
        .on_error(|info| println!("        [channel error] {info}"));

    let manager = ConnectionManager::new(options, WebSocketTransport::new())?;
    manager.connect();
    println!("[Setup] Connecting to {}\n", manager.options().address());

    let mut changes = manager.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = 0;
    let mut last_state = None;

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = manager.snapshot();
                shown = render(&snapshot, shown, &mut last_state);
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                match line.trim() {
                    "/quit" => break,
                    "/clear" => {
                        manager.clear_messages();
                        shown = 0;
                    }
                    "/reconnect" => manager.reconnect(),
                    text if !manager.send(text) && !text.is_empty() => {
                        println!("        (not sent, channel is {})", manager.state());
                    }
                    _ => {}
                }
            }
        }
    }

    manager.disconnect();
    println!("\n=== Done ===");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "chat_channel=debug"
    } else {
        "chat_channel=warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Prints messages not shown yet and state changes. Returns the new count.
fn render(
    snapshot: &Snapshot,
    shown: usize,
    last_state: &mut Option<ConnectionState>,
) -> usize {
    if *last_state != Some(snapshot.state) {
        println!(
            "[State] {} (retries: {})",
            snapshot.state, snapshot.retry_attempts
        );
        *last_state = Some(snapshot.state);
    }

    for message in snapshot.messages.iter().skip(shown) {
        println!("  {:>4}: {}", message.sender().as_str(), message.text());
    }

    if snapshot.is_loading {
        println!("        ...");
    }

    snapshot.messages.len()
}

/// Runs a bot that answers every frame with the reversed text.
async fn serve_reverse_bot() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(ws) = accept_async(stream).await else {
                    return;
                };
                let (mut write, mut read) = ws.split();

                while let Some(Ok(Message::Text(text))) = read.next().await {
                    let reversed: String = text.as_str().chars().rev().collect();
                    let reply = ChannelMessage::remote(MessageId::next(), reversed);
                    let Ok(json) = reply.to_json() else {
                        continue;
                    };
                    if write.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    Ok(addr)
}
