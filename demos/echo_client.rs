//! Echo client demonstration.
//!
//! Demonstrates:
//! - Handshake headers
//! - Connect and wait for the open notification
//! - Send messages and print the replies
//! - Clean disconnect
//!
//! Usage:
//!   cargo run --example echo_client -- ws://127.0.0.1:9001
//!   cargo run --example echo_client -- ws://127.0.0.1:9001 --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::{Context, bail};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

use ws_connector::{ConnectionManager, HeaderConfig, Notification};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_URL: &str = "ws://127.0.0.1:9001";
const MESSAGES: [&str; 3] = ["hello", "from", "ws-connector"];
const WAIT: Duration = Duration::from_secs(10);

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    url: String,
    debug: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self {
            url: args
                .iter()
                .find(|a| !a.starts_with("--"))
                .cloned()
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            debug: args.iter().any(|a| a == "--debug"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "ws_connector=trace"
    } else {
        "ws_connector=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== Echo client ===\n");

    // ========================================================================
    // Setup
    // ========================================================================

    let (events, mut rx) = mpsc::unbounded_channel();
    let headers = HeaderConfig::new()
        .with("Authorization", "Bearer demo-token")?
        .with("X-Client", "ws-connector-demo")?;

    let manager = ConnectionManager::builder()
        .websocket()
        .observer(events)
        .headers(headers)
        .build()?;

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[Connect] {}", args.url);
    manager.connect(&args.url)?;

    match next(&mut rx).await? {
        Notification::Connected(descriptor) => println!("[Connect] {descriptor}"),
        Notification::ErrorOccurred(message) => bail!("connection failed: {message}"),
        other => bail!("unexpected notification: {}", other.name()),
    }

    // ========================================================================
    // Echo
    // ========================================================================

    for message in MESSAGES {
        manager.send(message)?;
        println!("[Send] -> {message}");

        match next(&mut rx).await? {
            Notification::MessageReceived(reply) => println!("[Recv] <- {reply}"),
            Notification::Disconnected(reason) => bail!("server closed: {reason}"),
            other => println!("[Event] {}", serde_json::to_string(&other)?),
        }
    }

    // ========================================================================
    // Disconnect
    // ========================================================================

    manager.disconnect()?;
    if let Notification::Disconnected(reason) = next(&mut rx).await? {
        println!("[Disconnect] {reason}");
    }

    println!("\n=== Done ===");
    Ok(())
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Notification>) -> anyhow::Result<Notification> {
    timeout(WAIT, rx.recv())
        .await
        .context("timed out waiting for the server")?
        .context("manager stopped")
}
