//! Echo session over the native transport.
//!
//! Demonstrates:
//! - Building a manager with the tokio-tungstenite transport
//! - Registering listeners before the transport starts
//! - Sending from inside a listener
//! - Clean close and the final close event
//!
//! Usage:
//!   cargo run --example 001_echo
//!   cargo run --example 001_echo -- --debug
//!   cargo run --example 001_echo -- wss://echo.example.com/

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::Args;
use wsbridge::{ConnectionManager, Event, EventKind, Payload};

// ============================================================================
// Constants
// ============================================================================

const MESSAGES: &[&str] = &["hello", "from", "wsbridge"];

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== 001: Echo ===\n");

    // ========================================================================
    // Resolve Target
    // ========================================================================

    let url = match args.url {
        Some(url) => url,
        None => {
            println!("[Setup] Starting local echo server...");
            let addr = common::spawn_echo_server().await?;
            println!("        ✓ Listening on {addr}\n");
            format!("ws://{addr}/")
        }
    };

    // ========================================================================
    // Open Connection
    // ========================================================================

    println!("[1] Opening {url}...");

    let manager = ConnectionManager::builder()
        .native_with_timeout(Duration::from_secs(5))
        .build()?;
    let mut events = None;
    let connection = manager.open_with(&url, |connection| {
        events = Some(connection.subscribe());

        let sender = connection.clone();
        connection.on(EventKind::Opened, move |_| {
            for text in MESSAGES {
                if let Err(e) = sender.send(*text) {
                    eprintln!("    send failed: {e}");
                }
            }
        });
    })?;
    let mut events = events.ok_or_else(|| anyhow::anyhow!("setup did not run"))?;

    println!("    ✓ State: {}\n", connection.ready_state());

    // ========================================================================
    // Event Loop
    // ========================================================================

    println!("[2] Waiting for echoes...");

    let mut echoed = 0;
    while let Some(event) = events.recv().await {
        match event {
            Event::Opened => println!("    ✓ Open (protocol '{}')", connection.protocol()),
            Event::Message { payload } => {
                match &payload {
                    Payload::Text(text) => println!("    ← {text}"),
                    Payload::Binary(bytes) => println!("    ← {} bytes", bytes.len()),
                }
                echoed += 1;
                if echoed == MESSAGES.len() {
                    println!("\n[3] Closing...");
                    connection.close()?;
                }
            }
            Event::Errored { diagnostic } => println!("    ✗ Error: {diagnostic}"),
            Event::Closed {
                code,
                reason,
                was_clean,
            } => println!("    ✓ Closed: code={code} reason='{reason}' clean={was_clean}"),
        }
    }

    println!("\n=== Done ===");
    Ok(())
}
