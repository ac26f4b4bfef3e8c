//! Socket URLs relative to a page, and options validation.
//!
//! Demonstrates:
//! - Deriving `ws://` / `wss://` URLs from the page origin
//! - Subprotocol and binary type options
//! - Errors reported before any transport is involved
//! - The in-memory transport as a stand-in server
//!
//! Usage:
//!   cargo run --example 002_relative_url
//!   cargo run --example 002_relative_url -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::Args;
use url::Url;
use wsbridge::manager::ws_url;
use wsbridge::{BinaryType, CloseCode, ConnectionManager, EventKind, MemoryTransport};

// ============================================================================
// Main
// ============================================================================

fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run() {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    println!("=== 002: Relative URLs ===\n");

    // ========================================================================
    // Derive URLs
    // ========================================================================

    println!("[1] Deriving socket URLs...");

    for page in [
        "http://localhost:8080/index.html",
        "https://app.example.com/dashboard",
    ] {
        let page = Url::parse(page)?;
        println!("    {page} → {}", ws_url(&page, "/live")?);
    }
    println!();

    // ========================================================================
    // Validation
    // ========================================================================

    println!("[2] Rejected inputs...");

    let transport = MemoryTransport::new();
    let manager = ConnectionManager::builder()
        .transport(transport.clone())
        .protocol("chat.v2")
        .binary_type(BinaryType::ArrayBuffer)
        .build()?;

    for bad in ["ftp://example.com/", "ws://example.com/#frag", "not a url"] {
        match manager.open(bad) {
            Ok(_) => println!("    ? {bad} unexpectedly accepted"),
            Err(e) => println!("    ✓ {bad}: {e} ({})", e.kind()),
        }
    }

    let invalid = ConnectionManager::builder()
        .transport(transport.clone())
        .protocol("has space")
        .build();
    if let Err(e) = invalid {
        println!("    ✓ subprotocol: {e}");
    }
    println!();

    // ========================================================================
    // Open Relative
    // ========================================================================

    println!("[3] Opening relative to page...");

    let page = Url::parse("https://app.example.com/dashboard")?;
    let connection = manager.open_relative(&page, "/feed")?;
    connection.on(EventKind::Closed, |event| println!("    ✓ {event:?}"));

    let peer = transport
        .last_peer()
        .ok_or_else(|| anyhow::anyhow!("memory transport has no peer"))?;
    println!("    URL:        {}", peer.request().url);
    println!("    Offered:    {:?}", peer.request().protocols);

    peer.accept("chat.v2");
    println!("    Negotiated: {}", connection.protocol());
    println!("    Binary:     {}", connection.binary_type());

    connection.close_with(CloseCode::new(4000), "demo finished")?;
    peer.finish_close();
    println!("    State:      {}", connection.ready_state());

    println!("\n=== Done ===");
    Ok(())
}
