//! wsbridge - Client-side WebSocket connection manager.
//!
//! This library opens WebSocket connections, tracks their lifecycle and
//! fans transport events out to registered listeners.
//!
//! # Architecture
//!
//! The library separates connection bookkeeping from the network:
//!
//! - **Connection (Rust)**: Owns the ready state, the event queue and the
//!   listener registry
//! - **Transport (pluggable)**: Performs the handshake and moves frames,
//!   reporting back through an [`EventSink`]
//!
//! Key design principles:
//!
//! - Each [`Connection`] is independent; a manager is only a factory
//! - Events for one connection are delivered in order, one at a time
//! - A transport error always ends in exactly one close event
//! - Nothing is delivered after the close event
//!
//! # Quick Start
//!
//! ```no_run
//! use wsbridge::{ConnectionManager, EventKind, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::builder()
//!         .native()
//!         .protocol("chat")
//!         .build()?;
//!
//!     // Listeners registered here are in place before the handshake starts
//!     let mut events = None;
//!     let _connection = manager.open_with("ws://localhost:9001/echo", |connection| {
//!         events = Some(connection.subscribe());
//!
//!         let sender = connection.clone();
//!         connection.on(EventKind::Opened, move |_| {
//!             let _ = sender.send("hello");
//!         });
//!     })?;
//!
//!     let Some(mut events) = events else {
//!         return Ok(());
//!     };
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`manager`] | Connection factory and configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Events, payloads, close codes, ready states |
//! | [`transport`] | Connection state machine and transports |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for connections and listeners.
pub mod identifiers;

/// Connection factory and configuration.
///
/// Use [`ConnectionManager::builder()`] to create a configured manager.
pub mod manager;

/// WebSocket vocabulary: events, payloads, close codes.
pub mod protocol;

/// Connection state machine and the transports behind it.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, ErrorKind, Result};

// Identifier types
pub use identifiers::{ConnectionId, ListenerId};

// Manager types
pub use manager::{ConnectionManager, ConnectionManagerBuilder, ConnectionOptions};

// Protocol types
pub use protocol::{
    BinaryType, CloseCode, CloseFrame, Event, EventKind, Payload, ReadyState, TransportEvent,
};

// Transport types
pub use transport::{
    Connection, EventHandler, EventSink, MemoryPeer, MemoryTransport, NativeTransport,
    OpenRequest, Transport, TransportHandle,
};
