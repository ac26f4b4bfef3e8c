//! Connection data types.
//!
//! This module defines the values exchanged between callers, connections
//! and transports.
//!
//! # Overview
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ReadyState`] | Lifecycle state (`Connecting`, `Open`, `Closing`, `Closed`) |
//! | [`BinaryType`] | Framing of received binary data |
//! | [`CloseCode`] / [`CloseFrame`] | Close status (RFC 6455 Section 7.4) |
//! | [`Payload`] | Text or binary message data |
//! | [`Event`] / [`EventKind`] | Listener notifications |
//! | [`TransportEvent`] | Raw transport notifications |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `close` | Close codes and frames |
//! | `event` | Listener and transport events |
//! | `message` | Message payloads |
//! | `state` | Ready state and binary type |

// ============================================================================
// Submodules
// ============================================================================

/// Close codes and frames.
pub mod close;

/// Listener and transport event types.
pub mod event;

/// Message payloads.
pub mod message;

/// Ready state and binary type.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use close::{CloseCode, CloseFrame};
pub use event::{Event, EventKind, TransportEvent};
pub use message::Payload;
pub use state::{BinaryType, ReadyState};
