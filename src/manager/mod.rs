//! Connection manager module.
//!
//! This module provides the entry point for opening connections.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Factory for connections |
//! | [`ConnectionManagerBuilder`] | Fluent configuration builder |
//! | [`ConnectionOptions`] | Subprotocols and binary framing |
//! | [`normalize_url`] | URL validation |
//! | [`ws_url`] | Socket URL relative to a page |
//!
//! # Example
//!
//! ```ignore
//! use wsbridge::{ConnectionManager, EventKind, Result};
//!
//! # fn example() -> Result<()> {
//! let manager = ConnectionManager::builder()
//!     .native()
//!     .protocol("chat")
//!     .build()?;
//!
//! let connection = manager.open("wss://example.com/socket")?;
//! connection.on(EventKind::Message, |event| println!("{event:?}"));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for manager configuration.
pub mod builder;

/// Core manager implementation.
pub mod core;

/// WebSocket URL validation and derivation.
pub mod location;

/// Per-connection options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionManagerBuilder;
pub use core::ConnectionManager;
pub use location::{normalize_url, ws_url};
pub use options::ConnectionOptions;
