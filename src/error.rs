//! Error types for wsbridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wsbridge::{ConnectionManager, Result};
//!
//! fn example(manager: &ConnectionManager) -> Result<()> {
//!     let connection = manager.open("wss://example.test/socket")?;
//!     connection.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connect | [`Error::InvalidUrl`], [`Error::InvalidProtocol`], [`Error::Connect`] |
//! | Send | [`Error::NotOpen`], [`Error::SendRejected`] |
//! | Close | [`Error::InvalidCloseCode`], [`Error::CloseReasonTooLong`], [`Error::Close`] |
//! | Transport | [`Error::Transport`] |
//! | Configuration | [`Error::Config`] |
//! | External | [`Error::Json`] |
//!
//! Asynchronous transport faults are never returned from a call. They are
//! delivered as [`Event::Errored`](crate::protocol::Event::Errored) followed
//! by [`Event::Closed`](crate::protocol::Event::Closed).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::protocol::{CloseCode, ReadyState};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connect Errors
    // ========================================================================
    /// URL rejected before the transport was contacted.
    ///
    /// Returned when the URL does not parse, uses a scheme other than
    /// `ws`/`wss` (or `http`/`https`), or carries a fragment.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The URL as supplied by the caller.
        url: String,
        /// Why the URL was rejected.
        message: String,
    },

    /// Subprotocol rejected before the transport was contacted.
    #[error("Invalid subprotocol '{protocol}': {message}")]
    InvalidProtocol {
        /// The offending subprotocol token.
        protocol: String,
        /// Why the token was rejected.
        message: String,
    },

    /// Transport refused to start the connection.
    ///
    /// Returned when the transport fails synchronously while opening.
    #[error("Connection to {url} failed: {message}")]
    Connect {
        /// URL that was being opened.
        url: String,
        /// Diagnostic from the transport.
        message: String,
    },

    // ========================================================================
    // Send Errors
    // ========================================================================
    /// Send attempted while the connection is not open.
    ///
    /// The payload never reaches the transport.
    #[error("Connection is not open (state: {state})")]
    NotOpen {
        /// State observed at the time of the call.
        state: ReadyState,
    },

    /// Transport rejected an outbound payload.
    #[error("Send rejected: {message}")]
    SendRejected {
        /// Diagnostic from the transport.
        message: String,
    },

    // ========================================================================
    // Close Errors
    // ========================================================================
    /// Close code a client is not allowed to send.
    ///
    /// Only 1000 and 3000-4999 may be requested by the caller.
    #[error("Invalid close code: {code}")]
    InvalidCloseCode {
        /// The rejected code.
        code: u16,
    },

    /// Close reason longer than a control frame can carry.
    #[error("Close reason is {length} bytes, maximum is {max}")]
    CloseReasonTooLong {
        /// UTF-8 length of the supplied reason.
        length: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Transport faulted while starting the closing handshake.
    #[error("Close failed: {message}")]
    Close {
        /// Diagnostic from the transport.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Fault reported by a transport after the connection was established.
    #[error("Transport error: {message}")]
    Transport {
        /// Diagnostic from the transport.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when manager configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// ErrorKind
// ============================================================================

/// Coarse classification of an [`enum@Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Failure while opening a connection.
    Connect,
    /// Failure while sending a payload.
    Send,
    /// Failure while closing a connection.
    Close,
    /// Asynchronous transport fault.
    Transport,
    /// Invalid configuration.
    Config,
    /// Payload (de)serialization failure.
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Send => "send",
            Self::Close => "close",
            Self::Transport => "transport",
            Self::Config => "config",
            Self::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid subprotocol error.
    #[inline]
    pub fn invalid_protocol(protocol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProtocol {
            protocol: protocol.into(),
            message: message.into(),
        }
    }

    /// Creates a connect error.
    #[inline]
    pub fn connect(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a not-open error.
    #[inline]
    pub fn not_open(state: ReadyState) -> Self {
        Self::NotOpen { state }
    }

    /// Creates a send rejected error.
    #[inline]
    pub fn send_rejected(message: impl Into<String>) -> Self {
        Self::SendRejected {
            message: message.into(),
        }
    }

    /// Creates an invalid close code error.
    #[inline]
    pub fn invalid_close_code(code: CloseCode) -> Self {
        Self::InvalidCloseCode { code: code.as_u16() }
    }

    /// Creates a close reason too long error.
    #[inline]
    pub fn close_reason_too_long(length: usize) -> Self {
        Self::CloseReasonTooLong {
            length,
            max: CloseCode::MAX_REASON_BYTES,
        }
    }

    /// Creates a close error.
    #[inline]
    pub fn close(message: impl Into<String>) -> Self {
        Self::Close {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidProtocol { .. } | Self::Connect { .. } => {
                ErrorKind::Connect
            }
            Self::NotOpen { .. } | Self::SendRejected { .. } => ErrorKind::Send,
            Self::InvalidCloseCode { .. } | Self::CloseReasonTooLong { .. } | Self::Close { .. } => {
                ErrorKind::Close
            }
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Config { .. } => ErrorKind::Config,
            Self::Json(_) => ErrorKind::Serialization,
        }
    }

    /// Returns `true` if this error was produced while opening.
    #[inline]
    #[must_use]
    pub fn is_connect_error(&self) -> bool {
        self.kind() == ErrorKind::Connect
    }

    /// Returns `true` if this error was produced while sending.
    #[inline]
    #[must_use]
    pub fn is_send_error(&self) -> bool {
        self.kind() == ErrorKind::Send
    }

    /// Returns `true` if this error was produced while closing.
    #[inline]
    #[must_use]
    pub fn is_close_error(&self) -> bool {
        self.kind() == ErrorKind::Close
    }

    /// Returns `true` if the caller passed an argument the transport was
    /// never asked about.
    ///
    /// Such errors are raised before any state change.
    #[inline]
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. }
                | Self::InvalidProtocol { .. }
                | Self::NotOpen { .. }
                | Self::InvalidCloseCode { .. }
                | Self::CloseReasonTooLong { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
