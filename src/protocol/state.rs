//! Connection lifecycle state and binary framing mode.
//!
//! # State Machine
//!
//! ```text
//! Connecting ──(transport opens)──────────────► Open
//! Connecting ──(transport errors/closes, abort)► Closed
//! Open       ──(close requested)──────────────► Closing
//! Open       ──(transport errors/closes)──────► Closed
//! Closing    ──(handshake completes / errors)─► Closed
//! ```
//!
//! `Closed` is terminal.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============================================================================
// ReadyState
// ============================================================================

/// Lifecycle state of a connection.
///
/// Numeric values match the DOM `WebSocket.readyState` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Established; messages may be sent and received.
    Open = 1,
    /// Closing handshake in progress.
    Closing = 2,
    /// Closed or never opened.
    Closed = 3,
}

impl ReadyState {
    /// Returns the DOM numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns `true` for the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Open)
                | (Self::Connecting, Self::Closed)
                | (Self::Open, Self::Closing)
                | (Self::Open, Self::Closed)
                | (Self::Closing, Self::Closed)
        )
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// BinaryType
// ============================================================================

/// How received binary payloads are framed by the transport.
///
/// The connection records the mode and forwards it to the transport.
/// [`NativeTransport`](crate::NativeTransport) ignores it: inbound binary
/// frames always arrive as [`Payload::Binary`](crate::Payload::Binary).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryType {
    /// Opaque blob (DOM default).
    #[default]
    Blob,
    /// Contiguous byte buffer.
    ArrayBuffer,
}

impl BinaryType {
    /// Returns the DOM string value.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::ArrayBuffer => "arraybuffer",
        }
    }
}

impl fmt::Display for BinaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BinaryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Self::Blob),
            "arraybuffer" => Ok(Self::ArrayBuffer),
            other => Err(Error::config(format!("unknown binary type: {other}"))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ReadyState; 4] = [
        ReadyState::Connecting,
        ReadyState::Open,
        ReadyState::Closing,
        ReadyState::Closed,
    ];

    #[test]
    fn test_dom_values() {
        let values: Vec<u16> = ALL.iter().map(|state| state.as_u16()).collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_legal_edges() {
        use ReadyState::*;
        assert!(Connecting.can_transition_to(Open));
        assert!(Connecting.can_transition_to(Closed));
        assert!(Open.can_transition_to(Closing));
        assert!(Open.can_transition_to(Closed));
        assert!(Closing.can_transition_to(Closed));
    }

    #[test]
    fn test_illegal_edges() {
        use ReadyState::*;
        assert!(!Connecting.can_transition_to(Closing));
        assert!(!Open.can_transition_to(Connecting));
        assert!(!Closing.can_transition_to(Open));
        for state in ALL {
            assert!(!Closed.can_transition_to(state));
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_only_closed_is_terminal() {
        for state in ALL {
            assert_eq!(state.is_terminal(), state == ReadyState::Closed);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ReadyState::Connecting.to_string(), "Connecting");
        assert_eq!(ReadyState::Closed.to_string(), "Closed");
    }

    #[test]
    fn test_binary_type_parse() {
        assert_eq!("blob".parse::<BinaryType>().unwrap(), BinaryType::Blob);
        assert_eq!(
            "arraybuffer".parse::<BinaryType>().unwrap(),
            BinaryType::ArrayBuffer
        );
        assert!("bytes".parse::<BinaryType>().is_err());
        assert_eq!(BinaryType::default(), BinaryType::Blob);
    }

    #[test]
    fn test_binary_type_serde() {
        let json = serde_json::to_string(&BinaryType::ArrayBuffer).unwrap();
        assert_eq!(json, "\"arraybuffer\"");
    }
}
