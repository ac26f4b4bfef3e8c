//! Close codes and close frames (RFC 6455 Section 7.4).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// CloseCode
// ============================================================================

/// WebSocket close status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloseCode(u16);

impl CloseCode {
    /// Purpose of the connection was fulfilled.
    pub const NORMAL: Self = Self(1000);
    /// Endpoint is going away.
    pub const GOING_AWAY: Self = Self(1001);
    /// Protocol error.
    pub const PROTOCOL_ERROR: Self = Self(1002);
    /// Received a data type it cannot accept.
    pub const UNSUPPORTED_DATA: Self = Self(1003);
    /// No status code was present. Never sent on the wire.
    pub const NO_STATUS: Self = Self(1005);
    /// Connection dropped without a close frame. Never sent on the wire.
    pub const ABNORMAL: Self = Self(1006);
    /// Message data inconsistent with its type.
    pub const INVALID_PAYLOAD: Self = Self(1007);
    /// Message violates policy.
    pub const POLICY_VIOLATION: Self = Self(1008);
    /// Message too big to process.
    pub const MESSAGE_TOO_BIG: Self = Self(1009);
    /// Client expected an extension the server did not negotiate.
    pub const MANDATORY_EXTENSION: Self = Self(1010);
    /// Server hit an unexpected condition.
    pub const INTERNAL_ERROR: Self = Self(1011);

    /// Longest close reason a control frame can carry, in UTF-8 bytes.
    pub const MAX_REASON_BYTES: usize = 123;

    /// Wraps a raw status code.
    #[inline]
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the raw status code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns `true` if a client may request this code when closing.
    ///
    /// Only normal closure and the registered/private range 3000-4999 are
    /// allowed.
    #[inline]
    #[must_use]
    pub const fn is_caller_allowed(self) -> bool {
        self.0 == 1000 || (self.0 >= 3000 && self.0 <= 4999)
    }
}

impl Default for CloseCode {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.0
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CloseFrame
// ============================================================================

/// Code and reason of a close, plus whether it completed cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseFrame {
    /// Status code.
    pub code: CloseCode,
    /// Human-readable reason, possibly empty.
    pub reason: String,
    /// Whether both sides exchanged close frames.
    pub was_clean: bool,
}

impl CloseFrame {
    /// Frame for a graceful local close (code 1000, no reason).
    #[inline]
    #[must_use]
    pub fn normal() -> Self {
        Self {
            code: CloseCode::NORMAL,
            reason: String::new(),
            was_clean: true,
        }
    }

    /// Frame for a connection that ended without a close handshake.
    #[inline]
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: CloseCode::ABNORMAL,
            reason: reason.into(),
            was_clean: false,
        }
    }

    /// Builds a caller-requested close frame after validating it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCloseCode`] if the code is not 1000 or 3000-4999
    /// - [`Error::CloseReasonTooLong`] if the reason exceeds 123 bytes
    pub fn requested(code: CloseCode, reason: impl Into<String>) -> Result<Self> {
        if !code.is_caller_allowed() {
            return Err(Error::invalid_close_code(code));
        }

        let reason = reason.into();
        if reason.len() > CloseCode::MAX_REASON_BYTES {
            return Err(Error::close_reason_too_long(reason.len()));
        }

        Ok(Self {
            code,
            reason,
            was_clean: true,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
