//! Event types.
//!
//! Two layers of events exist:
//!
//! - [`TransportEvent`]: what a transport reports through its
//!   [`EventSink`](crate::transport::EventSink).
//! - [`Event`]: what listeners registered with
//!   [`Connection::on`](crate::transport::Connection::on) receive.
//!
//! # Event Kinds
//!
//! | Kind | DOM name | Variant |
//! |------|----------|---------|
//! | [`EventKind::Opened`] | `open` | [`Event::Opened`] |
//! | [`EventKind::Message`] | `message` | [`Event::Message`] |
//! | [`EventKind::Errored`] | `error` | [`Event::Errored`] |
//! | [`EventKind::Closed`] | `close` | [`Event::Closed`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::close::{CloseCode, CloseFrame};
use super::message::Payload;

// ============================================================================
// EventKind
// ============================================================================

/// Kind of event a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Connection reached Open.
    #[serde(rename = "open")]
    Opened,
    /// Message received.
    Message,
    /// Transport fault.
    #[serde(rename = "error")]
    Errored,
    /// Connection reached Closed.
    #[serde(rename = "close")]
    Closed,
}

impl EventKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Opened, Self::Message, Self::Errored, Self::Closed];

    /// Returns the DOM event name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opened => "open",
            Self::Message => "message",
            Self::Errored => "error",
            Self::Closed => "close",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Opened),
            "message" => Ok(Self::Message),
            "error" => Ok(Self::Errored),
            "close" => Ok(Self::Closed),
            other => Err(Error::config(format!("unknown event kind: {other}"))),
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// Notification delivered to connection listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The handshake completed.
    Opened,
    /// A message arrived while the connection was open.
    Message {
        /// Message data.
        payload: Payload,
    },
    /// The transport reported a fault. Always followed by [`Event::Closed`].
    Errored {
        /// Diagnostic from the transport.
        diagnostic: String,
    },
    /// The connection reached Closed. Always the last event.
    Closed {
        /// Close status code.
        code: CloseCode,
        /// Close reason, possibly empty.
        reason: String,
        /// Whether the closing handshake completed.
        was_clean: bool,
    },
}

impl Event {
    /// Returns the kind of this event.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Opened => EventKind::Opened,
            Self::Message { .. } => EventKind::Message,
            Self::Errored { .. } => EventKind::Errored,
            Self::Closed { .. } => EventKind::Closed,
        }
    }

    /// Builds a closed event from a close frame.
    #[inline]
    #[must_use]
    pub fn closed(frame: &CloseFrame) -> Self {
        Self::Closed {
            code: frame.code,
            reason: frame.reason.clone(),
            was_clean: frame.was_clean,
        }
    }

    /// Returns the payload of a message event.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Message { payload } => Some(payload),
            _ => None,
        }
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Raw occurrence reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Open {
        /// Negotiated subprotocol, empty if none.
        protocol: String,
        /// Negotiated extensions, empty if none.
        extensions: String,
    },
    /// Data frame received.
    Message(Payload),
    /// Fault; the transport cannot recover.
    Error {
        /// Diagnostic message.
        diagnostic: String,
    },
    /// Transport closed.
    Close {
        /// Close status code.
        code: CloseCode,
        /// Close reason.
        reason: String,
        /// Whether the closing handshake completed.
        was_clean: bool,
    },
}

impl TransportEvent {
    /// Creates an open event.
    #[inline]
    #[must_use]
    pub fn open(protocol: impl Into<String>, extensions: impl Into<String>) -> Self {
        Self::Open {
            protocol: protocol.into(),
            extensions: extensions.into(),
        }
    }

    /// Creates an error event.
    #[inline]
    #[must_use]
    pub fn error(diagnostic: impl Into<String>) -> Self {
        Self::Error {
            diagnostic: diagnostic.into(),
        }
    }

    /// Creates a close event from a frame.
    #[inline]
    #[must_use]
    pub fn close(frame: CloseFrame) -> Self {
        Self::Close {
            code: frame.code,
            reason: frame.reason,
            was_clean: frame.was_clean,
        }
    }

    /// Returns the DOM name of the event.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Message(_) => "message",
            Self::Error { .. } => "error",
            Self::Close { .. } => "close",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trip_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("opened".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_kind_serde_uses_dom_names() {
        let json = serde_json::to_string(&EventKind::Errored).unwrap();
        assert_eq!(json, "\"error\"");
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(Event::Opened.kind(), EventKind::Opened);
        let message = Event::Message {
            payload: Payload::from("x"),
        };
        assert_eq!(message.kind(), EventKind::Message);
        assert_eq!(message.payload(), Some(&Payload::from("x")));
        assert!(Event::Opened.payload().is_none());
    }

    #[test]
    fn test_closed_from_frame() {
        let event = Event::closed(&CloseFrame::abnormal("gone"));
        assert_eq!(
            event,
            Event::Closed {
                code: CloseCode::ABNORMAL,
                reason: "gone".into(),
                was_clean: false,
            }
        );
    }

    #[test]
    fn test_transport_event_names() {
        assert_eq!(TransportEvent::open("", "").name(), "open");
        assert_eq!(TransportEvent::error("x").name(), "error");
        assert_eq!(TransportEvent::close(CloseFrame::normal()).name(), "close");
    }
}
