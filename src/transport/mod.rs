//! Transport layer.
//!
//! This module defines the boundary between a [`Connection`] and the network
//! channel it wraps, and hosts the connection itself.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   send / close    ┌──────────────────┐
//! │                  │──────────────────►│                  │
//! │   Connection     │                   │ TransportHandle  │
//! │  (state, queue,  │    EventSink      │ (native socket,  │
//! │   listeners)     │◄──────────────────│  memory peer)    │
//! └──────────────────┘  TransportEvent   └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Transport::open` - Validate the request and start the handshake
//! 2. `EventSink::emit(Open)` - Handshake completed, state becomes Open
//! 3. `Connection::send` / `EventSink::emit(Message)` - Traffic
//! 4. `Connection::close` - Closing handshake, state becomes Closing
//! 5. `EventSink::emit(Close)` - State becomes Closed, listeners dropped
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection state, event queue and listeners |
//! | `memory` | Deterministic in-memory transport |
//! | `native` | tokio-tungstenite transport |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::protocol::{BinaryType, CloseFrame, Payload, TransportEvent};

// ============================================================================
// Submodules
// ============================================================================

/// Connection state, event queue and listeners.
pub mod connection;

/// In-memory transport for tests and embedders.
pub mod memory;

/// WebSocket transport backed by tokio-tungstenite.
pub mod native;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, EventHandler};
pub use memory::{MemoryPeer, MemoryTransport};
pub use native::NativeTransport;

// ============================================================================
// OpenRequest
// ============================================================================

/// Validated parameters for opening one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Connection the transport will serve.
    pub connection_id: ConnectionId,
    /// Normalized `ws`/`wss` URL.
    pub url: Url,
    /// Requested subprotocols, in preference order.
    pub protocols: Vec<String>,
}

// ============================================================================
// Transport Traits
// ============================================================================

/// Capability to open bidirectional message-oriented channels.
///
/// `open` must not wait for the handshake. It returns a handle as soon as
/// the attempt has started and reports progress through `sink`.
pub trait Transport: Send + Sync {
    /// Starts opening a channel.
    ///
    /// # Errors
    ///
    /// Returns a connect error if the request is refused synchronously.
    fn open(&self, request: &OpenRequest, sink: EventSink) -> Result<Box<dyn TransportHandle>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn open(&self, request: &OpenRequest, sink: EventSink) -> Result<Box<dyn TransportHandle>> {
        (**self).open(request, sink)
    }
}

/// One open channel, exclusively owned by its [`Connection`].
pub trait TransportHandle: Send + Sync {
    /// Queues a payload for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SendRejected`](crate::Error::SendRejected) if the
    /// payload cannot be queued.
    fn send(&self, payload: &Payload) -> Result<()>;

    /// Starts the closing handshake (or aborts a pending handshake).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Close`](crate::Error::Close) on a synchronous fault.
    fn close(&self, frame: &CloseFrame) -> Result<()>;

    /// Returns bytes queued but not yet written.
    fn buffered_amount(&self) -> u64;

    /// Informs the transport how binary payloads should be framed.
    fn set_binary_type(&self, _binary_type: BinaryType) {}
}

// ============================================================================
// EventSink
// ============================================================================

/// Callback receiving transport events for one connection.
type Deliver = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Channel through which a transport reports events to its connection.
///
/// Emitting never blocks on listeners: the event is queued and delivered by
/// whichever context is currently draining the connection. Emitting after
/// the connection was dropped is a no-op.
#[derive(Clone)]
pub struct EventSink {
    /// Connection this sink belongs to.
    connection_id: ConnectionId,
    /// Delivery callback.
    deliver: Deliver,
}

impl EventSink {
    /// Creates a sink from a delivery callback.
    pub fn new(
        connection_id: ConnectionId,
        deliver: impl Fn(TransportEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            connection_id,
            deliver: Arc::new(deliver),
        }
    }

    /// Returns the connection this sink reports to.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Reports one transport event.
    #[inline]
    pub fn emit(&self, event: TransportEvent) {
        (self.deliver)(event);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("connection_id", &self.connection_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    #[test]
    fn test_event_sink_forwards_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let id = ConnectionId::generate();
        let sink = EventSink::new(id, move |event| seen_clone.lock().push(event));

        sink.emit(TransportEvent::open("chat", ""));
        sink.clone().emit(TransportEvent::error("boom"));

        assert_eq!(sink.connection_id(), id);
        assert_eq!(
            *seen.lock(),
            vec![TransportEvent::open("chat", ""), TransportEvent::error("boom")]
        );
    }
}
