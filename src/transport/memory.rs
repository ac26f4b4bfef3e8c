//! In-memory transport.
//!
//! [`MemoryTransport`] never touches the network. Every successful open
//! creates a [`MemoryPeer`] that plays the remote end: it decides when the
//! handshake completes, pushes messages and faults, and records what the
//! connection sent.
//!
//! Events emitted by a peer are delivered synchronously on the calling
//! thread, which keeps tests deterministic.
//!
//! # Example
//!
//! ```ignore
//! use wsbridge::{ConnectionManager, MemoryTransport, ReadyState};
//!
//! let transport = MemoryTransport::new();
//! let manager = ConnectionManager::new(transport.clone());
//!
//! let connection = manager.open("ws://example.test/")?;
//! let peer = transport.last_peer().unwrap();
//!
//! peer.accept("chat");
//! assert_eq!(connection.ready_state(), ReadyState::Open);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{BinaryType, CloseCode, CloseFrame, Payload, TransportEvent};

use super::{EventSink, OpenRequest, Transport, TransportHandle};

// ============================================================================
// Shared State
// ============================================================================

#[derive(Default)]
struct TransportState {
    peers: Vec<MemoryPeer>,
    refuse_next: Option<String>,
    auto_finish_close: bool,
}

/// Per-peer record of outbound traffic and injected faults.
#[derive(Default)]
struct PeerLog {
    sent: Vec<Payload>,
    close_requests: Vec<CloseFrame>,
    buffered: u64,
    reject_sends: Option<String>,
    fail_close: Option<String>,
    binary_type: BinaryType,
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// Deterministic transport for tests and embedders.
///
/// Clones share state, so a test can keep one clone and hand another to
/// the manager.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MemoryTransport {
    /// Creates a transport with no peers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `open` fail synchronously with `message`.
    pub fn refuse_next(&self, message: impl Into<String>) {
        self.state.lock().refuse_next = Some(message.into());
    }

    /// When enabled, every close request is answered immediately with a
    /// clean close echoing the requested code.
    pub fn auto_finish_close(&self, enabled: bool) {
        self.state.lock().auto_finish_close = enabled;
    }

    /// Returns all peers, in open order.
    #[must_use]
    pub fn peers(&self) -> Vec<MemoryPeer> {
        self.state.lock().peers.clone()
    }

    /// Returns the most recently opened peer.
    #[must_use]
    pub fn last_peer(&self) -> Option<MemoryPeer> {
        self.state.lock().peers.last().cloned()
    }

    /// Returns how many opens succeeded.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().peers.len()
    }
}

impl Transport for MemoryTransport {
    fn open(&self, request: &OpenRequest, sink: EventSink) -> Result<Box<dyn TransportHandle>> {
        let mut state = self.state.lock();

        if let Some(message) = state.refuse_next.take() {
            debug!(url = %request.url, %message, "Memory transport refused open");
            return Err(Error::connect(request.url.as_str(), message));
        }

        let log = Arc::new(Mutex::new(PeerLog::default()));
        state.peers.push(MemoryPeer {
            request: request.clone(),
            sink: sink.clone(),
            log: Arc::clone(&log),
        });

        debug!(connection_id = %request.connection_id, url = %request.url, "Memory peer created");

        Ok(Box::new(MemoryHandle {
            log,
            sink,
            auto_finish_close: state.auto_finish_close,
        }))
    }
}

// ============================================================================
// MemoryHandle
// ============================================================================

struct MemoryHandle {
    log: Arc<Mutex<PeerLog>>,
    sink: EventSink,
    auto_finish_close: bool,
}

impl TransportHandle for MemoryHandle {
    fn send(&self, payload: &Payload) -> Result<()> {
        let mut log = self.log.lock();
        if let Some(message) = &log.reject_sends {
            return Err(Error::send_rejected(message.clone()));
        }
        log.buffered += payload.len() as u64;
        log.sent.push(payload.clone());
        Ok(())
    }

    fn close(&self, frame: &CloseFrame) -> Result<()> {
        {
            let mut log = self.log.lock();
            if let Some(message) = log.fail_close.take() {
                return Err(Error::close(message));
            }
            log.close_requests.push(frame.clone());
        }

        if self.auto_finish_close {
            self.sink.emit(TransportEvent::Close {
                code: frame.code,
                reason: frame.reason.clone(),
                was_clean: true,
            });
        }
        Ok(())
    }

    fn buffered_amount(&self) -> u64 {
        self.log.lock().buffered
    }

    fn set_binary_type(&self, binary_type: BinaryType) {
        self.log.lock().binary_type = binary_type;
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Remote end of one in-memory connection.
#[derive(Clone)]
pub struct MemoryPeer {
    request: OpenRequest,
    sink: EventSink,
    log: Arc<Mutex<PeerLog>>,
}

impl MemoryPeer {
    /// Returns the request the connection was opened with.
    #[inline]
    #[must_use]
    pub fn request(&self) -> &OpenRequest {
        &self.request
    }

    /// Completes the handshake with the given subprotocol.
    pub fn accept(&self, protocol: &str) {
        self.accept_with(protocol, "");
    }

    /// Completes the handshake with subprotocol and extensions.
    pub fn accept_with(&self, protocol: &str, extensions: &str) {
        self.emit(TransportEvent::open(protocol, extensions));
    }

    /// Delivers an inbound message.
    pub fn message(&self, payload: impl Into<Payload>) {
        self.emit(TransportEvent::Message(payload.into()));
    }

    /// Reports a fault.
    pub fn fail(&self, diagnostic: &str) {
        self.emit(TransportEvent::error(diagnostic));
    }

    /// Closes from the remote side with a clean handshake.
    pub fn close(&self, code: CloseCode, reason: &str) {
        self.emit(TransportEvent::Close {
            code,
            reason: reason.to_owned(),
            was_clean: true,
        });
    }

    /// Answers the last close request, completing the handshake.
    ///
    /// Echoes normal closure if nothing was requested.
    pub fn finish_close(&self) {
        let frame = self
            .log
            .lock()
            .close_requests
            .last()
            .cloned()
            .unwrap_or_else(CloseFrame::normal);
        self.close(frame.code, &frame.reason);
    }

    /// Emits an arbitrary transport event.
    pub fn emit(&self, event: TransportEvent) {
        self.sink.emit(event);
    }

    /// Returns every payload the connection sent.
    #[must_use]
    pub fn sent(&self) -> Vec<Payload> {
        self.log.lock().sent.clone()
    }

    /// Returns every close frame the connection requested.
    #[must_use]
    pub fn close_requests(&self) -> Vec<CloseFrame> {
        self.log.lock().close_requests.clone()
    }

    /// Marks buffered bytes as written. Returns how many were drained.
    pub fn drain(&self) -> u64 {
        std::mem::take(&mut self.log.lock().buffered)
    }

    /// Makes every following send fail with `message`.
    pub fn reject_sends(&self, message: impl Into<String>) {
        self.log.lock().reject_sends = Some(message.into());
    }

    /// Makes the next close request fail with `message`.
    pub fn fail_close(&self, message: impl Into<String>) {
        self.log.lock().fail_close = Some(message.into());
    }

    /// Returns the binary type last set by the connection.
    #[must_use]
    pub fn binary_type(&self) -> BinaryType {
        self.log.lock().binary_type
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use url::Url;

    use crate::identifiers::ConnectionId;

    fn request() -> OpenRequest {
        OpenRequest {
            connection_id: ConnectionId::generate(),
            url: Url::parse("ws://example.test/").unwrap(),
            protocols: vec!["chat".into()],
        }
    }

    fn capture() -> (EventSink, Arc<Mutex<Vec<TransportEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = EventSink::new(ConnectionId::generate(), move |event| {
            seen_clone.lock().push(event)
        });
        (sink, seen)
    }

    #[test]
    fn test_refuse_next_only_once() {
        let transport = MemoryTransport::new();
        transport.refuse_next("handshake refused");
        let (sink, _) = capture();

        let err = transport.open(&request(), sink.clone()).err().unwrap();
        assert!(err.is_connect_error());
        assert!(transport.open(&request(), sink).is_ok());
        assert_eq!(transport.open_count(), 1);
    }

    #[test]
    fn test_peer_records_request() {
        let transport = MemoryTransport::new();
        let (sink, _) = capture();
        transport.open(&request(), sink).unwrap();

        let peer = transport.last_peer().unwrap();
        assert_eq!(peer.request().protocols, vec!["chat".to_string()]);
    }

    #[test]
    fn test_handle_tracks_buffered_bytes() {
        let transport = MemoryTransport::new();
        let (sink, _) = capture();
        let handle = transport.open(&request(), sink).unwrap();
        let peer = transport.last_peer().unwrap();

        handle.send(&Payload::from("abcd")).unwrap();
        assert_eq!(handle.buffered_amount(), 4);
        assert_eq!(peer.drain(), 4);
        assert_eq!(handle.buffered_amount(), 0);
    }

    #[test]
    fn test_auto_finish_close_emits_clean_close() {
        let transport = MemoryTransport::new();
        transport.auto_finish_close(true);
        let (sink, seen) = capture();
        let handle = transport.open(&request(), sink).unwrap();

        let frame = CloseFrame::requested(CloseCode::new(4000), "bye").unwrap();
        handle.close(&frame).unwrap();

        assert_eq!(*seen.lock(), vec![TransportEvent::close(frame)]);
    }

    #[test]
    fn test_fail_close_is_one_shot() {
        let transport = MemoryTransport::new();
        let (sink, _) = capture();
        let handle = transport.open(&request(), sink).unwrap();
        let peer = transport.last_peer().unwrap();

        peer.fail_close("boom");
        assert!(handle.close(&CloseFrame::normal()).is_err());
        assert!(handle.close(&CloseFrame::normal()).is_ok());
        assert_eq!(peer.close_requests().len(), 1);
    }

    #[test]
    fn test_finish_close_echoes_request() {
        let transport = MemoryTransport::new();
        let (sink, seen) = capture();
        let handle = transport.open(&request(), sink).unwrap();
        let peer = transport.last_peer().unwrap();

        let frame = CloseFrame::requested(CloseCode::new(3001), "later").unwrap();
        handle.close(&frame).unwrap();
        peer.finish_close();

        assert_eq!(*seen.lock(), vec![TransportEvent::close(frame)]);
    }
}
