//! Connection state, event queue and listeners.
//!
//! A [`Connection`] owns one [`TransportHandle`] and turns the raw
//! [`TransportEvent`]s reported through its [`EventSink`] into typed
//! [`Event`]s for registered listeners.
//!
//! # Event Delivery
//!
//! The sink never calls listeners directly. It appends to a per-connection
//! FIFO and, if nobody is draining that FIFO, drains it on the calling
//! context:
//!
//! - Events are applied to the state machine and delivered one at a time,
//!   in the order the transport reported them.
//! - Events produced while a listener runs (for example a listener calling
//!   [`Connection::close`] on a transport that answers synchronously) are
//!   delivered after the current event has reached every listener.
//! - No lock is held while a listener or the transport runs.
//!
//! # Start Order
//!
//! A connection exists before its transport does. Listeners registered
//! before the transport is started are in place before it can report
//! anything, so they cannot miss a lifecycle event. See
//! [`ConnectionManager::open_with`](crate::ConnectionManager::open_with).
//!
//! # Guarantees
//!
//! - `Message` events are only delivered while the state is Open.
//! - `Errored` is immediately followed by exactly one `Closed`.
//! - Nothing is delivered after `Closed`; listeners are dropped at that point.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, ListenerId};
use crate::protocol::{
    BinaryType, CloseCode, CloseFrame, Event, EventKind, Payload, ReadyState, TransportEvent,
};

use super::{EventSink, OpenRequest, Transport, TransportHandle};

// ============================================================================
// Constants
// ============================================================================

/// Reason recorded when a connection is closed before its handshake finished.
const ABORTED_REASON: &str = "connection closed before it was established";

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
///
/// Called with every event of the kind it was registered for.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Work item in the delivery queue.
enum Pending {
    /// Raw event from the transport, applied to the state machine first.
    Transport(TransportEvent),
    /// Event already accounted for in the state machine.
    Deliver(Event),
}

// ============================================================================
// SessionState
// ============================================================================

/// Mutable lifecycle data of a connection.
struct SessionState {
    ready_state: ReadyState,
    protocol: String,
    extensions: String,
    binary_type: BinaryType,
    close_frame: Option<CloseFrame>,
}

impl SessionState {
    fn new(binary_type: BinaryType) -> Self {
        Self {
            ready_state: ReadyState::Connecting,
            protocol: String::new(),
            extensions: String::new(),
            binary_type,
            close_frame: None,
        }
    }

    /// Moves to `next` if the edge is legal. Returns whether it moved.
    fn transition(&mut self, id: ConnectionId, next: ReadyState) -> bool {
        let current = self.ready_state;
        if !current.can_transition_to(next) {
            return false;
        }
        self.ready_state = next;
        debug!(connection_id = %id, from = %current, to = %next, "State transition");
        true
    }

    /// Moves to Closed and records the frame. Returns whether it moved.
    fn finish(&mut self, id: ConnectionId, frame: CloseFrame) -> bool {
        if !self.transition(id, ReadyState::Closed) {
            return false;
        }
        self.close_frame = Some(frame);
        true
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// Ordered multiset of listeners keyed by event kind, plus channel
/// subscribers.
#[derive(Default)]
struct Listeners {
    by_kind: FxHashMap<EventKind, Vec<(ListenerId, EventHandler)>>,
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
    released: bool,
}

impl Listeners {
    fn add(&mut self, kind: EventKind, handler: EventHandler) -> ListenerId {
        let id = ListenerId::next();
        if !self.released {
            self.by_kind.entry(kind).or_default().push((id, handler));
        }
        id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        for handlers in self.by_kind.values_mut() {
            if let Some(index) = handlers.iter().position(|(existing, _)| *existing == id) {
                handlers.remove(index);
                return true;
            }
        }
        false
    }

    fn snapshot(&self, kind: EventKind) -> Vec<EventHandler> {
        self.by_kind
            .get(&kind)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    fn count(&self, kind: EventKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }

    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.retain(|existing| !existing.is_closed());
        if !self.released {
            self.subscribers.push(tx);
        }
        rx
    }

    /// Sends `event` to every live subscriber, dropping those whose receiver is gone.
    fn publish(&mut self, event: &Event) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Drops every listener and subscriber and refuses new ones.
    /// Returns how many were dropped.
    fn release(&mut self) -> usize {
        let dropped = self.by_kind.values().map(Vec::len).sum::<usize>() + self.subscribers.len();
        self.by_kind.clear();
        self.subscribers.clear();
        self.released = true;
        dropped
    }
}

// ============================================================================
// DeliveryQueue
// ============================================================================

#[derive(Default)]
struct DeliveryQueue {
    pending: VecDeque<Pending>,
    draining: bool,
}

/// Clears the draining flag if a listener panics mid-delivery.
struct DrainGuard<'a>(&'a Mutex<DeliveryQueue>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

// ============================================================================
// ConnectionInner
// ============================================================================

/// State shared between [`Connection`] clones and the transport's sink.
struct ConnectionInner {
    id: ConnectionId,
    url: Url,
    state: Mutex<SessionState>,
    listeners: Mutex<Listeners>,
    queue: Mutex<DeliveryQueue>,
    handle: OnceLock<Box<dyn TransportHandle>>,
}

impl ConnectionInner {
    fn handle(&self) -> Option<&dyn TransportHandle> {
        self.handle.get().map(|handle| &**handle)
    }

    /// Queues work and drains the queue unless another context already is.
    fn enqueue(&self, pending: Pending) {
        {
            let mut queue = self.queue.lock();
            queue.pending.push_back(pending);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }

        let _guard = DrainGuard(&self.queue);

        loop {
            let next = {
                let mut queue = self.queue.lock();
                match queue.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        queue.draining = false;
                        return;
                    }
                }
            };

            let events = match next {
                Pending::Transport(event) => self.apply(event),
                Pending::Deliver(event) => vec![event],
            };

            for event in &events {
                self.dispatch(event);
            }
        }
    }

    /// Applies a transport event to the state machine.
    ///
    /// Returns the events listeners should see, in order.
    fn apply(&self, event: TransportEvent) -> Vec<Event> {
        let mut state = self.state.lock();
        let current = state.ready_state;

        trace!(connection_id = %self.id, event = event.name(), state = %current, "Transport event");

        match event {
            TransportEvent::Open {
                protocol,
                extensions,
            } => {
                if !state.transition(self.id, ReadyState::Open) {
                    debug!(connection_id = %self.id, state = %current, "Ignoring open event");
                    return Vec::new();
                }
                info!(
                    connection_id = %self.id,
                    url = %self.url,
                    protocol = %protocol,
                    "Connection opened"
                );
                state.protocol = protocol;
                state.extensions = extensions;
                vec![Event::Opened]
            }

            TransportEvent::Message(payload) => {
                if current != ReadyState::Open {
                    trace!(connection_id = %self.id, state = %current, "Discarding message outside Open");
                    return Vec::new();
                }
                trace!(connection_id = %self.id, bytes = payload.len(), "Message received");
                vec![Event::Message { payload }]
            }

            TransportEvent::Error { diagnostic } => {
                let frame = CloseFrame::abnormal("");
                if !state.finish(self.id, frame.clone()) {
                    debug!(connection_id = %self.id, %diagnostic, "Ignoring error after close");
                    return Vec::new();
                }
                warn!(connection_id = %self.id, url = %self.url, %diagnostic, "Transport error");
                vec![Event::Errored { diagnostic }, Event::closed(&frame)]
            }

            TransportEvent::Close {
                code,
                reason,
                was_clean,
            } => {
                let frame = CloseFrame {
                    code,
                    reason,
                    was_clean,
                };
                if !state.finish(self.id, frame.clone()) {
                    debug!(connection_id = %self.id, %code, "Ignoring duplicate close");
                    return Vec::new();
                }
                info!(connection_id = %self.id, %code, was_clean, "Connection closed");
                vec![Event::closed(&frame)]
            }
        }
    }

    /// Delivers one event to every listener of its kind.
    fn dispatch(&self, event: &Event) {
        let kind = event.kind();
        let handlers = self.listeners.lock().snapshot(kind);

        trace!(connection_id = %self.id, %kind, listeners = handlers.len(), "Dispatching event");

        for handler in handlers {
            handler(event);
        }

        self.listeners.lock().publish(event);

        if kind == EventKind::Closed {
            let dropped = self.listeners.lock().release();
            debug!(connection_id = %self.id, dropped, "Listeners released");
        }
    }

    fn close(&self, frame: CloseFrame) -> Result<()> {
        let previous = {
            let mut state = self.state.lock();
            let current = state.ready_state;
            match current {
                ReadyState::Closing | ReadyState::Closed => {
                    debug!(connection_id = %self.id, state = %current, "Close ignored");
                    return Ok(());
                }
                ReadyState::Connecting => {
                    state.finish(self.id, CloseFrame::abnormal(ABORTED_REASON));
                }
                ReadyState::Open => {
                    state.transition(self.id, ReadyState::Closing);
                }
            }
            current
        };

        debug!(
            connection_id = %self.id,
            code = %frame.code,
            reason = %frame.reason,
            from = %previous,
            "Close requested"
        );

        let result = match self.handle() {
            Some(handle) => handle.close(&frame),
            // Closed before the transport was started; there is nothing to abort.
            None if previous == ReadyState::Connecting => Ok(()),
            None => Err(Error::close("transport handle unavailable")),
        };

        if previous == ReadyState::Connecting {
            self.enqueue(Pending::Deliver(Event::closed(&CloseFrame::abnormal(
                ABORTED_REASON,
            ))));
        }

        let Err(err) = result else {
            return Ok(());
        };

        warn!(connection_id = %self.id, error = %err, "Transport faulted during close");

        let err = if err.is_close_error() {
            err
        } else {
            Error::close(err.to_string())
        };

        // The handshake can no longer complete; settle in Closed so cleanup still runs.
        if previous == ReadyState::Open {
            let frame = CloseFrame::abnormal(err.to_string());
            if self.state.lock().finish(self.id, frame.clone()) {
                self.enqueue(Pending::Deliver(Event::closed(&frame)));
            }
        }

        Err(err)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// One logical WebSocket session.
///
/// Created by [`ConnectionManager::open`](crate::ConnectionManager::open)
/// in state Connecting. Clones share the same session.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. `send` and `close` may be called from any
/// context, including from inside a listener.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

// ============================================================================
// Connection - Constructor
// ============================================================================

impl Connection {
    /// Creates a connection in state Connecting with no transport attached.
    ///
    /// Register listeners, then call [`start`](Self::start).
    pub(crate) fn new(request: &OpenRequest, binary_type: BinaryType) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: request.connection_id,
                url: request.url.clone(),
                state: Mutex::new(SessionState::new(binary_type)),
                listeners: Mutex::new(Listeners::default()),
                queue: Mutex::new(DeliveryQueue::default()),
                handle: OnceLock::new(),
            }),
        }
    }

    /// Opens the transport. Events flow from this point on.
    ///
    /// Does nothing if the connection was closed before starting.
    ///
    /// # Errors
    ///
    /// Propagates the transport's synchronous refusal as a connect error.
    pub(crate) fn start(&self, transport: &dyn Transport, request: &OpenRequest) -> Result<()> {
        let (ready_state, binary_type) = {
            let state = self.inner.state.lock();
            (state.ready_state, state.binary_type)
        };
        if self.inner.handle.get().is_some() {
            return Err(Error::connect(
                request.url.as_str(),
                "transport already started",
            ));
        }
        if ready_state != ReadyState::Connecting {
            debug!(connection_id = %self.inner.id, state = %ready_state, "Transport not started");
            return Ok(());
        }

        let weak = Arc::downgrade(&self.inner);
        let sink = EventSink::new(request.connection_id, move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.enqueue(Pending::Transport(event));
            }
        });

        let handle = transport.open(request, sink).map_err(|e| {
            if e.is_connect_error() {
                e
            } else {
                Error::connect(request.url.as_str(), e.to_string())
            }
        })?;
        handle.set_binary_type(binary_type);

        if self.inner.handle.set(handle).is_err() {
            return Err(Error::connect(
                request.url.as_str(),
                "transport already started",
            ));
        }

        debug!(connection_id = %request.connection_id, url = %request.url, "Transport started");

        Ok(())
    }

    /// Creates and starts a connection in one step.
    #[cfg(test)]
    pub(crate) fn open(
        transport: &dyn Transport,
        request: OpenRequest,
        binary_type: BinaryType,
    ) -> Result<Self> {
        let connection = Self::new(&request, binary_type);
        connection.start(transport, &request)?;
        Ok(connection)
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the connection ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the URL the connection was opened with.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.inner.state.lock().ready_state
    }

    /// Returns `true` if the state is Open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Returns the negotiated subprotocol (empty until Open).
    #[must_use]
    pub fn protocol(&self) -> String {
        self.inner.state.lock().protocol.clone()
    }

    /// Returns the negotiated extensions (empty until Open).
    #[must_use]
    pub fn extensions(&self) -> String {
        self.inner.state.lock().extensions.clone()
    }

    /// Returns bytes queued but not yet written.
    ///
    /// Advisory only; the value may be stale by the time it is read.
    #[must_use]
    pub fn buffered_amount(&self) -> u64 {
        self.inner
            .handle()
            .map_or(0, |handle| handle.buffered_amount())
    }

    /// Returns how received binary payloads are framed.
    #[inline]
    #[must_use]
    pub fn binary_type(&self) -> BinaryType {
        self.inner.state.lock().binary_type
    }

    /// Changes how received binary payloads are framed.
    pub fn set_binary_type(&self, binary_type: BinaryType) {
        self.inner.state.lock().binary_type = binary_type;
        if let Some(handle) = self.inner.handle() {
            handle.set_binary_type(binary_type);
        }
    }

    /// Returns the close frame recorded when the connection reached Closed.
    #[must_use]
    pub fn close_frame(&self) -> Option<CloseFrame> {
        self.inner.state.lock().close_frame.clone()
    }
}

// ============================================================================
// Connection - Operations
// ============================================================================

impl Connection {
    /// Sends a payload.
    ///
    /// Fire-and-forget: success means the transport accepted the payload.
    ///
    /// # Errors
    ///
    /// - [`Error::NotOpen`] if the state is not Open (the transport is not called)
    /// - [`Error::SendRejected`] if the transport rejects the payload
    pub fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            return Err(Error::not_open(state));
        }

        let payload = payload.into();
        let handle = self
            .inner
            .handle()
            .ok_or_else(|| Error::send_rejected("transport handle unavailable"))?;

        handle.send(&payload).map_err(|e| {
            if e.is_send_error() {
                e
            } else {
                Error::send_rejected(e.to_string())
            }
        })?;

        trace!(connection_id = %self.inner.id, bytes = payload.len(), "Payload queued");
        Ok(())
    }

    /// Closes the connection with normal closure (code 1000).
    ///
    /// Idempotent: closing a Closing or Closed connection succeeds without
    /// side effects. Closing while Connecting aborts the handshake and
    /// delivers `Closed` with code 1006.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Close`] if the transport faults synchronously.
    pub fn close(&self) -> Result<()> {
        self.inner.close(CloseFrame::normal())
    }

    /// Closes the connection with a caller-chosen code and reason.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCloseCode`] if `code` is not 1000 or 3000-4999
    /// - [`Error::CloseReasonTooLong`] if `reason` exceeds 123 bytes
    /// - [`Error::Close`] if the transport faults synchronously
    pub fn close_with(&self, code: CloseCode, reason: &str) -> Result<()> {
        let frame = CloseFrame::requested(code, reason)?;
        self.inner.close(frame)
    }
}

// ============================================================================
// Connection - Listeners
// ============================================================================

impl Connection {
    /// Registers a listener for one event kind.
    ///
    /// Listeners of the same kind run in registration order. Registering the
    /// same closure twice delivers every event twice. Registrations made
    /// after the connection delivered `Closed` are ignored.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.listeners.lock().add(kind, Arc::new(handler))
    }

    /// Removes one registration. Returns `false` if it was not found.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.listeners.lock().remove(id)
    }

    /// Returns the number of listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.lock().count(kind)
    }

    /// Returns a channel receiving every event from now on.
    ///
    /// The channel ends after `Closed` has been received. Dropping the
    /// receiver unsubscribes. Channels receive an event after every
    /// listener registered with [`on`](Self::on) has seen it.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        self.inner.listeners.lock().subscribe()
    }

    /// Returns the number of live [`subscribe`](Self::subscribe) channels.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().subscriber_count()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url.as_str())
            .field("ready_state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
