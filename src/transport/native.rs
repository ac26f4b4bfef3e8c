//! WebSocket transport backed by tokio-tungstenite.
//!
//! # Session Task
//!
//! Each [`Transport::open`] spawns one tokio task that owns the socket:
//!
//! - Performs the client handshake (optionally bounded by a timeout)
//! - Reports the negotiated subprotocol and extensions
//! - Forwards inbound text/binary frames to the [`EventSink`]
//! - Serves send/close commands from the owning connection
//! - Keeps the buffered byte counter current
//!
//! Faults are reported as an `error` event followed by a `close` event with
//! code 1006. Data frames sent after either side started the closing
//! handshake are dropped, so a clean close stays clean. Dropping every clone of the connection closes the socket.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::{Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue, header};
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{CloseCode, CloseFrame, Payload, TransportEvent};

use super::{EventSink, OpenRequest, Transport, TransportHandle};

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the session task.
enum SessionCommand {
    /// Write a data frame.
    Send(Payload),
    /// Start the closing handshake.
    Close(CloseFrame),
}

// ============================================================================
// NativeTransport
// ============================================================================

/// Transport opening real WebSocket connections.
///
/// Requires a running tokio runtime when [`Transport::open`] is called.
/// `wss://` URLs need the `native-tls` feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeTransport {
    /// Upper bound for the opening handshake.
    connect_timeout: Option<Duration>,
}

impl NativeTransport {
    /// Creates a transport without a handshake timeout.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: None,
        }
    }

    /// Bounds the opening handshake.
    ///
    /// A handshake that does not finish in time is reported as an error
    /// event followed by a close event.
    #[inline]
    #[must_use]
    pub const fn with_connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = Some(limit);
        self
    }

    /// Returns the handshake timeout, if any.
    #[inline]
    #[must_use]
    pub const fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }
}

impl Transport for NativeTransport {
    fn open(&self, request: &OpenRequest, sink: EventSink) -> Result<Box<dyn TransportHandle>> {
        let runtime = Handle::try_current().map_err(|e| {
            Error::connect(request.url.as_str(), format!("no tokio runtime: {e}"))
        })?;

        let handshake = build_handshake(request)?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let buffered = Arc::new(AtomicU64::new(0));

        runtime.spawn(run_session(
            handshake,
            command_rx,
            sink,
            Arc::clone(&buffered),
            self.connect_timeout,
        ));

        debug!(
            connection_id = %request.connection_id,
            url = %request.url,
            "Session task spawned"
        );

        Ok(Box::new(NativeHandle {
            command_tx,
            buffered,
        }))
    }
}

/// Builds the handshake request, rejecting anything tungstenite would refuse.
fn build_handshake(request: &OpenRequest) -> Result<Request> {
    let mut handshake = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::connect(request.url.as_str(), e.to_string()))?;

    if !request.protocols.is_empty() {
        let joined = request.protocols.join(", ");
        let value = HeaderValue::from_str(&joined)
            .map_err(|e| Error::invalid_protocol(joined.clone(), e.to_string()))?;
        handshake
            .headers_mut()
            .insert(header::SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok(handshake)
}

/// Reads a handshake response header, empty if absent.
fn header_value(response: &Response, name: HeaderName) -> String {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// Converts an inbound close frame.
fn close_frame_from_wire(frame: Option<WsCloseFrame>) -> CloseFrame {
    match frame {
        Some(frame) => CloseFrame {
            code: CloseCode::new(u16::from(frame.code)),
            reason: frame.reason.as_str().to_owned(),
            was_clean: true,
        },
        None => CloseFrame {
            code: CloseCode::NO_STATUS,
            reason: String::new(),
            was_clean: true,
        },
    }
}

/// Reports an unrecoverable fault.
fn fail(sink: &EventSink, diagnostic: String) {
    warn!(connection_id = %sink.connection_id(), %diagnostic, "Session failed");
    sink.emit(TransportEvent::error(diagnostic));
    sink.emit(TransportEvent::close(CloseFrame::abnormal("")));
}

// ============================================================================
// Session Task
// ============================================================================

/// Owns the socket for one connection until it closes.
async fn run_session(
    handshake: Request,
    mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    sink: EventSink,
    buffered: Arc<AtomicU64>,
    connect_timeout: Option<Duration>,
) {
    let id = sink.connection_id();

    let connect = async {
        match connect_timeout {
            Some(limit) => match timeout(limit, connect_async(handshake)).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("handshake timed out after {}ms", limit.as_millis())),
            },
            None => connect_async(handshake).await.map_err(|e| e.to_string()),
        }
    };

    let (ws_stream, response) = tokio::select! {
        result = connect => match result {
            Ok(pair) => pair,
            Err(diagnostic) => {
                fail(&sink, diagnostic);
                return;
            }
        },

        // Only close requests or a dropped connection can arrive before Open
        _ = command_rx.recv() => {
            debug!(connection_id = %id, "Handshake abandoned");
            return;
        }
    };

    let protocol = header_value(&response, header::SEC_WEBSOCKET_PROTOCOL);
    let extensions = header_value(&response, header::SEC_WEBSOCKET_EXTENSIONS);
    debug!(connection_id = %id, %protocol, %extensions, "Handshake completed");
    sink.emit(TransportEvent::open(protocol, extensions));

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut remote_close: Option<CloseFrame> = None;
    let mut local_close: Option<CloseFrame> = None;

    loop {
        tokio::select! {
            // Incoming frames
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        sink.emit(TransportEvent::Message(Payload::Text(text.as_str().to_owned())));
                    }

                    Some(Ok(Message::Binary(data))) => {
                        sink.emit(TransportEvent::Message(Payload::Binary(data.to_vec())));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        // tungstenite answers the close; keep reading until the stream ends
                        trace!(connection_id = %id, "Close frame received");
                        remote_close = Some(close_frame_from_wire(frame));
                    }

                    Some(Err(e)) => {
                        fail(&sink, e.to_string());
                        break;
                    }

                    None => {
                        let frame = remote_close
                            .take()
                            .or_else(|| local_close.take().map(|frame| CloseFrame { was_clean: false, ..frame }))
                            .unwrap_or_else(|| CloseFrame::abnormal(""));
                        debug!(connection_id = %id, code = %frame.code, "WebSocket stream ended");
                        sink.emit(TransportEvent::close(frame));
                        break;
                    }

                    // Ping, Pong and raw frames are handled by tungstenite
                    Some(Ok(_)) => {}
                }
            }

            // Commands from the connection
            command = command_rx.recv() => {
                match command {
                    Some(SessionCommand::Send(payload)) => {
                        let len = payload.len() as u64;

                        // tungstenite refuses data frames once either side sent a close
                        if remote_close.is_some() || local_close.is_some() {
                            buffered.fetch_sub(len, Ordering::AcqRel);
                            trace!(connection_id = %id, bytes = len, "Dropping frame after close");
                            continue;
                        }

                        let message = match payload {
                            Payload::Text(text) => Message::text(text),
                            Payload::Binary(data) => Message::binary(data),
                        };
                        let result = ws_write.send(message).await;
                        buffered.fetch_sub(len, Ordering::AcqRel);

                        if let Err(e) = result {
                            fail(&sink, e.to_string());
                            break;
                        }
                        trace!(connection_id = %id, bytes = len, "Frame written");
                    }

                    Some(SessionCommand::Close(frame)) => {
                        if remote_close.is_some() || local_close.is_some() {
                            debug!(connection_id = %id, "Close handshake already in progress");
                            continue;
                        }

                        let wire = WsCloseFrame {
                            code: WsCloseCode::from(frame.code.as_u16()),
                            reason: frame.reason.clone().into(),
                        };
                        if let Err(e) = ws_write.send(Message::Close(Some(wire))).await {
                            fail(&sink, e.to_string());
                            break;
                        }
                        debug!(connection_id = %id, code = %frame.code, "Close frame sent");
                        local_close = Some(frame);
                    }

                    None => {
                        debug!(connection_id = %id, "Connection dropped, closing socket");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    debug!(connection_id = %id, "Session task terminated");
}

// ============================================================================
// NativeHandle
// ============================================================================

/// Handle to a session task.
struct NativeHandle {
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    buffered: Arc<AtomicU64>,
}

impl TransportHandle for NativeHandle {
    fn send(&self, payload: &Payload) -> Result<()> {
        let len = payload.len() as u64;
        self.buffered.fetch_add(len, Ordering::AcqRel);

        if self
            .command_tx
            .send(SessionCommand::Send(payload.clone()))
            .is_err()
        {
            self.buffered.fetch_sub(len, Ordering::AcqRel);
            return Err(Error::send_rejected("session task has stopped"));
        }
        Ok(())
    }

    fn close(&self, frame: &CloseFrame) -> Result<()> {
        if self
            .command_tx
            .send(SessionCommand::Close(frame.clone()))
            .is_err()
        {
            debug!("Close requested after session task stopped");
        }
        Ok(())
    }

    fn buffered_amount(&self) -> u64 {
        self.buffered.load(Ordering::Acquire)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;
    use url::Url;

    use crate::identifiers::ConnectionId;

    const WAIT: Duration = Duration::from_secs(5);

    fn request(url: &str) -> OpenRequest {
        OpenRequest {
            connection_id: ConnectionId::generate(),
            url: Url::parse(url).unwrap(),
            protocols: Vec::new(),
        }
    }

    fn channel_sink() -> (EventSink, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(ConnectionId::generate(), move |event| {
            let _ = tx.send(event);
        });
        (sink, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("event should arrive")
            .expect("sink should stay open")
    }

    /// Accepts one connection and echoes data frames until it closes.
    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if (message.is_text() || message.is_binary()) && ws.send(message).await.is_err() {
                    break;
                }
            }
        });

        format!("ws://{addr}/")
    }

    #[test]
    fn test_open_without_runtime_is_connect_error() {
        let (sink, _rx) = channel_sink();
        let err = NativeTransport::new()
            .open(&request("ws://127.0.0.1:1/"), sink)
            .err()
            .unwrap();
        assert!(err.is_connect_error());
    }

    #[test]
    fn test_connect_timeout_builder() {
        let transport = NativeTransport::new().with_connect_timeout(Duration::from_secs(2));
        assert_eq!(transport.connect_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(NativeTransport::default().connect_timeout(), None);
    }

    #[test]
    fn test_handshake_carries_protocols() {
        let mut req = request("ws://example.test/chat");
        req.protocols = vec!["v1".into(), "v2".into()];

        let handshake = build_handshake(&req).unwrap();
        assert_eq!(
            handshake.headers().get(header::SEC_WEBSOCKET_PROTOCOL).unwrap(),
            "v1, v2"
        );
    }

    #[test]
    fn test_close_frame_from_wire_without_payload() {
        let frame = close_frame_from_wire(None);
        assert_eq!(frame.code, CloseCode::NO_STATUS);
        assert!(frame.was_clean);
    }

    #[tokio::test]
    async fn test_refused_connection_reports_error_then_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (sink, mut rx) = channel_sink();
        let _handle = NativeTransport::new()
            .open(&request(&format!("ws://127.0.0.1:{port}/")), sink)
            .unwrap();

        assert!(matches!(next(&mut rx).await, TransportEvent::Error { .. }));
        assert_eq!(
            next(&mut rx).await,
            TransportEvent::close(CloseFrame::abnormal(""))
        );
    }

    #[tokio::test]
    async fn test_echo_round_trip_and_clean_close() {
        let url = echo_server().await;
        let (sink, mut rx) = channel_sink();
        let handle = NativeTransport::new()
            .with_connect_timeout(WAIT)
            .open(&request(&url), sink)
            .unwrap();

        assert_eq!(next(&mut rx).await, TransportEvent::open("", ""));

        handle.send(&Payload::from("hello")).unwrap();
        assert_eq!(
            next(&mut rx).await,
            TransportEvent::Message(Payload::from("hello"))
        );

        handle.send(&Payload::from(vec![1u8, 2])).unwrap();
        assert_eq!(
            next(&mut rx).await,
            TransportEvent::Message(Payload::from(vec![1u8, 2]))
        );
        assert_eq!(handle.buffered_amount(), 0);

        handle.close(&CloseFrame::normal()).unwrap();
        assert_eq!(
            next(&mut rx).await,
            TransportEvent::close(CloseFrame::normal())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_send_after_remote_close_keeps_close_clean() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let frame = WsCloseFrame {
                code: WsCloseCode::from(4001),
                reason: "bye".into(),
            };
            ws.send(Message::Close(Some(frame))).await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            while ws.next().await.is_some() {}
        });

        let (sink, mut rx) = channel_sink();
        let handle = NativeTransport::new()
            .open(&request(&format!("ws://{addr}/")), sink)
            .unwrap();

        assert_eq!(next(&mut rx).await, TransportEvent::open("", ""));
        tokio::time::sleep(Duration::from_millis(100)).await;

        handle.send(&Payload::from("late")).unwrap();
        handle.close(&CloseFrame::normal()).unwrap();

        assert_eq!(
            next(&mut rx).await,
            TransportEvent::Close {
                code: CloseCode::new(4001),
                reason: "bye".into(),
                was_clean: true,
            }
        );
        assert_eq!(handle.buffered_amount(), 0);
    }
}
