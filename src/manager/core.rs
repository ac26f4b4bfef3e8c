//! Connection manager.
//!
//! The [`ConnectionManager`] validates URLs and options, then hands each
//! open request to its transport. Every call to [`ConnectionManager::open`]
//! produces an independent [`Connection`].
//!
//! # Example
//!
//! ```ignore
//! use wsbridge::{ConnectionManager, EventKind};
//!
//! let manager = ConnectionManager::native();
//! let connection = manager.open_with("ws://localhost:9001/echo", |connection| {
//!     connection.on(EventKind::Opened, |_| println!("open"));
//! })?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::transport::{Connection, NativeTransport, OpenRequest, Transport};

use super::builder::ConnectionManagerBuilder;
use super::location::{normalize_url, ws_url};
use super::options::ConnectionOptions;

// ============================================================================
// ConnectionManager
// ============================================================================

/// Factory for WebSocket connections.
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    options: ConnectionOptions,
}

// ============================================================================
// ConnectionManager - Display
// ============================================================================

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructors
// ============================================================================

impl ConnectionManager {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Creates a manager with default options over `transport`.
    #[must_use]
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_parts(Arc::new(transport), ConnectionOptions::default())
    }

    /// Creates a manager backed by tokio-tungstenite.
    #[must_use]
    pub fn native() -> Self {
        Self::new(NativeTransport::new())
    }

    pub(crate) fn from_parts(transport: Arc<dyn Transport>, options: ConnectionOptions) -> Self {
        Self { transport, options }
    }
}

// ============================================================================
// ConnectionManager - Public API
// ============================================================================

impl ConnectionManager {
    /// Returns the options applied to new connections.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Opens a connection to `url`.
    ///
    /// The returned connection starts in state Connecting. The transport is
    /// already running, so listeners registered afterwards only see events
    /// dispatched after they were added. Use [`open_with`](Self::open_with)
    /// to register listeners before the transport can report anything.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`](crate::Error::InvalidUrl) if the URL is malformed
    /// - [`Error::InvalidProtocol`](crate::Error::InvalidProtocol) if the options are invalid
    /// - [`Error::Connect`](crate::Error::Connect) if the transport refuses synchronously
    pub fn open(&self, url: &str) -> Result<Connection> {
        self.open_with(url, |_| {})
    }

    /// Opens a connection to `url`, running `setup` before the transport starts.
    ///
    /// Listeners and channels registered in `setup` observe every event of
    /// the connection, including a handshake that fails immediately.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let connection = manager.open_with("ws://localhost:9001/", |connection| {
    ///     connection.on(EventKind::Errored, |event| eprintln!("{event:?}"));
    /// })?;
    /// ```
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with<F>(&self, url: &str, setup: F) -> Result<Connection>
    where
        F: FnOnce(&Connection),
    {
        self.options.validate().inspect_err(log_rejected)?;
        let url = normalize_url(url).inspect_err(log_rejected)?;
        self.start(url, setup)
    }

    /// Opens a connection to `relative` on the host that served `page`.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_relative(&self, page: &Url, relative: &str) -> Result<Connection> {
        self.open_relative_with(page, relative, |_| {})
    }

    /// Like [`open_relative`](Self::open_relative), with a setup step as in
    /// [`open_with`](Self::open_with).
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_relative_with<F>(&self, page: &Url, relative: &str, setup: F) -> Result<Connection>
    where
        F: FnOnce(&Connection),
    {
        self.options.validate().inspect_err(log_rejected)?;
        let url = ws_url(page, relative).inspect_err(log_rejected)?;
        self.start(url, setup)
    }

    fn start<F>(&self, url: Url, setup: F) -> Result<Connection>
    where
        F: FnOnce(&Connection),
    {
        let request = OpenRequest {
            connection_id: ConnectionId::generate(),
            url,
            protocols: self.options.protocols.clone(),
        };

        debug!(
            connection_id = %request.connection_id,
            url = %request.url,
            protocols = ?request.protocols,
            "Opening connection"
        );

        let connection = Connection::new(&request, self.options.binary_type);
        setup(&connection);

        connection
            .start(&*self.transport, &request)
            .inspect_err(log_rejected)?;

        info!(connection_id = %request.connection_id, url = %request.url, "Connection opening");

        Ok(connection)
    }
}

/// Logs a synchronous open failure.
fn log_rejected(err: &Error) {
    if err.is_usage_error() {
        debug!(error = %err, "Open request rejected");
    } else {
        warn!(error = %err, "Transport refused connection");
    }
}

// ============================================================================
// Tests
// ============================================================================
