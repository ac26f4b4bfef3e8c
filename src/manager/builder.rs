//! Builder pattern for manager configuration.
//!
//! Provides a fluent API for configuring and creating [`ConnectionManager`]
//! instances.
//!
//! # Example
//!
//! ```ignore
//! use wsbridge::{BinaryType, ConnectionManager};
//!
//! let manager = ConnectionManager::builder()
//!     .native()
//!     .protocol("chat.v2")
//!     .binary_type(BinaryType::ArrayBuffer)
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::BinaryType;
use crate::transport::{NativeTransport, Transport};

use super::core::ConnectionManager;
use super::options::ConnectionOptions;

// ============================================================================
// ConnectionManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`] instance.
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ConnectionManagerBuilder {
    /// Transport used to open connections.
    transport: Option<Arc<dyn Transport>>,
    /// Options applied to every connection.
    options: ConnectionOptions,
}

// ============================================================================
// ConnectionManagerBuilder Implementation
// ============================================================================

impl ConnectionManagerBuilder {
    /// Creates a new builder with no transport.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Uses the tokio-tungstenite transport.
    #[inline]
    #[must_use]
    pub fn native(self) -> Self {
        self.transport(NativeTransport::new())
    }

    /// Uses the tokio-tungstenite transport with a handshake timeout.
    #[inline]
    #[must_use]
    pub fn native_with_timeout(self, limit: Duration) -> Self {
        self.transport(NativeTransport::new().with_connect_timeout(limit))
    }

    /// Replaces all connection options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a subprotocol offered during the handshake.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.options.protocols.push(protocol.into());
        self
    }

    /// Sets the initial binary framing mode.
    #[inline]
    #[must_use]
    pub fn binary_type(mut self, binary_type: BinaryType) -> Self {
        self.options.binary_type = binary_type;
        self
    }

    /// Builds the manager with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no transport was set
    /// - [`Error::InvalidProtocol`] if a subprotocol is malformed or repeated
    pub fn build(self) -> Result<ConnectionManager> {
        let transport = self.transport.ok_or_else(|| {
            Error::config(
                "A transport is required. Use .native() or .transport() to set it.\n\
                 Example: ConnectionManager::builder().native()",
            )
        })?;

        self.options.validate()?;

        Ok(ConnectionManager::from_parts(transport, self.options))
    }
}

impl fmt::Debug for ConnectionManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManagerBuilder")
            .field("has_transport", &self.transport.is_some())
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
