//! Per-connection options.
//!
//! # Example
//!
//! ```ignore
//! use wsbridge::{BinaryType, ConnectionOptions};
//!
//! let options = ConnectionOptions::new()
//!     .with_protocol("chat.v2")
//!     .with_protocol("chat.v1")
//!     .with_binary_type(BinaryType::ArrayBuffer);
//! ```

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::protocol::BinaryType;

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Options applied to every connection a manager opens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Subprotocols offered during the handshake, in preference order.
    pub protocols: Vec<String>,

    /// Initial binary framing mode.
    pub binary_type: BinaryType,
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with no subprotocols and `blob` framing.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            protocols: Vec::new(),
            binary_type: BinaryType::Blob,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Adds a subprotocol.
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Adds multiple subprotocols.
    #[inline]
    #[must_use]
    pub fn with_protocols(mut self, protocols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.protocols.extend(protocols.into_iter().map(Into::into));
        self
    }

    /// Sets the initial binary framing mode.
    #[inline]
    #[must_use]
    pub fn with_binary_type(mut self, binary_type: BinaryType) -> Self {
        self.binary_type = binary_type;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionOptions {
    /// Checks that every subprotocol is a valid, unique HTTP token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProtocol`] for the first offending entry.
    pub fn validate(&self) -> Result<()> {
        let mut seen = FxHashSet::default();

        for protocol in &self.protocols {
            if protocol.is_empty() {
                return Err(Error::invalid_protocol(protocol, "must not be empty"));
            }
            if let Some(c) = protocol.chars().find(|c| !is_token_char(*c)) {
                return Err(Error::invalid_protocol(
                    protocol,
                    format!("contains invalid character {c:?}"),
                ));
            }
            if !seen.insert(protocol.as_str()) {
                return Err(Error::invalid_protocol(protocol, "listed more than once"));
            }
        }

        Ok(())
    }
}

/// RFC 7230 `tchar`.
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConnectionOptions::new();
        assert!(options.protocols.is_empty());
        assert_eq!(options.binary_type, BinaryType::Blob);
        assert_eq!(options, ConnectionOptions::default());
    }

    #[test]
    fn test_builder_chain() {
        let options = ConnectionOptions::new()
            .with_protocol("a")
            .with_protocols(["b", "c"])
            .with_binary_type(BinaryType::ArrayBuffer);

        assert_eq!(options.protocols, vec!["a", "b", "c"]);
        assert_eq!(options.binary_type, BinaryType::ArrayBuffer);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_protocol() {
        let err = ConnectionOptions::new().with_protocol("").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidProtocol { .. }));
    }

    #[test]
    fn test_rejects_separator_characters() {
        for bad in ["chat v2", "a,b", "x/y", "ü"] {
            let result = ConnectionOptions::new().with_protocol(bad).validate();
            assert!(result.is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = ConnectionOptions::new()
            .with_protocols(["chat", "chat"])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
