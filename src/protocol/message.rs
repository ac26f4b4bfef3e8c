//! Message payloads.
//!
//! A [`Payload`] is either UTF-8 text or raw bytes, matching the two data
//! frame types a WebSocket carries.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

// ============================================================================
// Payload
// ============================================================================

/// Outbound or inbound message data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Payload {
    /// Serializes a value into a JSON text payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::Text(serde_json::to_string(value)?))
    }

    /// Deserializes the payload as JSON.
    ///
    /// Binary payloads are parsed as UTF-8 JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the data is not valid JSON for `T`.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match self {
            Self::Text(text) => serde_json::from_str(text)?,
            Self::Binary(bytes) => serde_json::from_slice(bytes)?,
        };
        Ok(value)
    }

    /// Returns the payload size in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` if the payload carries no data.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the text, if this is a text payload.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the bytes, if this is a binary payload.
    #[inline]
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Text(_) => None,
            Self::Binary(bytes) => Some(bytes),
        }
    }

    /// Returns `true` for text payloads.
    #[inline]
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        seq: u32,
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Payload::from("hi"), Payload::Text("hi".into()));
        assert_eq!(Payload::from(vec![1, 2]), Payload::Binary(vec![1, 2]));
        assert_eq!(Payload::from(&[3u8][..]), Payload::Binary(vec![3]));
    }

    #[test]
    fn test_len_counts_bytes() {
        assert_eq!(Payload::from("héllo").len(), 6);
        assert_eq!(Payload::from(vec![0u8; 4]).len(), 4);
        assert!(Payload::from("").is_empty());
    }

    #[test]
    fn test_accessors() {
        let text = Payload::from("a");
        let binary = Payload::from(vec![1u8]);
        assert_eq!(text.as_text(), Some("a"));
        assert!(text.as_binary().is_none());
        assert_eq!(binary.as_binary(), Some(&[1u8][..]));
        assert!(!binary.is_text());
    }

    #[test]
    fn test_json_helpers() {
        let payload = Payload::json(&Ping { seq: 7 }).unwrap();
        assert_eq!(payload.as_text(), Some(r#"{"seq":7}"#));
        assert_eq!(payload.parse_json::<Ping>().unwrap(), Ping { seq: 7 });
    }

    #[test]
    fn test_parse_json_from_binary() {
        let payload = Payload::from(br#"{"seq":1}"#.to_vec());
        assert_eq!(payload.parse_json::<Ping>().unwrap(), Ping { seq: 1 });
    }

    #[test]
    fn test_parse_json_failure() {
        let err = Payload::from("nope").parse_json::<Ping>().unwrap_err();
        assert!(matches!(err, crate::Error::Json(_)));
    }
}
