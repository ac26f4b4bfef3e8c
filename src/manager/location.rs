//! WebSocket URL handling.
//!
//! - [`normalize_url`] validates a caller-supplied URL before any transport
//!   is involved.
//! - [`ws_url`] derives a socket URL from the page a client was served from:
//!   plain `http` pages get `ws://`, everything else gets `wss://`.

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Functions
// ============================================================================

/// Parses and normalizes a WebSocket URL.
///
/// `http` and `https` are rewritten to `ws` and `wss`.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if the URL does not parse, has an
/// unsupported scheme, has no host, or carries a fragment.
pub fn normalize_url(input: &str) -> Result<Url> {
    let mut url = Url::parse(input).map_err(|e| Error::invalid_url(input, e.to_string()))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(Error::invalid_url(
                input,
                format!("unsupported scheme '{other}', expected ws or wss"),
            ));
        }
    };

    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(Error::invalid_url(input, "cannot rewrite scheme"));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::invalid_url(input, "missing host"));
    }

    if url.fragment().is_some() {
        return Err(Error::invalid_url(input, "fragments are not allowed"));
    }

    Ok(url)
}

/// Builds the socket URL for `relative` on the host that served `page`.
///
/// # Example
///
/// ```ignore
/// use url::Url;
/// use wsbridge::manager::ws_url;
///
/// let page = Url::parse("http://localhost:8080/index.html")?;
/// assert_eq!(ws_url(&page, "/live")?.as_str(), "ws://localhost:8080/live");
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if `page` has no host or the result is not
/// a valid WebSocket URL.
pub fn ws_url(page: &Url, relative: &str) -> Result<Url> {
    let host = page
        .host_str()
        .ok_or_else(|| Error::invalid_url(page.as_str(), "page URL has no host"))?;

    let scheme = if page.scheme() == "http" { "ws" } else { "wss" };
    let authority = match page.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };

    normalize_url(&format!("{scheme}://{authority}{relative}"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ws_and_wss() {
        assert_eq!(
            normalize_url("ws://example.test/a").unwrap().as_str(),
            "ws://example.test/a"
        );
        assert_eq!(
            normalize_url("wss://example.test/socket").unwrap().scheme(),
            "wss"
        );
    }

    #[test]
    fn test_rewrites_http_schemes() {
        assert_eq!(normalize_url("http://example.test/").unwrap().scheme(), "ws");
        assert_eq!(
            normalize_url("https://example.test/").unwrap().scheme(),
            "wss"
        );
    }

    #[test]
    fn test_rejects_garbage() {
        let err = normalize_url("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_rejects_other_schemes() {
        let err = normalize_url("ftp://example.test/").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_rejects_fragment() {
        assert!(normalize_url("ws://example.test/#top").is_err());
    }

    #[test]
    fn test_ws_url_for_http_page() {
        let page = Url::parse("http://localhost:8080/index.html").unwrap();
        assert_eq!(
            ws_url(&page, "/live").unwrap().as_str(),
            "ws://localhost:8080/live"
        );
    }

    #[test]
    fn test_ws_url_for_https_page() {
        let page = Url::parse("https://app.example.test/dashboard").unwrap();
        assert_eq!(
            ws_url(&page, "/feed?x=1").unwrap().as_str(),
            "wss://app.example.test/feed?x=1"
        );
    }

    #[test]
    fn test_ws_url_requires_host() {
        let page = Url::parse("data:text/plain,hello").unwrap();
        assert!(ws_url(&page, "/x").is_err());
    }
}
