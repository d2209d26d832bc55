//! WebSocket opening handshake, server side (RFC 6455 Section 4.2).
//!
//! Parsing and validation here are pure; nothing is written until a request
//! has passed every check.

use crate::error::HandshakeError;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Parse HTTP header lines into a map keyed by lowercase header name.
///
/// When a header is repeated the first occurrence wins.
fn parse_headers<'a, I>(lines: I) -> Result<HashMap<String, String>, HandshakeError>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HandshakeError::Malformed(format!("invalid header line: {}", line)))?;
        headers
            .entry(name.trim().to_ascii_lowercase())
            .or_insert_with(|| value.trim().to_string());
    }

    Ok(headers)
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsstream::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Parsed HTTP request head of an upgrade attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The request method (e.g., "GET").
    pub method: String,
    /// The request path (e.g., "/ws/echo").
    pub path: String,
    headers: HashMap<String, String>,
}

impl HandshakeRequest {
    /// Parse a request head from raw HTTP data.
    ///
    /// Only the request line and header syntax are checked here; whether the
    /// request is a valid upgrade is decided by [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Malformed`] if:
    /// - The data is not valid UTF-8.
    /// - The request line is missing or does not have three parts.
    /// - The HTTP version is not `HTTP/1.1`.
    /// - A header line has no `:` separator.
    pub fn parse(data: &[u8]) -> Result<Self, HandshakeError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| HandshakeError::Malformed("request head is not valid UTF-8".into()))?;

        let mut lines = text.lines();

        // Request line: "GET /path HTTP/1.1"
        let request_line = lines
            .next()
            .ok_or_else(|| HandshakeError::Malformed("empty request".into()))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(HandshakeError::Malformed(format!(
                "invalid request line: {}",
                request_line
            )));
        }

        if parts[2] != "HTTP/1.1" {
            return Err(HandshakeError::Malformed(format!(
                "expected HTTP/1.1, got {}",
                parts[2]
            )));
        }

        let headers = parse_headers(lines)?;

        Ok(Self {
            method: parts[0].to_string(),
            path: parts[1].to_string(),
            headers,
        })
    }

    /// Look up a header value by case-insensitive name.
    /// The request path without its query string.
    #[must_use]
    pub fn route(&self) -> &str {
        self.path
            .split_once('?')
            .map_or(self.path.as_str(), |(path, _)| path)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Check the upgrade preconditions in order and return the client key.
    ///
    /// 1. `Connection` is `Upgrade`
    /// 2. `Upgrade` is `websocket`
    /// 3. `Sec-WebSocket-Version` is `13`
    /// 4. `Sec-WebSocket-Key` is not empty
    ///
    /// Values are compared exactly after trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns the [`HandshakeError`] naming the first precondition that
    /// does not hold.
    pub fn validate(&self) -> Result<&str, HandshakeError> {
        if self.header("connection") != Some("Upgrade") {
            return Err(HandshakeError::InvalidConnection);
        }

        if self.header("upgrade") != Some("websocket") {
            return Err(HandshakeError::InvalidUpgrade);
        }

        if self.header("sec-websocket-version") != Some("13") {
            return Err(HandshakeError::UnsupportedVersion);
        }

        match self.header("sec-websocket-key") {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(HandshakeError::MissingKey),
        }
    }
}

/// The server's `101 Switching Protocols` answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
}

impl HandshakeResponse {
    /// Create a response for the given client key.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        Self {
            accept: compute_accept_key(key),
        }
    }

    /// Validate a request and build the response for it.
    ///
    /// # Errors
    ///
    /// See [`HandshakeRequest::validate`].
    pub fn from_request(req: &HandshakeRequest) -> Result<Self, HandshakeError> {
        req.validate().map(Self::from_key)
    }

    /// Append the HTTP response to a buffer.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
}

/// Append a plain-text error response to a buffer.
///
/// The body is `message` followed by a newline and the connection is marked
/// for closing.
pub fn write_rejection(buf: &mut Vec<u8>, status: u16, reason: &str, message: &str) {
    let body = format!("{}\n", message);
    buf.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", status, reason).as_bytes());
    buf.extend_from_slice(b"Content-Type: text/plain; charset=utf-8\r\n");
    buf.extend_from_slice(b"X-Content-Type-Options: nosniff\r\n");
    buf.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    buf.extend_from_slice(b"Connection: close\r\n");
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(body.as_bytes());
}
