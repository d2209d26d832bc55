//! Echo endpoint: routing, upgrade and the per-connection echo loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{Instrument, Span, debug, error, info, info_span};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::server::{UpgradeRequest, reject, rejection_status};
use crate::transport::Transport;

/// Default route served by the echo endpoint.
pub const DEFAULT_PATH: &str = "/ws/echo";

/// Default size of the per-connection read buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 512;

/// Serves one WebSocket route that writes every received chunk back.
///
/// Each `read` on the connection is answered by one `write` of the same
/// bytes, so a message larger than the buffer comes back as several text
/// frames.
#[derive(Debug, Clone)]
pub struct EchoEndpoint {
    path: String,
    config: Config,
    buffer_size: usize,
}

impl Default for EchoEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_PATH, Config::server())
    }
}

impl EchoEndpoint {
    /// Create an endpoint answering upgrades on `path`.
    pub fn new(path: impl Into<String>, config: Config) -> Self {
        Self {
            path: path.into(),
            config,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Set the read buffer size. A size of zero is raised to one.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// The route answering upgrades, matched without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bytes read from a connection per echo.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Accept connections from `listener` forever, one task each.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` only if the listener's local address cannot be read.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!(address = %local, path = %self.path, "server started");

        let endpoint = Arc::new(self);
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let endpoint = Arc::clone(&endpoint);
                    let span = info_span!("conn", peer = %addr);
                    tokio::spawn(async move {
                        if let Err(e) = endpoint.handle(stream, span.clone()).await {
                            span.in_scope(|| debug!(error = %e, "connection ended with error"));
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    /// Run one connection to completion inside `span`.
    ///
    /// A request for another path gets `404 Not Found`, a non-GET request
    /// `405 Method Not Allowed`, and a failed upgrade `400 Bad Request`
    /// (`431` when the request head is too large). The query string is
    /// ignored when matching the path.
    ///
    /// Once upgraded, the session ends normally at the first read error.
    ///
    /// # Errors
    ///
    /// - `Error::Handshake` if the upgrade request is invalid
    /// - `Error::Io` if the transport fails before the upgrade completes
    pub async fn handle<T: Transport>(&self, io: T, span: Span) -> Result<()> {
        self.session(io).instrument(span).await
    }

    async fn session<T: Transport>(&self, mut io: T) -> Result<()> {
        let request = match UpgradeRequest::read_from(&mut io, &self.config.limits).await {
            Ok(request) => request,
            Err(Error::Handshake(err)) => {
                info!(error = %err, "failed to upgrade connection");
                reject(&mut io, rejection_status(&err), &err.to_string()).await?;
                return Err(err.into());
            }
            Err(e) => return Err(e),
        };

        if request.request().route() != self.path {
            debug!(path = %request.request().path, "no route");
            return reject(&mut io, 404, "404 page not found").await;
        }
        if request.request().method != "GET" {
            debug!(method = %request.request().method, "method not allowed");
            return reject(&mut io, 405, "Method Not Allowed").await;
        }

        let upgrade = match request.negotiate() {
            Ok(upgrade) => upgrade,
            Err(err) => {
                info!(error = %err, "failed to upgrade connection");
                reject(&mut io, rejection_status(&err), &err.to_string()).await?;
                return Err(err.into());
            }
        };

        let mut conn = upgrade.into_connection(io, self.config.clone()).await?;
        info!("client connected");

        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = match conn.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    info!(reason = %e, "client disconnected");
                    break;
                }
            };

            debug!(bytes = n, "read from client");
            debug!(text = %String::from_utf8_lossy(&buf[..n]), "message");

            if let Err(e) = conn.write(&buf[..n]).await {
                info!(error = %e, "failed to echo, closing");
                break;
            }
        }

        if let Err(e) = conn.close().await {
            debug!(error = %e, "transport shutdown failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HandshakeError;
    use crate::protocol::{Frame, OpCode};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn request(method: &str, path: &str, with_key: bool) -> Vec<u8> {
        let mut raw = format!(
            "{} {} HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\n\
             Upgrade: websocket\r\nSec-WebSocket-Version: 13\r\n",
            method, path
        );
        if with_key {
            raw.push_str(&format!("Sec-WebSocket-Key: {}\r\n", KEY));
        }
        raw.push_str("\r\n");
        raw.into_bytes()
    }

    /// Send `input`, half-close, and collect everything the endpoint wrote.
    async fn exchange(endpoint: &EchoEndpoint, input: Vec<u8>) -> (Result<()>, Vec<u8>) {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(&input).await.unwrap();
        client.shutdown().await.unwrap();

        let result = endpoint.handle(server, Span::none()).await;

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        (result, output)
    }

    fn split_head(output: &[u8]) -> (String, &[u8]) {
        let end = output
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map(|p| p + 4)
            .unwrap();
        (
            String::from_utf8(output[..end].to_vec()).unwrap(),
            &output[end..],
        )
    }

    fn parse_frames(mut data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        while !data.is_empty() {
            let (frame, used) = Frame::parse(data).unwrap();
            frames.push(frame);
            data = &data[used..];
        }
        frames
    }

    #[test]
    fn test_defaults() {
        let endpoint = EchoEndpoint::default();
        assert_eq!(endpoint.path(), "/ws/echo");
        assert_eq!(endpoint.buffer_size(), 512);
        assert_eq!(endpoint.with_buffer_size(0).buffer_size(), 1);
    }

    #[tokio::test]
    async fn test_echoes_text() {
        let mut input = request("GET", "/ws/echo", true);
        Frame::text("Hello").write(&mut input, Some([0x37, 0xfa, 0x21, 0x3d]));

        let (result, output) = exchange(&EchoEndpoint::default(), input).await;
        assert!(result.is_ok());

        let (head, rest) = split_head(&output);
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(head.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));

        let frames = parse_frames(rest);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode, OpCode::Text);
        assert!(frames[0].fin);
        assert_eq!(frames[0].payload(), b"Hello");
    }

    #[tokio::test]
    async fn test_binary_echoed_as_text() {
        let mut input = request("GET", "/ws/echo", true);
        Frame::binary(vec![0u8, 1, 2, 255]).write(&mut input, Some([9, 8, 7, 6]));

        let (_, output) = exchange(&EchoEndpoint::default(), input).await;
        let (_, rest) = split_head(&output);
        let frames = parse_frames(rest);
        assert_eq!(frames[0].opcode, OpCode::Text);
        assert_eq!(frames[0].payload(), &[0u8, 1, 2, 255]);
    }

    #[tokio::test]
    async fn test_large_message_echoed_in_buffer_sized_chunks() {
        let payload: Vec<u8> = (0..25u8).collect();
        let mut input = request("GET", "/ws/echo", true);
        Frame::binary(payload.clone()).write(&mut input, Some([1, 2, 3, 4]));

        let endpoint = EchoEndpoint::default().with_buffer_size(10);
        let (_, output) = exchange(&endpoint, input).await;
        let (_, rest) = split_head(&output);

        let frames = parse_frames(rest);
        let sizes: Vec<usize> = frames.iter().map(|f| f.payload().len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        let joined: Vec<u8> = frames.iter().flat_map(|f| f.payload().to_vec()).collect();
        assert_eq!(joined, payload);
    }

    #[tokio::test]
    async fn test_ping_is_not_echoed() {
        let mut input = request("GET", "/ws/echo", true);
        Frame::new(OpCode::Ping, "ping").write(&mut input, Some([1, 1, 1, 1]));
        Frame::text("after").write(&mut input, Some([2, 2, 2, 2]));

        let (_, output) = exchange(&EchoEndpoint::default(), input).await;
        let (_, rest) = split_head(&output);
        let frames = parse_frames(rest);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"after");
    }

    #[tokio::test]
    async fn test_close_frame_ends_session() {
        let mut input = request("GET", "/ws/echo", true);
        Frame::new(OpCode::Close, vec![0x03u8, 0xe8]).write(&mut input, Some([1, 2, 3, 4]));
        Frame::text("ignored").write(&mut input, Some([1, 2, 3, 4]));

        let (result, output) = exchange(&EchoEndpoint::default(), input).await;
        assert!(result.is_ok());
        let (_, rest) = split_head(&output);
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_path_is_404() {
        let input = request("GET", "/other", true);
        let (result, output) = exchange(&EchoEndpoint::default(), input).await;
        assert!(result.is_ok());
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let input = request("POST", "/ws/echo", true);
        let (result, output) = exchange(&EchoEndpoint::default(), input).await;
        assert!(result.is_ok());
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    }

    #[tokio::test]
    async fn test_failed_upgrade_is_400() {
        let input = request("GET", "/ws/echo", false);
        let (result, output) = exchange(&EchoEndpoint::default(), input).await;
        assert_eq!(
            result.unwrap_err(),
            Error::Handshake(HandshakeError::MissingKey)
        );
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.ends_with("missing 'sec-websocket-key' header\n"));
    }

    #[tokio::test]
    async fn test_custom_path() {
        let endpoint = EchoEndpoint::new("/chat", Config::server());
        let mut input = request("GET", "/chat", true);
        Frame::text("hi").write(&mut input, Some([5, 6, 7, 8]));

        let (_, output) = exchange(&endpoint, input).await;
        let (head, rest) = split_head(&output);
        assert!(head.starts_with("HTTP/1.1 101"));
        assert_eq!(parse_frames(rest)[0].payload(), b"hi");
    }

    #[tokio::test]
    async fn test_query_string_ignored_by_routing() {
        let mut input = request("GET", "/ws/echo?token=abc", true);
        Frame::text("query").write(&mut input, Some([3, 1, 4, 1]));

        let (result, output) = exchange(&EchoEndpoint::default(), input).await;
        assert!(result.is_ok());

        let (head, rest) = split_head(&output);
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert_eq!(parse_frames(rest)[0].payload(), b"query");
    }

    #[tokio::test]
    async fn test_query_string_does_not_widen_route() {
        for target in ["/ws/echoes", "/other?next=/ws/echo", "/ws"] {
            let (_, output) = exchange(&EchoEndpoint::default(), request("GET", target, true)).await;
            let text = String::from_utf8(output).unwrap();
            assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"), "{}", target);
        }
    }

    #[tokio::test]
    async fn test_oversized_head_is_431() {
        let config = Config::server().with_limits(crate::Limits::new(1024, 64));
        let endpoint = EchoEndpoint::new(DEFAULT_PATH, config);

        let (result, output) = exchange(&endpoint, request("GET", "/ws/echo", true)).await;
        assert!(matches!(
            result,
            Err(Error::Handshake(HandshakeError::TooLarge { max: 64, .. }))
        ));
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));
    }
}
