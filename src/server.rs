//! Server-side upgrade of a raw transport to a WebSocket [`Connection`].
//!
//! The opening handshake is split into steps so ownership of the transport
//! only moves into a [`Connection`] once the request has been accepted:
//!
//! 1. [`UpgradeRequest::read_from`] reads the HTTP request head;
//! 2. [`UpgradeRequest::negotiate`] validates it without writing anything;
//! 3. [`Upgrade::into_connection`] sends `101 Switching Protocols` and takes
//!    the transport, or [`reject`] answers with an error status instead.
//!
//! [`upgrade`] runs all of them for callers that do no routing of their own.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::{Config, Limits};
use crate::connection::Connection;
use crate::error::{Error, HandshakeError, Result};
use crate::protocol::handshake::write_rejection;
use crate::protocol::{HandshakeRequest, HandshakeResponse};
use crate::transport::Transport;

/// Length of the request head including its terminating blank line.
///
/// Lines may end in CRLF or a bare LF.
fn head_len(buf: &[u8]) -> Option<usize> {
    let mut start = 0;
    while let Some(pos) = buf[start..].iter().position(|&b| b == b'\n') {
        let next = start + pos + 1;
        match &buf[next..] {
            [b'\n', ..] => return Some(next + 1),
            [b'\r', b'\n', ..] => return Some(next + 2),
            _ => start = next,
        }
    }
    None
}

/// Reason phrase for the status codes this server answers with.
fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        431 => "Request Header Fields Too Large",
        _ => "Error",
    }
}

/// Status code answering a failed handshake.
pub fn rejection_status(err: &HandshakeError) -> u16 {
    match err {
        HandshakeError::TooLarge { .. } => 431,
        _ => 400,
    }
}

/// An HTTP request head read from a transport, not yet accepted.
#[derive(Debug)]
pub struct UpgradeRequest {
    request: HandshakeRequest,
    buffered: BytesMut,
}

impl UpgradeRequest {
    /// Read a request head from `io`.
    ///
    /// Reading stops at the blank line that ends the head. Anything the
    /// client sent after it is kept and later handed to the frame decoder.
    ///
    /// # Errors
    ///
    /// - `HandshakeError::TooLarge` if the head exceeds `limits.max_handshake_size`
    /// - `HandshakeError::Malformed` if the head is not a valid HTTP/1.1 request
    /// - `Error::Io` if the transport fails or ends before the head is complete
    pub async fn read_from<T>(io: &mut T, limits: &Limits) -> Result<Self>
    where
        T: AsyncRead + Unpin,
    {
        let mut buf = BytesMut::with_capacity(limits.max_handshake_size.min(1024));

        loop {
            if let Some(len) = head_len(&buf) {
                limits.check_handshake_size(len)?;
                let head = buf.split_to(len);
                let request = HandshakeRequest::parse(&head)?;
                debug!(
                    method = %request.method,
                    path = %request.path,
                    buffered = buf.len(),
                    "request head received"
                );
                return Ok(Self {
                    request,
                    buffered: buf,
                });
            }

            limits.check_handshake_size(buf.len())?;

            buf.reserve(1024);
            let n = io.read_buf(&mut buf).await?;
            if n == 0 {
                return Err(Error::unexpected_eof("handshake request"));
            }
        }
    }

    /// The parsed request head, for routing before negotiation.
    pub fn request(&self) -> &HandshakeRequest {
        &self.request
    }

    /// Number of bytes received past the end of the head.
    pub fn buffered(&self) -> usize {
        self.buffered.len()
    }

    /// Validate the request as a WebSocket upgrade.
    ///
    /// Consumes the request. Nothing is written to the transport; on failure
    /// the caller decides how to answer, typically with [`reject`].
    ///
    /// # Errors
    ///
    /// Returns the first failed check, in order: `InvalidConnection`,
    /// `InvalidUpgrade`, `UnsupportedVersion`, `MissingKey`.
    pub fn negotiate(self) -> std::result::Result<Upgrade, HandshakeError> {
        let response = HandshakeResponse::from_request(&self.request)?;
        Ok(Upgrade {
            response,
            buffered: self.buffered,
        })
    }
}

/// An accepted upgrade waiting for its transport.
#[derive(Debug)]
pub struct Upgrade {
    response: HandshakeResponse,
    buffered: BytesMut,
}

impl Upgrade {
    /// The `Sec-WebSocket-Accept` value that will be sent.
    pub fn accept_key(&self) -> &str {
        &self.response.accept
    }

    /// Send the `101 Switching Protocols` response and take ownership of
    /// `io` as a [`Connection`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the response cannot be written.
    pub async fn into_connection<T>(self, mut io: T, config: Config) -> Result<Connection<T>>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = Vec::with_capacity(160);
        self.response.write(&mut buf);
        io.write_all(&buf).await?;
        io.flush().await?;

        debug!(accept = %self.response.accept, "upgrade complete");
        Ok(Connection::with_buffered(io, config, self.buffered))
    }
}

/// Answer a request with a plain-text error response.
///
/// The body is `message` followed by a newline. The transport is left open;
/// dropping it closes the connection.
///
/// # Errors
///
/// Returns `Error::Io` if the response cannot be written.
pub async fn reject<T>(io: &mut T, status: u16, message: &str) -> Result<()>
where
    T: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(256);
    write_rejection(&mut buf, status, reason_phrase(status), message);
    io.write_all(&buf).await?;
    io.flush().await?;
    debug!(status, body = message, "request rejected");
    Ok(())
}

/// Answer a failed handshake with its [`rejection_status`].
///
/// Returns the handshake error so it can be propagated.
async fn reject_handshake<T>(io: &mut T, err: HandshakeError) -> Error
where
    T: AsyncWrite + Unpin,
{
    if let Err(e) = reject(io, rejection_status(&err), &err.to_string()).await {
        debug!(error = %e, "failed to send rejection");
    }
    Error::Handshake(err)
}

/// Read, validate and accept an upgrade request on `io`.
///
/// A request that fails validation is answered with `400 Bad Request`, or
/// `431 Request Header Fields Too Large` for an oversized head, and the
/// error is returned; the transport is dropped.
///
/// # Errors
///
/// - `Error::Handshake` if the request head is invalid or too large
/// - `Error::Io` if the transport fails
pub async fn upgrade<T: Transport>(mut io: T, config: Config) -> Result<Connection<T>> {
    let request = match UpgradeRequest::read_from(&mut io, &config.limits).await {
        Ok(request) => request,
        Err(Error::Handshake(err)) => return Err(reject_handshake(&mut io, err).await),
        Err(e) => return Err(e),
    };

    match request.negotiate() {
        Ok(upgrade) => upgrade.into_connection(io, config).await,
        Err(err) => Err(reject_handshake(&mut io, err).await),
    }
}
