use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::codec::FrameCodec;
use crate::config::Config;
use crate::connection::ConnectionState;
use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// A server-side WebSocket connection over a byte transport.
///
/// `Connection` hides framing behind stream-style calls. A decoded message
/// larger than the caller's buffer is kept in a leftover buffer and handed
/// out across subsequent [`read`](Self::read) calls; no new frame is
/// decoded until that buffer is empty.
///
/// Methods take `&mut self`, so concurrent reads or writes on one
/// connection must be serialised by the caller.
///
/// ## Type Parameters
///
/// - `T`: The underlying transport (e.g., `TcpStream`, `DuplexStream`)
#[derive(Debug)]
pub struct Connection<T> {
    codec: FrameCodec<T>,
    state: ConnectionState,
    leftover: Bytes,
}

impl<T> Connection<T> {
    /// Wrap a transport on which the handshake has already completed.
    pub fn new(io: T, config: Config) -> Self {
        Self::from_codec(FrameCodec::new(io, config))
    }

    /// Wrap a transport whose read side already produced `buffered` bytes
    /// past the end of the handshake.
    pub(crate) fn with_buffered(io: T, config: Config, buffered: BytesMut) -> Self {
        Self::from_codec(FrameCodec::with_buffered(io, config, buffered))
    }

    fn from_codec(codec: FrameCodec<T>) -> Self {
        Self {
            codec,
            state: ConnectionState::Open,
            leftover: Bytes::new(),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the connection is open.
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Number of decoded payload bytes waiting to be read.
    pub fn buffered(&self) -> usize {
        self.leftover.len()
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.codec.get_ref()
    }

    fn drain_leftover(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.leftover.len());
        dst[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.advance(n);
        if self.leftover.is_empty() {
            // Release the frame's allocation.
            self.leftover = Bytes::new();
        }
        n
    }

    fn fail(&mut self, err: Error) -> Error {
        self.state = ConnectionState::Closed;
        err
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Read decoded payload bytes into `dst`.
    ///
    /// Serves the leftover buffer first. Otherwise decodes frames until a
    /// text or binary frame arrives, copies as much of its payload as fits
    /// and keeps the rest for the next call. Ping and pong frames are
    /// skipped without a reply.
    ///
    /// `Ok(0)` means an empty message was received, not end of stream.
    ///
    /// ## Errors
    ///
    /// - `Error::ConnectionClosed` if the peer sent a close frame
    /// - `Error::UnknownOpcode` for reserved opcodes and continuation frames
    /// - `Error::UnmaskedFrame`, `Error::FrameTooLarge`, `Error::InvalidFrame`
    ///   for malformed frames
    /// - `Error::Io` if the transport fails or ends
    /// - `Error::NotOpen` after any of the above
    pub async fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        if !self.state.is_open() {
            return Err(Error::NotOpen);
        }

        if !self.leftover.is_empty() {
            return Ok(self.drain_leftover(dst));
        }

        loop {
            let frame = match self.codec.read_frame().await {
                Ok(frame) => frame,
                Err(e) => return Err(self.fail(e)),
            };

            match frame.opcode {
                op if op.is_message() => {
                    self.leftover = frame.into_payload();
                    return Ok(self.drain_leftover(dst));
                }
                OpCode::Close => {
                    debug!("peer sent close frame");
                    return Err(self.fail(Error::ConnectionClosed));
                }
                op if op.is_control() => {
                    debug!(opcode = %op, len = frame.payload().len(), "control frame ignored");
                }
                // Fragmented messages are not reassembled.
                op => return Err(self.fail(Error::UnknownOpcode(op.as_u8()))),
            }
        }
    }

    /// Send `src` as one final text frame and flush.
    ///
    /// Returns the number of payload bytes sent, header excluded.
    ///
    /// ## Errors
    ///
    /// - `Error::Io` if the transport fails
    /// - `Error::NotOpen` if the connection already failed or closed
    pub async fn write(&mut self, src: &[u8]) -> Result<usize> {
        if !self.state.is_open() {
            return Err(Error::NotOpen);
        }

        if let Err(e) = self.codec.write_frame(OpCode::Text, src).await {
            return Err(self.fail(e));
        }
        if let Err(e) = self.codec.flush().await {
            return Err(self.fail(e));
        }

        Ok(src.len())
    }

    /// Close the connection and release the transport.
    ///
    /// No close frame is sent; the transport is shut down and dropped.
    pub async fn close(mut self) -> Result<()> {
        self.state = ConnectionState::Closed;
        self.leftover = Bytes::new();
        self.codec.shutdown().await
    }
}
