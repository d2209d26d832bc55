use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, encode_header};
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::{Frame, OpCode};

/// Minimum spare capacity reserved before each transport read.
const READ_CHUNK: usize = 4096;

/// Frame reader/writer over a byte transport.
///
/// Incoming bytes are accumulated in a read buffer until a whole frame is
/// available, so frames split across transport reads (or several frames in
/// one read) decode the same way. Outgoing frames are assembled in a write
/// buffer and handed to the transport in a single `write_all`.
#[derive(Debug)]
pub struct FrameCodec<T> {
    io: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    config: Config,
}

impl<T> FrameCodec<T> {
    #[must_use]
    pub fn new(io: T, config: Config) -> Self {
        Self::with_buffered(io, config, BytesMut::new())
    }

    /// Create a codec whose read buffer starts with `buffered`.
    ///
    /// Used after the handshake when the client's first frame arrived in
    /// the same read as its request head.
    #[must_use]
    pub fn with_buffered(io: T, config: Config, buffered: BytesMut) -> Self {
        let mut read_buf = buffered;
        read_buf.reserve(config.read_buffer_size);
        Self {
            io,
            read_buf,
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            config,
        }
    }

    #[must_use]
    pub fn get_ref(&self) -> &T {
        &self.io
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }

    fn check_header(&self, header: &FrameHeader) -> Result<()> {
        if header.mask.is_none() && !self.config.accept_unmasked_frames {
            return Err(Error::UnmaskedFrame);
        }
        self.config.limits.check_frame_size(header.payload_len)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> FrameCodec<T> {
    /// Read the next complete frame, with its payload unmasked.
    ///
    /// The header is validated (opcode, mask bit, size limit) as soon as it
    /// is complete, before the payload is buffered.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            match FrameHeader::parse(&self.read_buf) {
                Ok(header) => {
                    self.check_header(&header)?;
                    let total = header.frame_len()?;

                    if self.read_buf.len() >= total {
                        let mut payload = self.read_buf.split_to(total);
                        payload.advance(header.header_len);
                        if let Some(mask) = header.mask {
                            apply_mask_fast(&mut payload, mask);
                        }
                        trace!(
                            opcode = %header.opcode,
                            fin = header.fin,
                            len = header.payload_len,
                            "frame decoded"
                        );
                        return Ok(Frame::from_parts(&header, payload.freeze()));
                    }

                    self.read_buf.reserve(total - self.read_buf.len());
                }
                Err(Error::IncompleteFrame { .. }) => {
                    self.read_buf.reserve(READ_CHUNK);
                }
                Err(e) => return Err(e),
            }

            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                let what = if self.read_buf.is_empty() {
                    "frame header"
                } else {
                    "frame"
                };
                return Err(Error::unexpected_eof(what));
            }
        }
    }

    /// Write one final, unmasked frame carrying `payload`.
    ///
    /// Does not flush.
    pub async fn write_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        self.write_buf.clear();
        encode_header(&mut self.write_buf, true, opcode, payload.len(), None);
        self.write_buf.extend_from_slice(payload);

        self.io.write_all(&self.write_buf).await?;
        trace!(opcode = %opcode, len = payload.len(), "frame written");
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }

    /// Shut down the write half of the transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}
