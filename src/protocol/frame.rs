//! WebSocket frame parsing and serialization (RFC 6455).
//!
//! Everything here is pure: parsing works on a byte slice that may hold a
//! partial frame, and encoding appends to a caller-supplied buffer.

use bytes::{BufMut, Bytes};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;

/// Largest payload length a 7-bit length field can carry.
pub const MAX_INLINE_PAYLOAD: usize = 125;

/// Largest payload length a 16-bit extended length field can carry.
pub const MAX_SHORT_PAYLOAD: usize = 65535;

/// Largest payload length the 64-bit extended length field may declare.
pub const MAX_PAYLOAD_LEN: u64 = i64::MAX as u64;

/// Length indicator announcing a 16-bit extended length.
const LEN_16: u8 = 126;

/// Length indicator announcing a 64-bit extended length.
const LEN_64: u8 = 127;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;

/// Decoded frame header.
///
/// `payload_len` is the same logical value whichever length encoding was
/// used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Declared payload length.
    pub payload_len: u64,
    /// Masking key, if the mask bit was set.
    pub mask: Option<[u8; 4]>,
    /// Bytes occupied by the header, mask key included.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a frame header from the start of `buf`.
    ///
    /// The opcode is checked as soon as the first two bytes are available,
    /// before the extended length or mask key are needed.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if `buf` ends inside the header
    /// - `Error::UnknownOpcode` for reserved opcodes
    /// - `Error::InvalidFrame` if the 64-bit length has its top bit set
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];

        let fin = (byte0 & FIN_BIT) != 0;
        let opcode = OpCode::from_u8(byte0 & 0x0F)?;
        let masked = (byte1 & MASK_BIT) != 0;

        let (payload_len, len_end) = match byte1 & 0x7F {
            LEN_16 => {
                if buf.len() < 4 {
                    return Err(Error::IncompleteFrame {
                        needed: 4 - buf.len(),
                    });
                }
                (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
            }
            LEN_64 => {
                if buf.len() < 10 {
                    return Err(Error::IncompleteFrame {
                        needed: 10 - buf.len(),
                    });
                }
                let len = u64::from_be_bytes([
                    buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
                ]);
                if len > MAX_PAYLOAD_LEN {
                    return Err(Error::InvalidFrame(format!(
                        "payload length {:#x} has the most significant bit set",
                        len
                    )));
                }
                (len, 10)
            }
            base => (u64::from(base), 2),
        };

        let (mask, header_len) = if masked {
            if buf.len() < len_end + 4 {
                return Err(Error::IncompleteFrame {
                    needed: len_end + 4 - buf.len(),
                });
            }
            let key = [buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]];
            (Some(key), len_end + 4)
        } else {
            (None, len_end)
        };

        Ok(Self {
            fin,
            opcode,
            payload_len,
            mask,
            header_len,
        })
    }

    /// Total bytes the frame occupies on the wire.
    ///
    /// # Errors
    ///
    /// Returns `Error::FrameTooLarge` if the frame cannot be addressed on
    /// this platform.
    pub fn frame_len(&self) -> Result<usize> {
        usize::try_from(self.payload_len)
            .ok()
            .and_then(|len| len.checked_add(self.header_len))
            .ok_or(Error::FrameTooLarge {
                size: self.payload_len,
                max: usize::MAX - self.header_len,
            })
    }
}

/// Number of header bytes needed for a payload of `payload_len` bytes.
#[must_use]
pub const fn header_len(payload_len: usize, masked: bool) -> usize {
    let extended = if payload_len <= MAX_INLINE_PAYLOAD {
        0
    } else if payload_len <= MAX_SHORT_PAYLOAD {
        2
    } else {
        8
    };
    let mask = if masked { 4 } else { 0 };
    2 + extended + mask
}

/// Append a frame header for a payload of `payload_len` bytes to `dst`.
///
/// The length uses the shortest encoding: literal up to 125, a 16-bit
/// extension up to 65535, a 64-bit extension beyond.
pub fn encode_header<B: BufMut>(
    dst: &mut B,
    fin: bool,
    opcode: OpCode,
    payload_len: usize,
    mask: Option<[u8; 4]>,
) {
    let mut byte0 = opcode.as_u8();
    if fin {
        byte0 |= FIN_BIT;
    }
    dst.put_u8(byte0);

    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    if payload_len <= MAX_INLINE_PAYLOAD {
        dst.put_u8(mask_bit | payload_len as u8);
    } else if payload_len <= MAX_SHORT_PAYLOAD {
        dst.put_u8(mask_bit | LEN_16);
        dst.put_u16(payload_len as u16);
    } else {
        dst.put_u8(mask_bit | LEN_64);
        dst.put_u64(payload_len as u64);
    }

    if let Some(key) = mask {
        dst.put_slice(&key);
    }
}

/// A WebSocket frame as defined in RFC 6455.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                         Masking key (if present)              |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
///
/// The payload is always held unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode defining the interpretation of payload data.
    pub opcode: OpCode,
    payload: Bytes,
}

impl Frame {
    /// Create a final frame with the given opcode and payload.
    #[must_use]
    pub fn new(opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            payload: payload.into(),
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Text, data)
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Binary, data)
    }

    pub(crate) fn from_parts(header: &FrameHeader, payload: Bytes) -> Self {
        Self {
            fin: header.fin,
            opcode: header.opcode,
            payload,
        }
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Parse a complete frame from the start of `buf`.
    ///
    /// Returns the frame, with its payload unmasked, and the number of
    /// bytes consumed.
    ///
    /// # Errors
    ///
    /// Everything [`FrameHeader::parse`] reports, plus
    /// `Error::IncompleteFrame` when the payload is not fully available.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;
        let total = header.frame_len()?;

        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let mut payload = buf[header.header_len..total].to_vec();
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }

        Ok((Self::from_parts(&header, Bytes::from(payload)), total))
    }

    /// Append the frame to `dst`, masking the payload if a key is given.
    ///
    /// Returns the number of bytes written.
    pub fn write<B: BufMut>(&self, dst: &mut B, mask: Option<[u8; 4]>) -> usize {
        encode_header(dst, self.fin, self.opcode, self.payload.len(), mask);
        match mask {
            Some(key) => {
                let mut masked = self.payload.to_vec();
                apply_mask_fast(&mut masked, key);
                dst.put_slice(&masked);
            }
            None => dst.put_slice(&self.payload),
        }
        self.wire_size(mask.is_some())
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        header_len(self.payload.len(), masked) + self.payload.len()
    }
}
