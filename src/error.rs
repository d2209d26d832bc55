//! Error types for the WebSocket handshake and framing layer.
//!
//! Every failure is terminal for the connection it happened on; nothing in
//! this crate retries.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons an upgrade request is refused.
///
/// Each precondition of the upgrade has its own variant so callers never
/// have to tell two failures apart by message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandshakeError {
    /// `Connection` header absent or not `Upgrade`.
    #[error("missing 'connection' header")]
    InvalidConnection,

    /// `Upgrade` header absent or not `websocket`.
    #[error("missing 'upgrade' header")]
    InvalidUpgrade,

    /// `Sec-WebSocket-Version` header absent or not `13`.
    #[error("invalid version")]
    UnsupportedVersion,

    /// `Sec-WebSocket-Key` header absent or empty.
    #[error("missing 'sec-websocket-key' header")]
    MissingKey,

    /// The request head could not be parsed as HTTP/1.1.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The request head exceeds the configured limit.
    #[error("request head too large: {size} bytes (max: {max})")]
    TooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
}

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The upgrade request was refused.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The transport failed. The message is the transport's own.
    #[error("I/O error: {message}")]
    Io {
        /// Kind reported by the transport.
        kind: std::io::ErrorKind,
        /// Original error message.
        message: String,
    },

    /// The peer sent a close frame.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame carried an opcode this implementation does not handle.
    #[error("unknown opcode: {0:#x}")]
    UnknownOpcode(u8),

    /// A client frame arrived without a masking key.
    #[error("client frame must be masked")]
    UnmaskedFrame,

    /// Invalid frame structure or header.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Frame payload exceeds the configured maximum.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload length.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// More bytes are needed before the frame can be parsed.
    #[error("incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// The connection already failed or was closed.
    #[error("connection is not open")]
    NotOpen,
}

impl Error {
    /// Build an [`Error::Io`] for a transport that hit end of stream early.
    pub(crate) fn unexpected_eof(what: &str) -> Self {
        Error::Io {
            kind: std::io::ErrorKind::UnexpectedEof,
            message: format!("transport closed while reading {what}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
