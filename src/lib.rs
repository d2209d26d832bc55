//! # wsstream - WebSocket connections as byte streams
//!
//! `wsstream` upgrades a raw HTTP/1.1 transport to a server-side RFC 6455
//! WebSocket and exposes it as a plain `read`/`write` stream.
//!
//! ## Features
//!
//! - **Server handshake** with ordered header validation and `400` rejection
//! - **Frame codec** for the 7-bit, 16-bit and 64-bit length encodings
//! - **Stream-style connection** that spreads large messages across reads
//! - **Resource limits** on request head and frame size
//!
//! Fragmentation, ping/pong replies and the closing handshake are not
//! implemented: control frames are skipped and a close frame ends reading.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsstream::{Config, server};
//!
//! let (stream, _) = listener.accept().await?;
//! let mut conn = server::upgrade(stream, Config::server()).await?;
//!
//! let mut buf = [0u8; 512];
//! let n = conn.read(&mut buf).await?;
//! conn.write(&buf[..n]).await?;
//! conn.close().await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod codec;
#[cfg(feature = "async-tokio")]
pub mod endpoint;
#[cfg(feature = "async-tokio")]
pub mod server;
#[cfg(feature = "async-tokio")]
pub mod transport;

pub use config::{Config, Limits};
#[cfg(feature = "async-tokio")]
pub use connection::Connection;
pub use connection::ConnectionState;
pub use error::{Error, HandshakeError, Result};
pub use protocol::{HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, compute_accept_key};

#[cfg(feature = "async-tokio")]
pub use codec::FrameCodec;
#[cfg(feature = "async-tokio")]
pub use endpoint::EchoEndpoint;
#[cfg(feature = "async-tokio")]
pub use transport::Transport;
