//! WebSocket connection exposed as a duplex byte stream.
//!
//! A [`Connection`] turns frames into plain `read`/`write` calls: each
//! `write` sends one text frame, and `read` hands out decoded payload bytes
//! in whatever portions fit the caller's buffer.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsstream::{Config, server};
//!
//! let mut conn = server::upgrade(stream, Config::server()).await?;
//! let mut buf = [0u8; 512];
//! loop {
//!     let n = conn.read(&mut buf).await?;
//!     conn.write(&buf[..n]).await?;
//! }
//! ```

mod state;

pub use state::ConnectionState;

#[cfg(feature = "async-tokio")]
#[allow(clippy::module_inception)]
mod connection;

#[cfg(feature = "async-tokio")]
pub use connection::Connection;
