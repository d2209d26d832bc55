//! The byte transport a connection runs over.
//!
//! A transport is anything that can be read, written and shut down
//! asynchronously. Two implementations matter in practice:
//!
//! - [`tokio::net::TcpStream`], the live socket accepted by a listener;
//! - [`tokio::io::DuplexStream`], an in-memory pipe for exercising the
//!   codec and connection without a network.
//!
//! Closing maps to [`AsyncWriteExt::shutdown`](tokio::io::AsyncWriteExt::shutdown)
//! followed by dropping the value.

use tokio::io::{AsyncRead, AsyncWrite};

/// Capability set required from an underlying transport.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}
