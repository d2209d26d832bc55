//! wsstream-echo: a WebSocket echo server.
//!
//! Accepts upgrades on a single path and writes every received chunk back
//! to the client as a text frame.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wsstream::{Config, Limits};
use wsstream::endpoint::{DEFAULT_BUFFER_SIZE, DEFAULT_PATH, EchoEndpoint};

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "wsstream-echo")]
#[command(version)]
#[command(about = "A WebSocket echo server", long_about = None)]
struct Args {
    /// Address to bind to (e.g., 127.0.0.1:8080)
    #[arg(short = 'l', long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Path answering upgrade requests
    #[arg(short = 'p', long, default_value = DEFAULT_PATH)]
    path: String,

    /// Bytes read from a connection per echo
    #[arg(short = 'b', long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Largest accepted frame payload in bytes
    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    max_frame_size: usize,

    /// Largest accepted HTTP request head in bytes
    #[arg(long, default_value_t = 8192)]
    max_handshake_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let limits = Limits::new(args.max_frame_size, args.max_handshake_size);
    let config = Config::server().with_limits(limits);
    let endpoint = EchoEndpoint::new(args.path, config).with_buffer_size(args.buffer_size);

    let listener = TcpListener::bind(&args.listen).await?;
    info!(
        buffer_size = endpoint.buffer_size(),
        max_frame_size = args.max_frame_size,
        "starting wsstream-echo"
    );

    endpoint.serve(listener).await?;
    Ok(())
}
