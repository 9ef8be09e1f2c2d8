//! Search daemon and its client
//!
//! The daemon holds the candidate lists in memory and answers JSON-RPC
//! requests framed with `Content-Length` headers over a local socket.
//!
//! Layers, bottom up:
//! - [`transport`]: Unix sockets or loopback TCP
//! - [`framing`]: `Content-Length` frames and the version stamp
//! - [`protocol`]: request, response and parameter shapes
//! - [`handler`]: one body in, one optional response out
//! - [`daemon`]: accept loop and per-connection serving
//! - [`client`]: blocking client used by the CLI

pub mod client;
pub mod daemon;
pub mod framing;
pub mod handler;
pub mod protocol;
pub mod transport;

pub use client::{ClientError, ClientResult, SearchClient};
pub use daemon::{run_foreground, SearchServer, ServerOptions};
pub use framing::{FrameError, FrameReader, FrameWriter, FramedChannel};
pub use transport::{Connection, Endpoint, Listener, Stream};

use std::net::SocketAddr;
use std::path::PathBuf;

const SOCKET_NAME: &str = "fzd.sock";

/// Loopback address used where Unix sockets are unavailable
const DEFAULT_TCP_ADDR: &str = "127.0.0.1:7787";

/// Get the socket path for the search daemon
/// Uses a per-user runtime directory for security
pub fn get_socket_path() -> PathBuf {
    // Try XDG_RUNTIME_DIR first (most secure, tmpfs-backed)
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(SOCKET_NAME);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".local").join("run").join(SOCKET_NAME);
    }

    fallback_socket_path()
}

#[cfg(unix)]
fn fallback_socket_path() -> PathBuf {
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/fzd-{}.sock", uid))
}

#[cfg(not(unix))]
fn fallback_socket_path() -> PathBuf {
    std::env::temp_dir().join(SOCKET_NAME)
}

/// Where the daemon listens when nothing else is configured
pub fn default_endpoint() -> Endpoint {
    #[cfg(unix)]
    {
        Endpoint::Unix(get_socket_path())
    }
    #[cfg(not(unix))]
    {
        Endpoint::Tcp(default_tcp_addr())
    }
}

pub fn default_tcp_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7787))
}

/// Parse a `host:port` string into a TCP endpoint
pub fn tcp_endpoint(addr: &str) -> anyhow::Result<Endpoint> {
    use anyhow::Context;
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid TCP address '{}' (expected e.g. {})", addr, DEFAULT_TCP_ADDR))?;
    Ok(Endpoint::Tcp(addr))
}
