//! Local transports: Unix domain sockets and loopback TCP
//!
//! Both yield an ordered, reliable duplex byte stream; framing is layered on
//! top by [`crate::server::framing`].

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A duplex byte stream whose handle can be cloned into independent
/// read and write halves
pub trait Connection: Read + Write + Send + Sized + 'static {
    fn try_clone(&self) -> io::Result<Self>;

    /// Apply (or clear) the same timeout to both directions
    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

#[cfg(unix)]
impl Connection for UnixStream {
    fn try_clone(&self) -> io::Result<Self> {
        UnixStream::try_clone(self)
    }

    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }
}

impl Connection for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }
}

/// Where the service listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    #[cfg(unix)]
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{}", addr),
        }
    }
}

impl Endpoint {
    /// Open a client connection
    pub fn connect(&self) -> io::Result<Stream> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => UnixStream::connect(path).map(Stream::Unix),
            Endpoint::Tcp(addr) => TcpStream::connect(addr).map(Stream::Tcp),
        }
    }
}

/// A connection accepted from, or opened to, an [`Endpoint`]
#[derive(Debug)]
pub enum Stream {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
            Stream::Tcp(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
            Stream::Tcp(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
            Stream::Tcp(s) => s.flush(),
        }
    }
}

impl Connection for Stream {
    fn try_clone(&self) -> io::Result<Self> {
        match self {
            #[cfg(unix)]
            Stream::Unix(s) => s.try_clone().map(Stream::Unix),
            Stream::Tcp(s) => s.try_clone().map(Stream::Tcp),
        }
    }

    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Stream::Unix(s) => Connection::set_io_timeout(s, timeout),
            Stream::Tcp(s) => Connection::set_io_timeout(s, timeout),
        }
    }
}

/// A bound listener. A Unix socket file is removed again on drop.
pub enum Listener {
    #[cfg(unix)]
    Unix { listener: UnixListener, path: PathBuf },
    Tcp(TcpListener),
}

impl Listener {
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => bind_unix(path),
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr)
                    .with_context(|| format!("Failed to bind to {}", addr))?;
                Ok(Listener::Tcp(listener))
            }
        }
    }

    /// Block until the next client connects
    pub fn accept(&self) -> io::Result<Stream> {
        match self {
            #[cfg(unix)]
            Listener::Unix { listener, .. } => listener.accept().map(|(s, _)| Stream::Unix(s)),
            Listener::Tcp(listener) => listener.accept().map(|(s, _)| Stream::Tcp(s)),
        }
    }

    /// The endpoint actually bound (resolves port 0)
    pub fn local_endpoint(&self) -> io::Result<Endpoint> {
        match self {
            #[cfg(unix)]
            Listener::Unix { path, .. } => Ok(Endpoint::Unix(path.clone())),
            Listener::Tcp(listener) => listener.local_addr().map(Endpoint::Tcp),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if let Listener::Unix { path, .. } = self {
                let _ = fs::remove_file(path);
            }
        }
    }
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<Listener> {
    use std::os::unix::fs::PermissionsExt;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // Remove stale socket file
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("Failed to bind to {}", path.display()))?;

    // User only
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(Listener::Unix {
        listener,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_loopback() {
        let listener = Listener::bind(&Endpoint::Tcp("127.0.0.1:0".parse().unwrap())).unwrap();
        let endpoint = listener.local_endpoint().unwrap();

        let mut client = endpoint.connect().unwrap();
        let mut server = listener.accept().unwrap();

        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_socket_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fzd.sock");
        let endpoint = Endpoint::Unix(path.clone());

        let listener = Listener::bind(&endpoint).unwrap();
        assert!(path.exists());

        let _client = endpoint.connect().unwrap();
        let server = listener.accept().unwrap();
        let clone = server.try_clone().unwrap();
        clone.set_io_timeout(Some(Duration::from_secs(1))).unwrap();

        drop(listener);
        assert!(!path.exists());
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::Tcp("127.0.0.1:7000".parse().unwrap());
        assert_eq!(endpoint.to_string(), "tcp:127.0.0.1:7000");
    }
}
