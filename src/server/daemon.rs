//! Search service daemon
//!
//! Accepts one client at a time by default and serves it until it
//! disconnects before accepting the next. With `concurrent` set, each
//! connection gets its own thread and framed channel instead; all of them
//! share the one [`SearchService`].

use crate::search::SearchService;
use crate::server::framing::{FrameError, FramedChannel, DEFAULT_MAX_FRAME_LEN};
use crate::server::handler::RequestHandler;
use crate::server::transport::{Connection, Endpoint, Listener, Stream};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// First pause before retrying a failed accept; doubles per attempt
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Knobs for the accept loop and each connection
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub endpoint: Endpoint,
    pub max_frame_len: usize,
    pub io_timeout: Option<Duration>,
    pub concurrent: bool,
    pub accept_retries: u32,
}

impl ServerOptions {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            io_timeout: None,
            concurrent: false,
            accept_retries: 0,
        }
    }
}

/// The daemon: a listener plus the shared service behind it
pub struct SearchServer {
    handler: RequestHandler,
    options: ServerOptions,
    shutdown: Arc<AtomicBool>,
}

impl SearchServer {
    /// Create a server wrapped in Arc
    pub fn new(service: Arc<SearchService>, options: ServerOptions) -> Arc<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        Arc::new(Self {
            handler: RequestHandler::new(service, Arc::clone(&shutdown)),
            options,
            shutdown,
        })
    }

    pub fn service(&self) -> &Arc<SearchService> {
        self.handler.service()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Bind the configured endpoint and serve until shutdown (blocking)
    pub fn run(self: &Arc<Self>) -> Result<()> {
        let listener = Listener::bind(&self.options.endpoint)?;
        self.serve(listener)
    }

    /// Serve connections from an already bound listener.
    ///
    /// Errors from the listener itself end the loop and are returned;
    /// errors inside a connection only end that connection.
    pub fn serve(self: &Arc<Self>, listener: Listener) -> Result<()> {
        let endpoint = listener.local_endpoint()?;
        info!(%endpoint, concurrent = self.options.concurrent, "listening");

        while !self.is_shutting_down() {
            let stream = self.accept(&listener)?;

            // A wake-up connection may arrive after shutdown was requested
            if self.is_shutting_down() {
                break;
            }

            if let Err(e) = stream.set_io_timeout(self.options.io_timeout) {
                warn!("failed to set connection timeout: {}", e);
            }

            if self.options.concurrent {
                let server = Arc::clone(self);
                let endpoint = endpoint.clone();
                thread::spawn(move || {
                    server.serve_logged(stream);
                    if server.is_shutting_down() {
                        // Unblock the accept loop so it can observe the flag
                        let _ = endpoint.connect();
                    }
                });
            } else {
                self.serve_logged(stream);
            }
        }

        info!("shutting down");
        Ok(())
    }

    fn accept(&self, listener: &Listener) -> Result<Stream> {
        let mut backoff = ACCEPT_BACKOFF;
        let mut attempt = 0;
        loop {
            match listener.accept() {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < self.options.accept_retries => {
                    attempt += 1;
                    warn!(attempt, "accept failed: {}, retrying in {:?}", e, backoff);
                    thread::sleep(backoff);
                    backoff *= 2;
                }
                Err(e) => {
                    error!("accept failed: {}", e);
                    return Err(e).context("Failed to accept connection");
                }
            }
        }
    }

    fn serve_logged<C: Connection>(&self, conn: C) {
        info!("client connected");
        match self.handle_connection(conn) {
            Ok(()) => info!("client disconnected"),
            Err(e) if e.is_disconnect() => info!("client dropped the connection"),
            Err(e) => warn!("connection error: {}", e),
        }
    }

    /// Serve a single client until it disconnects, fails, or asks to shut down
    pub fn handle_connection<C: Connection>(&self, conn: C) -> Result<(), FrameError> {
        let channel = FramedChannel::open(conn)?.with_max_frame_len(self.options.max_frame_len);
        let (mut reader, mut writer) = channel.split();

        while let Some(body) = reader.receive()? {
            debug!(bytes = body.len(), "frame received");
            if let Some(response) = self.handler.handle_frame(&body) {
                writer.send(&response)?;
            }
            if self.is_shutting_down() {
                break;
            }
        }

        Ok(())
    }
}

/// Run the server in the foreground on the configured endpoint
pub fn run_foreground(service: Arc<SearchService>, options: ServerOptions) -> Result<()> {
    SearchServer::new(service, options).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Origin;
    use serde_json::{json, Value};
    use std::io::Cursor;

    fn server() -> Arc<SearchServer> {
        let options = ServerOptions::new(Endpoint::Tcp("127.0.0.1:0".parse().unwrap()));
        SearchServer::new(Arc::new(SearchService::default()), options)
    }

    fn frame(value: &Value) -> Vec<u8> {
        let body = serde_json::to_vec(value).unwrap();
        let mut out = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        out.extend(body);
        out
    }

    #[test]
    fn test_handle_connection_over_tcp() {
        let listener = Listener::bind(&Endpoint::Tcp("127.0.0.1:0".parse().unwrap())).unwrap();
        let endpoint = listener.local_endpoint().unwrap();

        let server = server();
        let worker = {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                let stream = listener.accept().unwrap();
                server.handle_connection(stream)
            })
        };

        let mut channel = FramedChannel::open(endpoint.connect().unwrap()).unwrap();
        channel
            .send(&json!({"method": "SetList", "params": ["alpha", "beta"], "id": 1}))
            .unwrap();
        let body = channel.receive().unwrap().unwrap();
        assert!(body.starts_with(br#"{"jsonrpc":"2.0","id":1,"#));

        drop(channel);
        worker.join().unwrap().unwrap();
        assert_eq!(server.service().len(Origin::List), 2);
    }

    #[test]
    fn test_shutdown_ends_connection() {
        let server = server();
        let (client, conn) = loopback_pair();

        let worker = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.handle_connection(conn))
        };

        let mut channel = FramedChannel::open(client).unwrap();
        channel.send(&json!({"method": "Shutdown", "id": 9})).unwrap();
        let body = channel.receive().unwrap().unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["result"], "shutting_down");

        worker.join().unwrap().unwrap();
        assert!(server.is_shutting_down());
        // Server side has closed its end
        assert!(channel.receive().unwrap().is_none());
    }

    #[test]
    fn test_truncated_frame_reports_disconnect() {
        let server = server();
        let mut wire = frame(&json!({"method": "Ping", "id": 1}));
        wire.extend_from_slice(b"Content-Length: 50\r\n\r\n{\"meth");

        let (client, conn) = loopback_pair();
        let worker = thread::spawn(move || server.handle_connection(conn));

        let (mut reader, mut writer) = FramedChannel::open(client).unwrap().split();
        std::io::Write::write_all(writer.get_mut(), &wire).unwrap();
        let pong = reader.receive().unwrap().unwrap();
        assert!(String::from_utf8(pong).unwrap().contains("pong"));

        drop(writer);
        if let Stream::Tcp(s) = reader.get_ref() {
            let _ = s.shutdown(std::net::Shutdown::Write);
        }
        let err = worker.join().unwrap().unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_serve_sequential_until_shutdown() {
        let listener = Listener::bind(&Endpoint::Tcp("127.0.0.1:0".parse().unwrap())).unwrap();
        let endpoint = listener.local_endpoint().unwrap();
        let server = server();
        let worker = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.serve(listener))
        };

        // First client sets a list and leaves
        {
            let mut channel = FramedChannel::open(endpoint.connect().unwrap()).unwrap();
            channel
                .send(&json!({"method": "SetCommandList", "params": ["git status"], "id": 1}))
                .unwrap();
            channel.receive().unwrap().unwrap();
        }

        // Second client sees it, then stops the server
        let mut channel = FramedChannel::open(endpoint.connect().unwrap()).unwrap();
        channel
            .send(&json!({"method": "Filter", "params": "gs", "id": 2}))
            .unwrap();
        let body = channel.receive().unwrap().unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["result"]["results"][0]["origin"], "command");

        channel.send(&json!({"method": "Shutdown", "id": 3})).unwrap();
        channel.receive().unwrap().unwrap();
        drop(channel);

        worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_idle_connection_times_out() {
        let listener = Listener::bind(&Endpoint::Tcp("127.0.0.1:0".parse().unwrap())).unwrap();
        let endpoint = listener.local_endpoint().unwrap();
        let mut options = ServerOptions::new(endpoint.clone());
        options.io_timeout = Some(Duration::from_millis(50));
        options.accept_retries = 2;
        let server = SearchServer::new(Arc::new(SearchService::default()), options);
        let worker = thread::spawn(move || server.serve(listener));

        // Connects and never sends a frame
        let mut idle = FramedChannel::open(endpoint.connect().unwrap()).unwrap();

        // Queued behind the idle client; served once the server gives up on it
        let mut channel = FramedChannel::open(endpoint.connect().unwrap()).unwrap();
        channel.send(&json!({"method": "Ping", "id": 1})).unwrap();
        let body = channel.receive().unwrap().unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["result"], "pong");

        // The server closed the idle connection
        assert!(idle.receive().unwrap().is_none());

        channel.send(&json!({"method": "Shutdown", "id": 2})).unwrap();
        channel.receive().unwrap().unwrap();
        drop(channel);
        worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_handle_connection_over_cursor_pair() {
        // Read and write halves need not be the same object
        let wire = frame(&json!({"method": "Ping", "id": 1}));
        let server = server();
        let channel = FramedChannel::from_parts(Cursor::new(wire), Vec::new());
        let (mut reader, mut writer) = channel.split();

        let body = reader.receive().unwrap().unwrap();
        let response = server.handler.handle_frame(&body).unwrap();
        writer.send(&response).unwrap();
        let out = String::from_utf8(writer.get_ref().clone()).unwrap();
        assert!(out.ends_with(r#"{"jsonrpc":"2.0","id":1,"result":"pong"}"#));
    }

    fn loopback_pair() -> (Stream, Stream) {
        let listener = Listener::bind(&Endpoint::Tcp("127.0.0.1:0".parse().unwrap())).unwrap();
        let client = listener.local_endpoint().unwrap().connect().unwrap();
        let conn = listener.accept().unwrap();
        (client, conn)
    }
}
