//! Content-Length message framing
//!
//! Every message on the wire is
//!
//! ```text
//! Content-Length: <N>\r\n
//! \r\n
//! <N bytes of JSON>
//! ```
//!
//! Outgoing messages are always JSON objects whose first field is
//! `"jsonrpc":"2.0"`; the field is inserted into the message before it is
//! serialized, so a body `{"id":1,...}` goes out as
//! `{"jsonrpc":"2.0","id":1,...}`.
//!
//! The read half and the write half share no state and can be driven from
//! different threads after [`FramedChannel::split`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{self, BufRead, BufReader, Read, Write};
use thiserror::Error;

use crate::server::transport::Connection;

/// Largest body accepted by the reader (100MB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

/// Value of the version field stamped on outgoing messages
pub const JSONRPC_VERSION: &str = "2.0";

const CONTENT_LENGTH: &str = "Content-Length";

/// Errors raised while reading or writing frames
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream failed or ended inside a frame
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// Only JSON objects can carry the version field
    #[error("outgoing payload is not a JSON object")]
    NotAnObject,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FrameError {
    /// True when the peer simply went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            FrameError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

/// Read half: turns a byte stream into whole message bodies
pub struct FrameReader<R> {
    inner: BufReader<R>,
    max_frame_len: usize,
    // Body being handed out through the `Read` impl
    pending: Vec<u8>,
    pending_pos: usize,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            pending: Vec::new(),
            pending_pos: 0,
        }
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Block until the next whole message body is available.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between messages. A
    /// stream that ends inside a header or body is an `UnexpectedEof` error.
    /// Bytes still buffered for the `Read` impl are not consulted.
    pub fn receive(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let mut header = Vec::new();
        if self.inner.read_until(b'\n', &mut header)? == 0 {
            return Ok(None);
        }
        if header.last() != Some(&b'\n') {
            return Err(eof("stream ended inside a frame header").into());
        }

        // Anything that is not a length header declares an empty body
        let len = parse_content_length(&header).unwrap_or(0);
        if len > self.max_frame_len {
            return Err(FrameError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let mut separator = Vec::new();
        self.inner.read_until(b'\n', &mut separator)?;
        if separator.last() != Some(&b'\n') {
            return Err(eof("stream ended before the header separator").into());
        }

        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body)?;
        Ok(Some(body))
    }

    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }
}

/// Byte-stream view over consecutive message bodies, frame headers removed
impl<R: Read> Read for FrameReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending_pos >= self.pending.len() {
            match self.receive() {
                Ok(Some(body)) => {
                    self.pending = body;
                    self.pending_pos = 0;
                }
                Ok(None) => return Ok(0),
                Err(FrameError::Io(e)) => return Err(e),
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            }
        }

        let n = (&self.pending[self.pending_pos..]).read(buf)?;
        self.pending_pos += n;
        Ok(n)
    }
}

/// Write half: stamps, frames and writes messages
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Serialize `msg`, stamp the version field and write one frame.
    /// Returns the body length that went on the wire.
    pub fn send<T: Serialize + ?Sized>(&mut self, msg: &T) -> Result<usize, FrameError> {
        let body = stamp_version(serde_json::to_value(msg)?)?;
        self.write_frame(&body)?;
        Ok(body.len())
    }

    /// Send an already encoded payload. It must be a JSON object.
    ///
    /// The payload's own bytes are kept: `{<fields>}` goes out as
    /// `{"jsonrpc":"2.0",<fields>}`.
    pub fn send_payload(&mut self, payload: &[u8]) -> Result<usize, FrameError> {
        let body = splice_version(payload)?;
        self.write_frame(&body)?;
        Ok(body.len())
    }

    // Header and body leave in a single write
    fn write_frame(&mut self, body: &[u8]) -> io::Result<()> {
        let mut frame = format!("{}: {}\r\n\r\n", CONTENT_LENGTH, body.len()).into_bytes();
        frame.extend_from_slice(body);
        self.inner.write_all(&frame)?;
        self.inner.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

/// A duplex connection with framing applied in both directions
pub struct FramedChannel<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl<C: Connection> FramedChannel<C, C> {
    /// Frame a connection, cloning its handle so each direction owns one
    pub fn open(conn: C) -> io::Result<Self> {
        let read_half = conn.try_clone()?;
        Ok(Self::from_parts(read_half, conn))
    }
}

impl<R: Read, W: Write> FramedChannel<R, W> {
    pub fn from_parts(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.reader = self.reader.with_max_frame_len(max_frame_len);
        self
    }

    pub fn receive(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        self.reader.receive()
    }

    pub fn send<T: Serialize + ?Sized>(&mut self, msg: &T) -> Result<usize, FrameError> {
        self.writer.send(msg)
    }

    pub fn send_payload(&mut self, payload: &[u8]) -> Result<usize, FrameError> {
        self.writer.send_payload(payload)
    }

    /// Separate the directions so they can be driven independently
    pub fn split(self) -> (FrameReader<R>, FrameWriter<W>) {
        (self.reader, self.writer)
    }
}

/// Rebuild `value` as an object whose first field is `"jsonrpc":"2.0"`
pub fn stamp_version(value: Value) -> Result<Vec<u8>, FrameError> {
    let Value::Object(fields) = value else {
        return Err(FrameError::NotAnObject);
    };

    let mut stamped = Map::with_capacity(fields.len() + 1);
    stamped.insert("jsonrpc".to_string(), Value::from(JSONRPC_VERSION));
    for (key, field) in fields {
        if key != "jsonrpc" {
            stamped.insert(key, field);
        }
    }

    Ok(serde_json::to_vec(&Value::Object(stamped))?)
}

/// Insert the version field right after the opening brace of an encoded
/// object, leaving every other byte as it was.
///
/// A payload that already names `jsonrpc` would end up with the key twice,
/// so it is rebuilt through [`stamp_version`] instead.
pub fn splice_version(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let Value::Object(fields) = serde_json::from_slice::<Value>(payload)? else {
        return Err(FrameError::NotAnObject);
    };
    if fields.contains_key("jsonrpc") {
        return stamp_version(Value::Object(fields));
    }

    // Validated as an object, so the first non-whitespace byte is the brace
    let start = payload
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .ok_or(FrameError::NotAnObject)?;
    let rest = &payload[start + 1..];
    let empty = rest
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'}');

    let mut body = Vec::with_capacity(payload.len() + 17);
    body.extend_from_slice(b"{\"jsonrpc\":\"");
    body.extend_from_slice(JSONRPC_VERSION.as_bytes());
    body.push(b'"');
    if !empty {
        body.push(b',');
    }
    body.extend_from_slice(rest);
    Ok(body)
}

/// Parse `Content-Length: <N>` out of a raw header line
fn parse_content_length(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?;
    let (name, value) = line.trim_end_matches(['\r', '\n']).split_once(':')?;
    if !name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
        return None;
    }
    value.trim().parse().ok()
}

fn eof(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, msg.to_string())
}
