//! Client for a running search daemon

use crate::search::{MatchResult, Origin, SortOrder};
use crate::server::framing::{FrameError, FramedChannel};
use crate::server::protocol::{
    FilterParams, FilterReply, Method, RpcCall, RpcResponse, SetListParams, SetListReply,
    StatusReply,
};
use crate::server::transport::{Connection, Endpoint, Stream};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Read/write timeout
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in client operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("search daemon is not running")]
    NotRunning,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("server closed the connection")]
    Disconnected,

    /// The server answered with a JSON-RPC error
    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("invalid response from server")]
    InvalidResponse,
}

/// Blocking client; one request in flight at a time
pub struct SearchClient<C: Connection = Stream> {
    channel: FramedChannel<C, C>,
    next_id: u64,
}

impl SearchClient<Stream> {
    /// Connect to a daemon listening on `endpoint`
    pub fn connect(endpoint: &Endpoint) -> ClientResult<Self> {
        let stream = endpoint.connect().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => ClientError::NotRunning,
            _ => ClientError::Io(e),
        })?;
        stream.set_io_timeout(Some(IO_TIMEOUT))?;
        Self::from_connection(stream)
    }
}

impl<C: Connection> SearchClient<C> {
    /// Wrap an already open connection
    pub fn from_connection(conn: C) -> ClientResult<Self> {
        Ok(Self {
            channel: FramedChannel::open(conn)?,
            next_id: 1,
        })
    }

    /// Replace the target list; returns the number of items stored
    pub fn set_list(&mut self, items: Vec<String>) -> ClientResult<usize> {
        self.replace(Origin::List, items)
    }

    /// Replace the command list; returns the number of items stored
    pub fn set_command_list(&mut self, items: Vec<String>) -> ClientResult<usize> {
        self.replace(Origin::Command, items)
    }

    fn replace(&mut self, origin: Origin, items: Vec<String>) -> ClientResult<usize> {
        let method = match origin {
            Origin::List => Method::SetList,
            Origin::Command => Method::SetCommandList,
        };
        let reply: SetListReply = self.call(method, SetListParams { items })?;
        Ok(reply.result)
    }

    pub fn filter(&mut self, pattern: &str) -> ClientResult<Vec<MatchResult>> {
        self.filter_sorted(pattern, SortOrder::Ascending)
    }

    pub fn filter_sorted(
        &mut self,
        pattern: &str,
        order: SortOrder,
    ) -> ClientResult<Vec<MatchResult>> {
        let params = FilterParams {
            pattern: pattern.to_string(),
            order,
        };
        let reply: FilterReply = self.call(Method::Filter, params)?;
        Ok(reply.results)
    }

    pub fn status(&mut self) -> ClientResult<StatusReply> {
        self.call(Method::Status, Value::Null)
    }

    pub fn ping(&mut self) -> ClientResult<String> {
        self.call(Method::Ping, Value::Null)
    }

    /// Ask the daemon to stop accepting connections
    pub fn shutdown(&mut self) -> ClientResult<String> {
        self.call(Method::Shutdown, Value::Null)
    }

    fn call<P: Serialize, T: DeserializeOwned>(
        &mut self,
        method: Method,
        params: P,
    ) -> ClientResult<T> {
        let id = self.next_id;
        self.next_id += 1;

        self.channel.send(&RpcCall {
            method: method.name(),
            params,
            id,
        })?;

        let body = self.channel.receive()?.ok_or(ClientError::Disconnected)?;
        let response: RpcResponse =
            serde_json::from_slice(&body).map_err(|_| ClientError::InvalidResponse)?;

        if let Some(error) = response.error {
            return Err(ClientError::Server {
                code: error.code,
                message: error.message,
            });
        }
        if response.id != Value::from(id) {
            return Err(ClientError::InvalidResponse);
        }

        let result = response.result.ok_or(ClientError::InvalidResponse)?;
        serde_json::from_value(result).map_err(|_| ClientError::InvalidResponse)
    }
}
