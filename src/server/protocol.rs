//! JSON-RPC messages exchanged over the framed channel
//!
//! Requests look like `{"method": "Filter", "params": ..., "id": 1}`. The
//! method may carry a receiver prefix (`Search.Filter`), and params are
//! accepted as an object, as a one-element array wrapping an object, or as a
//! bare positional value:
//!
//! ```text
//! {"method":"SetList","params":{"items":["a","b"]},"id":1}
//! {"method":"Search.SetList","params":[{"List":["a","b"]}],"id":1}
//! {"method":"SetList","params":["a","b"],"id":1}
//! ```

use crate::search::{MatchResult, SortOrder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Methods understood by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Replace the target list
    SetList,
    /// Replace the command list
    SetCommandList,
    /// Match both lists against a pattern
    Filter,
    /// Report list sizes and counters
    Status,
    /// Connection test
    Ping,
    /// Stop accepting connections
    Shutdown,
}

impl Method {
    const ALL: [Method; 6] = [
        Method::SetList,
        Method::SetCommandList,
        Method::Filter,
        Method::Status,
        Method::Ping,
        Method::Shutdown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::SetList => "SetList",
            Method::SetCommandList => "SetCommandList",
            Method::Filter => "Filter",
            Method::Status => "Status",
            Method::Ping => "Ping",
            Method::Shutdown => "Shutdown",
        }
    }

    /// Resolve a wire method name, ignoring any `Receiver.` prefix and case
    pub fn parse(name: &str) -> Option<Self> {
        let base = name.rsplit('.').next().unwrap_or(name);
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(base))
    }
}

/// Incoming request
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// `None` when the member is absent (a notification), `Some(Null)` for
    /// an explicit null id
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Outgoing request, as written by the client
#[derive(Debug, Clone, Serialize)]
pub struct RpcCall<'a, P: Serialize> {
    pub method: &'a str,
    pub params: P,
    pub id: u64,
}

/// Response to a request. The `jsonrpc` member is stamped by the framing
/// layer on the way out, so the server leaves it unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: None,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: &RpcError) -> Self {
        Self {
            jsonrpc: None,
            id,
            result: None,
            error: Some(error.to_object()),
        }
    }
}

/// Error member of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
}

/// Protocol-level failures, each mapped to a JSON-RPC error code
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::Parse(_) => -32700,
            RpcError::InvalidRequest(_) => -32600,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidParams(_) => -32602,
        }
    }

    pub fn to_object(&self) -> RpcErrorObject {
        RpcErrorObject {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Arguments of `SetList` / `SetCommandList`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetListParams {
    pub items: Vec<String>,
}

impl SetListParams {
    pub fn from_params(params: Value) -> Result<Self, RpcError> {
        let items = match unwrap_params(params) {
            Value::Object(obj) => field(&obj, &["items", "list"])
                .cloned()
                .ok_or_else(|| RpcError::InvalidParams("missing items".to_string()))?,
            positional @ Value::Array(_) => positional,
            Value::Null => return Err(RpcError::InvalidParams("missing items".to_string())),
            other => {
                return Err(RpcError::InvalidParams(format!(
                    "expected a list of strings, got {}",
                    type_name(&other)
                )))
            }
        };

        if items.is_null() {
            return Err(RpcError::InvalidParams("items must not be null".to_string()));
        }
        let items = serde_json::from_value(items)
            .map_err(|e| RpcError::InvalidParams(format!("items: {}", e)))?;
        Ok(Self { items })
    }
}

/// Arguments of `Filter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterParams {
    pub pattern: String,
    #[serde(skip_serializing_if = "is_ascending")]
    pub order: SortOrder,
}

fn is_ascending(order: &SortOrder) -> bool {
    *order == SortOrder::Ascending
}

impl FilterParams {
    pub fn from_params(params: Value) -> Result<Self, RpcError> {
        match unwrap_params(params) {
            Value::String(pattern) => Ok(Self {
                pattern,
                order: SortOrder::default(),
            }),
            Value::Array(mut items) if items.len() == 1 && items[0].is_string() => Ok(Self {
                pattern: items.remove(0).as_str().unwrap_or_default().to_string(),
                order: SortOrder::default(),
            }),
            Value::Object(obj) => {
                let pattern = match field(&obj, &["pattern", "query"]) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => {
                        return Err(RpcError::InvalidParams(format!(
                            "pattern must be a string, got {}",
                            type_name(other)
                        )))
                    }
                    None => return Err(RpcError::InvalidParams("missing pattern".to_string())),
                };
                let order = match field(&obj, &["order"]) {
                    None | Some(Value::Null) => SortOrder::default(),
                    Some(v) => serde_json::from_value(v.clone())
                        .map_err(|e| RpcError::InvalidParams(format!("order: {}", e)))?,
                };
                Ok(Self { pattern, order })
            }
            other => Err(RpcError::InvalidParams(format!(
                "expected a pattern, got {}",
                type_name(&other)
            ))),
        }
    }
}

/// Reply of `SetList` / `SetCommandList`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetListReply {
    pub result: usize,
}

/// Reply of `Filter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReply {
    pub results: Vec<MatchResult>,
}

/// Reply of `Status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub list_len: usize,
    pub command_len: usize,
    pub filters_served: u64,
    pub lists_replaced: u64,
    pub uptime_secs: u64,
}

/// `[{...}]` -> `{...}`; positional params pass through untouched
fn unwrap_params(params: Value) -> Value {
    match params {
        Value::Array(mut items) if items.len() == 1 && items[0].is_object() => items.remove(0),
        other => other,
    }
}

/// Look up the first of `names` present in `obj`, ignoring case
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| {
        obj.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
