//! Request dispatch: framed body in, optional response out

use crate::search::{Origin, SearchService};
use crate::server::protocol::{
    FilterParams, FilterReply, Method, RpcError, RpcRequest, RpcResponse, SetListParams,
    SetListReply, StatusReply,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Decodes requests and runs them against the shared service
pub struct RequestHandler {
    service: Arc<SearchService>,
    shutdown: Arc<AtomicBool>,
}

impl RequestHandler {
    pub fn new(service: Arc<SearchService>, shutdown: Arc<AtomicBool>) -> Self {
        Self { service, shutdown }
    }

    pub fn service(&self) -> &Arc<SearchService> {
        &self.service
    }

    /// Handle one message body.
    ///
    /// Returns `None` for empty bodies and for notifications (requests
    /// without an `id`), which get no reply.
    pub fn handle_frame(&self, body: &[u8]) -> Option<RpcResponse> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        let value: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                return Some(RpcResponse::failure(
                    Value::Null,
                    &RpcError::Parse(e.to_string()),
                ))
            }
        };

        // Salvage the id for the error reply when the shape is wrong
        let raw_id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(RpcResponse::failure(
                    raw_id,
                    &RpcError::InvalidRequest(e.to_string()),
                ))
            }
        };

        let start = Instant::now();
        let outcome = self.dispatch(&request.method, request.params);
        debug!(
            method = %request.method,
            ok = outcome.is_ok(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "handled request"
        );

        let id = request.id?;
        Some(match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err(e) => RpcResponse::failure(id, &e),
        })
    }

    /// Run a single method
    pub fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let method =
            Method::parse(method).ok_or_else(|| RpcError::MethodNotFound(method.to_string()))?;

        match method {
            Method::SetList => self.set_list(Origin::List, params),
            Method::SetCommandList => self.set_list(Origin::Command, params),
            Method::Filter => {
                let params = FilterParams::from_params(params)?;
                let results = self.service.filter_sorted(&params.pattern, params.order);
                to_value(&FilterReply { results })
            }
            Method::Status => {
                let stats = self.service.stats();
                to_value(&StatusReply {
                    list_len: stats.list_len,
                    command_len: stats.command_len,
                    filters_served: stats.filters_served,
                    lists_replaced: stats.lists_replaced,
                    uptime_secs: stats.uptime_secs,
                })
            }
            Method::Ping => Ok(Value::from("pong")),
            Method::Shutdown => {
                self.shutdown.store(true, Ordering::Relaxed);
                Ok(Value::from("shutting_down"))
            }
        }
    }

    fn set_list(&self, origin: Origin, params: Value) -> Result<Value, RpcError> {
        let params = SetListParams::from_params(params)?;
        let result = self.service.set_list(origin, params.items);
        debug!(%origin, items = result, "list replaced");
        to_value(&SetListReply { result })
    }
}

fn to_value<T: Serialize>(reply: &T) -> Result<Value, RpcError> {
    // Reply types are plain data; this only fails on a serializer bug
    serde_json::to_value(reply).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}
